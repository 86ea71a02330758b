use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use log::error;
use planet_paths::camera::ViewState;
use planet_paths::{PanelDefaults, MAX_BRIGHTNESS, MAX_COLOR_SHIFT, MAX_TIME_STEP, MIN_BRIGHTNESS, MIN_TIME_STEP};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Test-particle trajectories through the gravity of a handful of planets
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Color shift, 0 to pi
  #[arg(long, default_value_t = 1.6, value_parser = ranged_f32(0.0, MAX_COLOR_SHIFT))]
  color_shift: f32,
  /// Brightness, 0.01 to 12
  #[arg(long, default_value_t = 4.0, value_parser = ranged_f32(MIN_BRIGHTNESS, MAX_BRIGHTNESS))]
  brightness: f32,
  /// Integration steps per pixel
  #[arg(short, long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=1000))]
  iterations: u32,
  /// Integration time step
  #[arg(short = 't', long, default_value_t = 0.01, value_parser = ranged_f32(MIN_TIME_STEP, MAX_TIME_STEP))]
  time_step: f32,
  /// Number of planets
  #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..=100))]
  planets: u16,
  /// Seed for planet layout and colors
  #[arg(long, default_value_t = 42)]
  seed: u64,
  /// Render one frame to a PNG instead of opening a window
  #[arg(long, default_value_t = false)]
  headless: bool,
  /// Output file for headless mode
  #[arg(short, long, default_value = "planet-paths.png")]
  output: PathBuf,
  /// Headless frame width
  #[arg(long, default_value_t = 1280)]
  width: u32,
  /// Headless frame height
  #[arg(long, default_value_t = 720)]
  height: u32,
  /// Headless camera zoom
  #[arg(long, default_value_t = 1.0, value_parser = ranged_f32(1e-6, 1e6))]
  scale: f32,
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Generate shell completion scripts
  Completions {
    /// The shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
  },
}

fn ranged_f32(min: f32, max: f32) -> impl Fn(&str) -> Result<f32, String> + Clone + Send + Sync + 'static {
  move |s: &str| {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if (min..=max).contains(&value) {
      Ok(value)
    } else {
      Err(format!("must be between {min} and {max}"))
    }
  }
}

fn main() -> ExitCode {
  let args = Args::parse();

  if let Some(Commands::Completions { shell }) = args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    return ExitCode::SUCCESS;
  }

  env_logger::init();

  let defaults = PanelDefaults {
    color_shift: args.color_shift,
    brightness: args.brightness,
    max_iterations: args.iterations,
    time_step: args.time_step,
    planet_count: args.planets as usize,
  };

  let result = if args.headless {
    planet_paths::state::run_headless(
      defaults,
      args.seed,
      args.width,
      args.height,
      ViewState::new(args.scale),
      &args.output,
    )
    .map_err(|e| e.to_string())
  } else {
    planet_paths::state::run(defaults, args.seed).map_err(|e| e.to_string())
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{err}");
      ExitCode::FAILURE
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_is_consistent() {
    Args::command().debug_assert();
  }

  #[test]
  fn out_of_range_values_are_rejected() {
    assert!(Args::try_parse_from(["planet-paths", "--planets", "0"]).is_err());
    assert!(Args::try_parse_from(["planet-paths", "--iterations", "1001"]).is_err());
    assert!(Args::try_parse_from(["planet-paths", "--time-step", "0.5"]).is_err());
    let args = Args::try_parse_from(["planet-paths", "--planets", "7", "--headless"]).unwrap();
    assert_eq!(args.planets, 7);
    assert!(args.headless);
  }
}
