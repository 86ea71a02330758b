use crate::initialize::create_planets;
use crate::{
  PanelDefaults, Parameters, ParamsError, Planet, MAX_BRIGHTNESS, MAX_COLOR_SHIFT, MAX_ITERATIONS,
  MAX_PLANETS, MAX_TIME_STEP, MIN_BRIGHTNESS, MIN_ITERATIONS, MIN_PLANETS, MIN_TIME_STEP,
};
use log::info;
use rand::{rngs::SmallRng, SeedableRng};
use std::sync::Arc;
use winit::{
  event::{ElementState, KeyEvent, WindowEvent},
  keyboard::{KeyCode, PhysicalKey},
};

const ITERATION_STEP: u32 = 10;
const TIME_STEP_FACTOR: f32 = 1.25;
const COLOR_SHIFT_STEP: f32 = 0.1;
const BRIGHTNESS_STEP: f32 = 0.25;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Adjustment {
  Iterations(i64),
  TimeStep(f32),
  PlanetCount(i64),
  ColorShift(f32),
  Brightness(f32),
}

impl Adjustment {
  fn from_key(code: KeyCode) -> Option<Self> {
    let adjustment = match code {
      KeyCode::ArrowUp => Self::Iterations(ITERATION_STEP as i64),
      KeyCode::ArrowDown => Self::Iterations(-(ITERATION_STEP as i64)),
      KeyCode::ArrowRight => Self::TimeStep(TIME_STEP_FACTOR),
      KeyCode::ArrowLeft => Self::TimeStep(1.0 / TIME_STEP_FACTOR),
      KeyCode::Equal | KeyCode::NumpadAdd => Self::PlanetCount(1),
      KeyCode::Minus | KeyCode::NumpadSubtract => Self::PlanetCount(-1),
      KeyCode::KeyC => Self::ColorShift(COLOR_SHIFT_STEP),
      KeyCode::KeyX => Self::ColorShift(-COLOR_SHIFT_STEP),
      KeyCode::KeyB => Self::Brightness(BRIGHTNESS_STEP),
      KeyCode::KeyV => Self::Brightness(-BRIGHTNESS_STEP),
      _ => return None,
    };
    Some(adjustment)
  }
}

/// Keyboard-driven parameter panel. Values are clamped to their valid ranges
/// on every edit and handed out as complete `Parameters` records.
pub struct ParameterPanel {
  color_shift: f32,
  brightness: f32,
  max_iterations: u32,
  time_step: f32,
  planet_count: usize,
  canvas: (u32, u32),
  rng: SmallRng,
  planets: Option<Arc<[Planet]>>,
}

impl ParameterPanel {
  pub fn init(defaults: PanelDefaults, width: u32, height: u32, seed: u64) -> Self {
    Self {
      color_shift: defaults.color_shift.clamp(0.0, MAX_COLOR_SHIFT),
      brightness: defaults.brightness.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS),
      max_iterations: defaults.max_iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS),
      time_step: defaults.time_step.clamp(MIN_TIME_STEP, MAX_TIME_STEP),
      planet_count: defaults.planet_count.clamp(MIN_PLANETS, MAX_PLANETS),
      canvas: (width, height),
      rng: SmallRng::seed_from_u64(seed),
      planets: None,
    }
  }

  pub fn set_canvas(&mut self, width: u32, height: u32) {
    self.canvas = (width, height);
  }

  /// Returns true when the event changed a parameter.
  pub fn process_events(&mut self, event: &WindowEvent) -> bool {
    match event {
      WindowEvent::KeyboardInput {
        event:
          KeyEvent {
            state: ElementState::Pressed,
            physical_key: PhysicalKey::Code(keycode),
            ..
          },
        ..
      } => match Adjustment::from_key(*keycode) {
        Some(adjustment) => self.adjust(adjustment),
        None => false,
      },
      _ => false,
    }
  }

  pub fn adjust(&mut self, adjustment: Adjustment) -> bool {
    let before = (
      self.color_shift,
      self.brightness,
      self.max_iterations,
      self.time_step,
      self.planet_count,
    );
    match adjustment {
      Adjustment::Iterations(step) => {
        let next = (self.max_iterations as i64 + step).clamp(MIN_ITERATIONS as i64, MAX_ITERATIONS as i64);
        self.max_iterations = next as u32;
      }
      Adjustment::TimeStep(factor) => {
        self.time_step = (self.time_step * factor).clamp(MIN_TIME_STEP, MAX_TIME_STEP);
      }
      Adjustment::PlanetCount(step) => {
        let next = (self.planet_count as i64 + step).clamp(MIN_PLANETS as i64, MAX_PLANETS as i64);
        self.planet_count = next as usize;
      }
      Adjustment::ColorShift(step) => {
        self.color_shift = (self.color_shift + step).clamp(0.0, MAX_COLOR_SHIFT);
      }
      Adjustment::Brightness(step) => {
        self.brightness = (self.brightness + step).clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS);
      }
    }
    let changed = before
      != (
        self.color_shift,
        self.brightness,
        self.max_iterations,
        self.time_step,
        self.planet_count,
      );
    if changed {
      info!(
        "parameters: iterations={} dt={} planets={} color_shift={:.2} brightness={:.2}",
        self.max_iterations, self.time_step, self.planet_count, self.color_shift, self.brightness
      );
    }
    changed
  }

  /// Builds the full record. The planet list is only regenerated when the
  /// requested count differs from the cached one.
  pub fn params(&mut self) -> Result<Parameters, ParamsError> {
    let planets = match &self.planets {
      Some(planets) if planets.len() == self.planet_count => Arc::clone(planets),
      _ => {
        let (width, height) = self.canvas;
        let planets: Arc<[Planet]> = create_planets(&mut self.rng, self.planet_count, width, height)?.into();
        self.planets = Some(Arc::clone(&planets));
        planets
      }
    };
    Parameters::new(
      self.color_shift,
      -self.brightness,
      self.max_iterations,
      self.time_step,
      planets,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn panel() -> ParameterPanel {
    ParameterPanel::init(PanelDefaults::default(), 800, 600, 42)
  }

  #[test]
  fn defaults_become_a_record() {
    let params = panel().params().unwrap();
    assert_eq!(params.planet_count(), 3);
    assert_eq!(params.max_iterations, 100);
    assert_eq!(params.time_step, 0.01);
    assert_eq!(params.brightness_factor, -4.0);
    assert_eq!(params.color_shift, 1.6);
  }

  #[test]
  fn unchanged_count_reuses_planets() {
    let mut panel = panel();
    let first = panel.params().unwrap();
    assert!(panel.adjust(Adjustment::Iterations(10)));
    assert!(panel.adjust(Adjustment::ColorShift(0.5)));
    let second = panel.params().unwrap();
    assert!(Arc::ptr_eq(first.planets(), second.planets()));
    assert_eq!(second.max_iterations, 110);
  }

  #[test]
  fn count_change_regenerates_planets() {
    let mut panel = panel();
    let first = panel.params().unwrap();
    assert!(panel.adjust(Adjustment::PlanetCount(1)));
    let second = panel.params().unwrap();
    assert_eq!(second.planet_count(), 4);
    assert!(!Arc::ptr_eq(first.planets(), second.planets()));
  }

  #[test]
  fn planet_count_never_drops_below_one() {
    let mut panel = ParameterPanel::init(
      PanelDefaults {
        planet_count: 0,
        ..PanelDefaults::default()
      },
      800,
      600,
      1,
    );
    assert_eq!(panel.params().unwrap().planet_count(), 1);
    assert!(!panel.adjust(Adjustment::PlanetCount(-1)));
    assert_eq!(panel.params().unwrap().planet_count(), 1);
  }

  #[test]
  fn edits_are_clamped() {
    let mut panel = panel();
    for _ in 0..200 {
      panel.adjust(Adjustment::Iterations(10));
      panel.adjust(Adjustment::TimeStep(1.25));
      panel.adjust(Adjustment::Brightness(0.25));
      panel.adjust(Adjustment::ColorShift(0.1));
    }
    let params = panel.params().unwrap();
    assert_eq!(params.max_iterations, MAX_ITERATIONS);
    assert_eq!(params.time_step, MAX_TIME_STEP);
    assert_eq!(params.brightness_factor, -MAX_BRIGHTNESS);
    assert_eq!(params.color_shift, MAX_COLOR_SHIFT);
    assert!(!panel.adjust(Adjustment::Iterations(10)));
  }

  #[test]
  fn keys_map_to_adjustments() {
    assert_eq!(Adjustment::from_key(KeyCode::ArrowUp), Some(Adjustment::Iterations(10)));
    assert_eq!(Adjustment::from_key(KeyCode::Minus), Some(Adjustment::PlanetCount(-1)));
    assert_eq!(Adjustment::from_key(KeyCode::KeyQ), None);
  }
}
