use crate::Parameters;

/// Nominal test-particle mass. It appears in both the numerator and the
/// denominator of the gravity term and cancels.
pub const BALL_MASS: f32 = 100.0;

pub const GRAVITY: f32 = 0.0000001;

/// Everything that gets baked into the program text. Two records with the
/// same key can share one compiled program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramKey {
  pub planet_count: u32,
  pub max_iterations: u32,
  time_step_bits: u32,
}

impl ProgramKey {
  pub fn new(planet_count: u32, max_iterations: u32, time_step: f32) -> Self {
    Self {
      planet_count,
      max_iterations,
      time_step_bits: time_step.to_bits(),
    }
  }

  pub fn time_step(&self) -> f32 {
    f32::from_bits(self.time_step_bits)
  }
}

impl From<&Parameters> for ProgramKey {
  fn from(params: &Parameters) -> Self {
    Self::new(
      params.planet_count() as u32,
      params.max_iterations,
      params.time_step,
    )
  }
}

fn float_literal(value: f32) -> String {
  let text = format!("{value:?}");
  if text.contains(['.', 'e', 'E']) {
    text
  } else {
    format!("{text}.0")
  }
}

/// WGSL for the full-screen pass. The vertex stage maps the quad to world
/// space, the fragment stage integrates one trajectory per pixel.
pub fn program_source(key: &ProgramKey) -> String {
  let mut source = format!(
    "const MAX_ITERS: u32 = {}u;\n\
     const DELTA_T: f32 = {};\n\
     const PLANETS_COUNT: u32 = {}u;\n\
     const BALL_MASS: f32 = {};\n\
     const GRAVITY: f32 = {};\n",
    key.max_iterations,
    float_literal(key.time_step()),
    key.planet_count,
    float_literal(BALL_MASS),
    float_literal(GRAVITY),
  );
  source.push_str(PROGRAM_BODY);
  source
}

const PROGRAM_BODY: &str = r#"
struct Frame {
  resolution: vec2<f32>,
  center: vec2<f32>,
  zoom: f32,
  color_shift: f32,
  brightness_factor: f32,
  _padding: f32,
}

@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(1) var<storage, read> planet_positions: array<vec2<f32>, PLANETS_COUNT>;
@group(0) @binding(2) var<storage, read> planet_radii: array<f32, PLANETS_COUNT>;
@group(0) @binding(3) var<storage, read> planet_masses: array<f32, PLANETS_COUNT>;
@group(0) @binding(4) var<storage, read> planet_colors: array<vec4<f32>, PLANETS_COUNT>;

struct VertexOutput {
  @builtin(position) clip_position: vec4<f32>,
  @location(0) world_pos: vec2<f32>,
}

@vertex
fn vs_main(@location(0) a_pos: vec2<f32>) -> VertexOutput {
  var out: VertexOutput;
  out.clip_position = vec4<f32>(a_pos, 0.0, 1.0);
  var pos = (1.0 / frame.zoom) * a_pos + frame.center;
  pos.x *= frame.resolution.x / frame.resolution.y;
  out.world_pos = pos;
  return out;
}

fn distance_sq(u: vec2<f32>, v: vec2<f32>) -> f32 {
  let diff = v - u;
  return diff.x * diff.x + diff.y * diff.y;
}

fn gravity_force(ball_pos: vec2<f32>, planet_pos: vec2<f32>, planet_mass: f32) -> vec2<f32> {
  let dir = planet_pos - ball_pos;
  let dist_sq = dot(dir, dir);
  let len = GRAVITY * ((BALL_MASS * planet_mass) / dist_sq);
  return len * normalize(dir);
}

fn compute_acceleration(ball_pos: vec2<f32>) -> vec2<f32> {
  var acceleration = vec2<f32>(0.0);
  for (var i = 0u; i < PLANETS_COUNT; i++) {
    let force = gravity_force(ball_pos, planet_positions[i], planet_masses[i]);
    acceleration += force / BALL_MASS;
  }
  return acceleration;
}

fn compute_trajectory(start: vec2<f32>) -> vec3<f32> {
  var position = start;
  var velocity = vec2<f32>(0.0);

  for (var i = 0u; i < MAX_ITERS; i++) {
    for (var j = 0u; j < PLANETS_COUNT; j++) {
      let radius = planet_radii[j];
      if (distance_sq(position, planet_positions[j]) < radius * radius) {
        return mix(planet_colors[j].rgb, vec3<f32>(0.0), f32(i) / f32(MAX_ITERS));
      }
    }

    let acceleration = compute_acceleration(position);
    velocity += acceleration * DELTA_T;
    position += velocity * DELTA_T;
  }

  return vec3<f32>(0.0);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
  return vec4<f32>(compute_trajectory(in.world_pos), 1.0);
}
"#;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn float_literals_are_wgsl() {
    assert_eq!(float_literal(100.0), "100.0");
    assert_eq!(float_literal(0.01), "0.01");
    assert_eq!(float_literal(1e-5), "1e-5");
  }

  #[test]
  fn key_ignores_nothing_baked() {
    let a = ProgramKey::new(3, 100, 0.01);
    assert_eq!(a, ProgramKey::new(3, 100, 0.01));
    assert_ne!(a, ProgramKey::new(4, 100, 0.01));
    assert_ne!(a, ProgramKey::new(3, 101, 0.01));
    assert_ne!(a, ProgramKey::new(3, 100, 0.02));
    assert_eq!(a.time_step(), 0.01);
  }
}
