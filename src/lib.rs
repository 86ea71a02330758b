pub mod camera;
pub mod controls;
pub mod gesture;
pub mod initialize;
pub mod integrator;
pub mod render;
pub mod shader;
pub mod state;

use cgmath::Vector2;
use std::f32::consts::PI;
use std::sync::Arc;

pub const MIN_PLANETS: usize = 1;
pub const MAX_PLANETS: usize = 100;
pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 1000;
pub const MIN_TIME_STEP: f32 = 1e-5;
pub const MAX_TIME_STEP: f32 = 1e-1;
pub const MIN_BRIGHTNESS: f32 = 0.01;
pub const MAX_BRIGHTNESS: f32 = 12.0;
pub const MAX_COLOR_SHIFT: f32 = PI;

/// Mass per unit of disk area.
pub const PLANET_DENSITY: f32 = 10_000_000.0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParamsError {
  #[error("at least one planet is required")]
  NoPlanets,
  #[error(transparent)]
  Layout(#[from] initialize::LayoutError),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
  pub r: f32,
  pub g: f32,
  pub b: f32,
}

impl Color {
  pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

  pub const fn new(r: f32, g: f32, b: f32) -> Self {
    Self { r, g, b }
  }

  /// Linear interpolation towards `other`, `t = 0` yields `self` exactly.
  #[must_use]
  pub fn lerp(self, other: Color, t: f32) -> Color {
    Color {
      r: self.r * (1.0 - t) + other.r * t,
      g: self.g * (1.0 - t) + other.g * t,
      b: self.b * (1.0 - t) + other.b * t,
    }
  }

  pub fn to_array(self) -> [f32; 3] {
    [self.r, self.g, self.b]
  }
}

/// Mass is derived from the radius once and never changes afterwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Planet {
  position: Vector2<f32>,
  radius: f32,
  mass: f32,
  color: Color,
}

impl Planet {
  pub fn new(position: Vector2<f32>, radius: f32, color: Color) -> Self {
    Self {
      position,
      radius,
      mass: PI * radius * radius * PLANET_DENSITY,
      color,
    }
  }

  pub fn position(&self) -> Vector2<f32> {
    self.position
  }

  pub fn radius(&self) -> f32 {
    self.radius
  }

  pub fn mass(&self) -> f32 {
    self.mass
  }

  pub fn color(&self) -> Color {
    self.color
  }
}

/// One complete parameter record. Edits replace the whole record; the planet
/// list is shared so an unchanged count can hand the same list back.
///
/// Only the planet count is checked here. The other ranges are guaranteed by
/// whoever builds the record (the CLI parsers and the keyboard panel clamp
/// them).
#[derive(Clone, Debug)]
pub struct Parameters {
  pub color_shift: f32,
  /// Negated user brightness, so in `[-12, -0.01]`.
  pub brightness_factor: f32,
  pub max_iterations: u32,
  pub time_step: f32,
  planets: Arc<[Planet]>,
}

impl Parameters {
  pub fn new(
    color_shift: f32,
    brightness_factor: f32,
    max_iterations: u32,
    time_step: f32,
    planets: Arc<[Planet]>,
  ) -> Result<Self, ParamsError> {
    if planets.len() < MIN_PLANETS {
      return Err(ParamsError::NoPlanets);
    }
    Ok(Self {
      color_shift,
      brightness_factor,
      max_iterations,
      time_step,
      planets,
    })
  }

  pub fn planets(&self) -> &Arc<[Planet]> {
    &self.planets
  }

  pub fn planet_count(&self) -> usize {
    self.planets.len()
  }
}

#[derive(Copy, Clone, Debug)]
pub struct PanelDefaults {
  pub color_shift: f32,
  pub brightness: f32,
  pub max_iterations: u32,
  pub time_step: f32,
  pub planet_count: usize,
}

impl Default for PanelDefaults {
  fn default() -> Self {
    Self {
      color_shift: 1.6,
      brightness: 4.0,
      max_iterations: 100,
      time_step: 0.01,
      planet_count: 3,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn mass_follows_disk_area() {
    let planet = Planet::new(Vector2::new(0.0, 0.0), 0.25, Color::BLACK);
    assert_relative_eq!(planet.mass(), PI * 0.0625 * 1e7, max_relative = 1e-6);
    assert!(planet.mass() > 0.0);
  }

  #[test]
  fn empty_planet_list_is_rejected() {
    let planets: Arc<[Planet]> = Arc::from(Vec::new());
    let err = Parameters::new(1.6, -4.0, 100, 0.01, planets).unwrap_err();
    assert_eq!(err, ParamsError::NoPlanets);
  }

  #[test]
  fn lerp_endpoints() {
    let c = Color::new(0.2, 0.4, 0.8);
    assert_eq!(c.lerp(Color::BLACK, 0.0), c);
    assert_eq!(c.lerp(Color::BLACK, 1.0), Color::BLACK);
  }
}
