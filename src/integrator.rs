use crate::camera::ViewState;
use crate::shader::{BALL_MASS, GRAVITY};
use crate::{Color, Parameters, Planet};
use cgmath::{InnerSpace, Vector2};
use image::{Rgb, RgbImage};
use rayon::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Outcome {
  Collided { planet: usize, iteration: u32 },
  Escaped,
}

pub fn distance_sq(u: Vector2<f32>, v: Vector2<f32>) -> f32 {
  let diff = v - u;
  diff.x * diff.x + diff.y * diff.y
}

/// No softening: the magnitude diverges as `ball_pos` approaches the planet
/// center and is NaN exactly on it.
pub fn gravity_force(ball_pos: Vector2<f32>, planet_pos: Vector2<f32>, planet_mass: f32) -> Vector2<f32> {
  let dir = planet_pos - ball_pos;
  let dist_sq = dir.dot(dir);
  let len = GRAVITY * ((BALL_MASS * planet_mass) / dist_sq);
  dir.normalize() * len
}

pub fn acceleration(ball_pos: Vector2<f32>, planets: &[Planet]) -> Vector2<f32> {
  planets.iter().fold(Vector2::new(0.0, 0.0), |acc, planet| {
    acc + gravity_force(ball_pos, planet.position(), planet.mass()) / BALL_MASS
  })
}

// Mirrors `compute_trajectory` in the generated WGSL step for step.
pub fn trace(start: Vector2<f32>, planets: &[Planet], max_iterations: u32, time_step: f32) -> Outcome {
  let mut position = start;
  let mut velocity = Vector2::new(0.0, 0.0);

  for iteration in 0..max_iterations {
    for (index, planet) in planets.iter().enumerate() {
      let radius = planet.radius();
      if distance_sq(position, planet.position()) < radius * radius {
        return Outcome::Collided {
          planet: index,
          iteration,
        };
      }
    }

    velocity += acceleration(position, planets) * time_step;
    position += velocity * time_step;
  }

  Outcome::Escaped
}

pub fn outcome_color(outcome: Outcome, planets: &[Planet], max_iterations: u32) -> Color {
  match outcome {
    Outcome::Collided { planet, iteration } => {
      let t = iteration as f32 / max_iterations as f32;
      planets[planet].color().lerp(Color::BLACK, t)
    }
    Outcome::Escaped => Color::BLACK,
  }
}

pub fn trajectory_color(start: Vector2<f32>, params: &Parameters) -> Color {
  let planets = params.planets();
  let outcome = trace(start, planets, params.max_iterations, params.time_step);
  outcome_color(outcome, planets, params.max_iterations)
}

/// World position sampled by the pixel at `(x, y)` of a `width × height`
/// surface, matching the vertex stage interpolation at the pixel center.
pub fn pixel_world_position(x: u32, y: u32, width: u32, height: u32, view: &ViewState) -> Vector2<f32> {
  let ndc = Vector2::new(
    (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
    1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
  );
  let mut world = ndc * (1.0 / view.scale()) + view.offset;
  world.x *= width as f32 / height as f32;
  world
}

/// Row major, top row first.
pub fn render_frame(width: u32, height: u32, view: &ViewState, params: &Parameters) -> Vec<Color> {
  let mut pixels = vec![Color::BLACK; width as usize * height as usize];
  pixels
    .par_chunks_mut(width.max(1) as usize)
    .enumerate()
    .for_each(|(y, row)| {
      for (x, pixel) in row.iter_mut().enumerate() {
        let start = pixel_world_position(x as u32, y as u32, width, height, view);
        *pixel = trajectory_color(start, params);
      }
    });
  pixels
}

pub fn render_image(width: u32, height: u32, view: &ViewState, params: &Parameters) -> RgbImage {
  let pixels = render_frame(width, height, view, params);
  RgbImage::from_fn(width, height, |x, y| {
    let color = pixels[(y * width + x) as usize];
    Rgb(color.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
  })
}
