use cgmath::Vector2;
use log::warn;

pub const WHEEL_ZOOM_IN: f32 = 1.1;
pub const WHEEL_ZOOM_OUT: f32 = 0.9;

const PAN_GAIN: f32 = 1.0;

// `scale` is always strictly positive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewState {
  scale: f32,
  pub offset: Vector2<f32>,
}

impl Default for ViewState {
  fn default() -> Self {
    Self::new(1.0)
  }
}

impl ViewState {
  pub fn new(scale: f32) -> Self {
    let scale = if is_valid_scale(scale) { scale } else { 1.0 };
    Self {
      scale,
      offset: Vector2::new(0.0, 0.0),
    }
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  /// `point` is in normalized device units (`[-1, 1]` across the surface).
  pub fn screen_to_world(&self, point: Vector2<f32>, scale: f32) -> Vector2<f32> {
    point / scale + self.offset
  }

  pub fn zoom_anchor_delta(&self, center: Vector2<f32>, prev_scale: f32, new_scale: f32) -> Vector2<f32> {
    let before = self.screen_to_world(center, prev_scale);
    let after = self.screen_to_world(center, new_scale);
    before - after
  }

  /// Zooms to `new_scale` keeping the world point under the device pixel
  /// `anchor` stationary. Returns false if the scale was rejected.
  pub fn zoom_to(&mut self, anchor: Vector2<f32>, canvas: Vector2<f32>, new_scale: f32) -> bool {
    if !is_valid_scale(new_scale) {
      warn!("ignoring zoom to invalid scale {new_scale}");
      return false;
    }
    let delta = self.zoom_anchor_delta(device_to_ndc(anchor, canvas), self.scale, new_scale);
    self.scale = new_scale;
    self.offset += delta;
    true
  }

  pub fn apply_pan(&mut self, movement: Vector2<f32>, canvas: Vector2<f32>) {
    self.offset += pan_delta(movement, canvas, self.scale);
  }
}

fn is_valid_scale(scale: f32) -> bool {
  scale.is_finite() && scale > 0.0
}

pub fn device_to_ndc(pixel: Vector2<f32>, canvas: Vector2<f32>) -> Vector2<f32> {
  Vector2::new(
    2.0 * (pixel.x / canvas.x - 0.5),
    2.0 * (-pixel.y / canvas.y + 0.5),
  )
}

/// Offset change for a pointer movement of `movement` device pixels. Screen y
/// grows downwards while world y grows upwards, hence the sign flip.
pub fn pan_delta(movement: Vector2<f32>, canvas: Vector2<f32>, scale: f32) -> Vector2<f32> {
  Vector2::new(
    -PAN_GAIN * movement.x / (canvas.x * scale * 0.5),
    PAN_GAIN * movement.y / (canvas.y * scale * 0.5),
  )
}

pub fn wheel_scale(scale: f32, zoom_in: bool) -> f32 {
  if zoom_in {
    scale * WHEEL_ZOOM_IN
  } else {
    scale * WHEEL_ZOOM_OUT
  }
}
