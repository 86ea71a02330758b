use crate::camera::{wheel_scale, ViewState};
use cgmath::{InnerSpace, Vector2};
use log::debug;
use std::time::{Duration, Instant};

pub const MAX_REDRAWS_PER_SECOND: f64 = 120.0;

pub const MOUSE_POINTER_ID: u64 = u64::MAX;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pointer {
  pub id: u64,
  pub position: Vector2<f32>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PointerEvent {
  Down(Pointer),
  Move(Pointer),
  Up(Pointer),
  Cancel(Pointer),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomEvent {
  pub center: Vector2<f32>,
  pub scale: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct PinchAnchor {
  distance: f32,
  scale: f32,
}

/// Promotes to a pinch when a second pointer goes down.
#[derive(Debug, Default)]
pub struct PinchTracker {
  pointers: Vec<Pointer>,
  anchor: Option<PinchAnchor>,
}

impl PinchTracker {
  pub fn is_zooming(&self) -> bool {
    self.anchor.is_some()
  }

  pub fn active_pointers(&self) -> usize {
    self.pointers.len()
  }

  pub fn on_pointer_down(&mut self, pointer: Pointer, scale: f32) {
    match self.pointers.iter_mut().find(|p| p.id == pointer.id) {
      Some(known) => known.position = pointer.position,
      None => self.pointers.push(pointer),
    }
    if self.anchor.is_none() {
      if let Some(distance) = self.separation().filter(|d| *d > 0.0) {
        debug!("pinch started at separation {distance}");
        self.anchor = Some(PinchAnchor { distance, scale });
      }
    }
  }

  /// Movement since the last event seen for this pointer. Also records the new
  /// position, so call it once per move event.
  pub fn movement(&mut self, pointer: Pointer) -> Vector2<f32> {
    match self.pointers.iter_mut().find(|p| p.id == pointer.id) {
      Some(known) => {
        let delta = pointer.position - known.position;
        known.position = pointer.position;
        delta
      }
      None => Vector2::new(0.0, 0.0),
    }
  }

  pub fn on_pointer_move(&mut self, pointer: Pointer) -> Option<ZoomEvent> {
    if let Some(known) = self.pointers.iter_mut().find(|p| p.id == pointer.id) {
      known.position = pointer.position;
    }
    let anchor = self.anchor?;
    let distance = self.separation()?;
    let (a, b) = (self.pointers[0].position, self.pointers[1].position);
    Some(ZoomEvent {
      center: (a + b) * 0.5,
      scale: anchor.scale * distance / anchor.distance,
    })
  }

  pub fn on_pointer_up(&mut self, pointer: Pointer) {
    self.pointers.retain(|p| p.id != pointer.id);
    if self.pointers.len() < 2 && self.anchor.take().is_some() {
      debug!("pinch ended");
    }
  }

  fn separation(&self) -> Option<f32> {
    match self.pointers.as_slice() {
      [a, b, ..] => Some((a.position - b.position).magnitude()),
      _ => None,
    }
  }
}

// Requests that arrive before the gate reopens are dropped, not queued.
#[derive(Debug)]
pub struct FrameThrottle {
  min_interval: Duration,
  last: Option<Instant>,
}

impl Default for FrameThrottle {
  fn default() -> Self {
    Self::new(Duration::from_secs_f64(1.0 / MAX_REDRAWS_PER_SECOND))
  }
}

impl FrameThrottle {
  pub fn new(min_interval: Duration) -> Self {
    Self {
      min_interval,
      last: None,
    }
  }

  pub fn permit(&mut self, now: Instant) -> bool {
    match self.last {
      Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
      _ => {
        self.last = Some(now);
        true
      }
    }
  }
}

/// Every handler returns whether a redraw should be issued now.
#[derive(Debug)]
pub struct GestureRouter {
  panning: bool,
  pinch: PinchTracker,
  throttle: FrameThrottle,
  surface: Vector2<f32>,
}

impl GestureRouter {
  pub fn new(width: u32, height: u32) -> Self {
    Self::with_throttle(width, height, FrameThrottle::default())
  }

  pub fn with_throttle(width: u32, height: u32, throttle: FrameThrottle) -> Self {
    Self {
      panning: false,
      pinch: PinchTracker::default(),
      throttle,
      surface: surface_size(width, height),
    }
  }

  pub fn is_panning(&self) -> bool {
    self.panning
  }

  pub fn is_pinching(&self) -> bool {
    self.pinch.is_zooming()
  }

  pub fn surface(&self) -> Vector2<f32> {
    self.surface
  }

  pub fn on_pointer(&mut self, view: &mut ViewState, event: PointerEvent, now: Instant) -> bool {
    match event {
      PointerEvent::Down(pointer) => {
        self.panning = true;
        self.pinch.on_pointer_down(pointer, view.scale());
        false
      }
      PointerEvent::Move(pointer) => {
        let movement = self.pinch.movement(pointer);
        if self.pinch.is_zooming() {
          match self.pinch.on_pointer_move(pointer) {
            Some(zoom) => self.zoom(view, zoom.center, zoom.scale, now),
            None => false,
          }
        } else if self.panning {
          view.apply_pan(movement, self.surface);
          self.request_redraw(now)
        } else {
          false
        }
      }
      PointerEvent::Up(pointer) | PointerEvent::Cancel(pointer) => {
        self.panning = false;
        self.pinch.on_pointer_up(pointer);
        false
      }
    }
  }

  /// `zoom_in` is the wheel direction; the magnitude of the scroll is ignored.
  pub fn on_wheel(&mut self, view: &mut ViewState, cursor: Vector2<f32>, zoom_in: bool, now: Instant) -> bool {
    let scale = wheel_scale(view.scale(), zoom_in);
    self.zoom(view, cursor, scale, now)
  }

  pub fn on_resize(&mut self, width: u32, height: u32, now: Instant) -> bool {
    self.surface = surface_size(width, height);
    self.request_redraw(now)
  }

  pub fn request_redraw(&mut self, now: Instant) -> bool {
    self.throttle.permit(now)
  }

  fn zoom(&mut self, view: &mut ViewState, center: Vector2<f32>, scale: f32, now: Instant) -> bool {
    if !view.zoom_to(center, self.surface, scale) {
      return false;
    }
    self.request_redraw(now)
  }
}

fn surface_size(width: u32, height: u32) -> Vector2<f32> {
  Vector2::new(width.max(1) as f32, height.max(1) as f32)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::camera::device_to_ndc;
  use approx::assert_relative_eq;

  fn mouse(x: f32, y: f32) -> Pointer {
    touch(MOUSE_POINTER_ID, x, y)
  }

  fn touch(id: u64, x: f32, y: f32) -> Pointer {
    Pointer {
      id,
      position: Vector2::new(x, y),
    }
  }

  fn ms(start: Instant, millis: u64) -> Instant {
    start + Duration::from_millis(millis)
  }

  #[test]
  fn throttle_allows_one_redraw_per_window() {
    let mut throttle = FrameThrottle::default();
    let start = Instant::now();
    let permitted: Vec<u64> = (0..=20).filter(|t| throttle.permit(ms(start, *t))).collect();
    // interval is 8.33ms
    assert_eq!(permitted, vec![0, 9, 18]);
  }

  #[test]
  fn dropped_requests_are_not_replayed() {
    let mut throttle = FrameThrottle::default();
    let start = Instant::now();
    assert!(throttle.permit(start));
    assert!(!throttle.permit(ms(start, 1)));
    assert!(!throttle.permit(ms(start, 2)));
    assert!(throttle.permit(ms(start, 100)));
    assert!(!throttle.permit(ms(start, 101)));
  }

  #[test]
  fn drag_pans_the_view() {
    let mut router = GestureRouter::new(800, 600);
    let mut view = ViewState::default();
    let start = Instant::now();

    assert!(!router.on_pointer(&mut view, PointerEvent::Down(mouse(100.0, 100.0)), start));
    assert!(router.is_panning());
    assert!(router.on_pointer(&mut view, PointerEvent::Move(mouse(500.0, 400.0)), ms(start, 20)));

    assert_relative_eq!(view.offset.x, -1.0);
    assert_relative_eq!(view.offset.y, 1.0);

    router.on_pointer(&mut view, PointerEvent::Up(mouse(500.0, 400.0)), ms(start, 40));
    assert!(!router.is_panning());
    assert!(!router.on_pointer(&mut view, PointerEvent::Move(mouse(0.0, 0.0)), ms(start, 60)));
    assert_relative_eq!(view.offset.x, -1.0);
  }

  #[test]
  fn hover_without_press_does_nothing() {
    let mut router = GestureRouter::new(800, 600);
    let mut view = ViewState::default();
    assert!(!router.on_pointer(&mut view, PointerEvent::Move(mouse(10.0, 10.0)), Instant::now()));
    assert_eq!(view, ViewState::default());
  }

  #[test]
  fn throttled_move_still_updates_view() {
    let mut router = GestureRouter::new(800, 600);
    let mut view = ViewState::default();
    let start = Instant::now();
    router.on_pointer(&mut view, PointerEvent::Down(mouse(0.0, 0.0)), start);
    assert!(router.on_pointer(&mut view, PointerEvent::Move(mouse(4.0, 0.0)), start));
    assert!(!router.on_pointer(&mut view, PointerEvent::Move(mouse(8.0, 0.0)), ms(start, 1)));
    assert_relative_eq!(view.offset.x, -8.0 / 400.0);
  }

  #[test]
  fn wheel_zooms_around_cursor() {
    let mut router = GestureRouter::new(800, 600);
    let mut view = ViewState::default();
    let cursor = Vector2::new(200.0, 450.0);
    let ndc = device_to_ndc(cursor, router.surface());
    let before = view.screen_to_world(ndc, view.scale());

    assert!(router.on_wheel(&mut view, cursor, true, Instant::now()));
    assert_relative_eq!(view.scale(), 1.1);
    let after = view.screen_to_world(ndc, view.scale());
    assert_relative_eq!(before.x, after.x, epsilon = 1e-5);
    assert_relative_eq!(before.y, after.y, epsilon = 1e-5);
    assert!(!router.is_panning());
  }

  #[test]
  fn pinch_suppresses_panning_and_zooms() {
    let mut router = GestureRouter::new(800, 600);
    let mut view = ViewState::default();
    let start = Instant::now();

    router.on_pointer(&mut view, PointerEvent::Down(touch(1, 300.0, 300.0)), start);
    router.on_pointer(&mut view, PointerEvent::Down(touch(2, 500.0, 300.0)), start);
    assert!(router.is_pinching());

    let offset_before = view.offset;
    assert!(router.on_pointer(&mut view, PointerEvent::Move(touch(2, 700.0, 300.0)), ms(start, 20)));
    // separation doubled from 200 to 400
    assert_relative_eq!(view.scale(), 2.0);
    assert_ne!(view.offset, offset_before);

    router.on_pointer(&mut view, PointerEvent::Up(touch(2, 700.0, 300.0)), ms(start, 40));
    assert!(!router.is_pinching());
    assert!(!router.is_panning());
  }

  #[test]
  fn cancel_returns_both_channels_to_idle() {
    let mut router = GestureRouter::new(800, 600);
    let mut view = ViewState::default();
    let start = Instant::now();
    router.on_pointer(&mut view, PointerEvent::Down(touch(1, 0.0, 0.0)), start);
    router.on_pointer(&mut view, PointerEvent::Down(touch(2, 10.0, 0.0)), start);
    router.on_pointer(&mut view, PointerEvent::Cancel(touch(1, 0.0, 0.0)), start);
    assert!(!router.is_panning());
    assert!(!router.is_pinching());
  }

  #[test]
  fn resize_keeps_camera() {
    let mut router = GestureRouter::new(800, 600);
    let mut view = ViewState::new(3.0);
    view.offset = Vector2::new(1.0, 2.0);
    let snapshot = view;
    assert!(router.on_resize(1024, 768, Instant::now()));
    assert_eq!(router.surface(), Vector2::new(1024.0, 768.0));
    assert_eq!(view, snapshot);
  }

  #[test]
  fn pinch_tracker_reports_movement_per_pointer() {
    let mut pinch = PinchTracker::default();
    pinch.on_pointer_down(touch(5, 10.0, 10.0), 1.0);
    assert_eq!(pinch.movement(touch(5, 13.0, 6.0)), Vector2::new(3.0, -4.0));
    assert_eq!(pinch.movement(touch(5, 13.0, 6.0)), Vector2::new(0.0, 0.0));
    assert_eq!(pinch.movement(touch(9, 1.0, 1.0)), Vector2::new(0.0, 0.0));
    assert_eq!(pinch.active_pointers(), 1);
    assert!(!pinch.is_zooming());
  }
}
