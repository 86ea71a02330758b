use crate::{Color, Planet, MAX_PLANETS, MIN_PLANETS};
use cgmath::{InnerSpace, Vector2};
use log::debug;
use rand::{rngs::SmallRng, Rng};

/// Disk radius range in device pixels.
pub const MIN_DISK_RADIUS: f32 = 20.0;
pub const MAX_DISK_RADIUS: f32 = 400.0;

const ATTEMPTS_PER_DISK: u32 = 200;
const MAX_ROUNDS: u32 = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
  #[error("could not place {count} disks on a {width}x{height} canvas")]
  Exhausted { count: usize, width: u32, height: u32 },
}

/// A disk in device pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Disk {
  pub center: Vector2<f32>,
  pub radius: f32,
}

impl Disk {
  fn overlaps(&self, other: &Disk) -> bool {
    let reach = self.radius + other.radius;
    (self.center - other.center).magnitude2() < reach * reach
  }
}

/// Places `count` non-overlapping disks fully inside the canvas. Each disk gets
/// a bounded number of random attempts; when one runs out the whole layout is
/// retried with both radius bounds halved.
pub fn pack_disks(
  rng: &mut SmallRng,
  count: usize,
  min_radius: f32,
  max_radius: f32,
  width: u32,
  height: u32,
) -> Result<Vec<Disk>, LayoutError> {
  let size = Vector2::new(width as f32, height as f32);
  let (mut min_radius, mut max_radius) = (min_radius, max_radius.max(min_radius));

  for round in 0..MAX_ROUNDS {
    if let Some(disks) = try_pack(rng, count, min_radius, max_radius, size) {
      return Ok(disks);
    }
    debug!("layout round {round} failed for {count} disks, shrinking radii");
    min_radius *= 0.5;
    max_radius *= 0.5;
  }

  Err(LayoutError::Exhausted { count, width, height })
}

fn try_pack(
  rng: &mut SmallRng,
  count: usize,
  min_radius: f32,
  max_radius: f32,
  size: Vector2<f32>,
) -> Option<Vec<Disk>> {
  let mut disks: Vec<Disk> = Vec::with_capacity(count);
  'disk: for _ in 0..count {
    for _ in 0..ATTEMPTS_PER_DISK {
      // never larger than what fits in the canvas
      let limit = max_radius.min(size.x * 0.5).min(size.y * 0.5);
      if limit <= 0.0 {
        return None;
      }
      let radius = if limit > min_radius {
        rng.gen_range(min_radius..limit)
      } else {
        limit
      };
      let center = Vector2::new(
        rng.gen_range(radius..=size.x - radius),
        rng.gen_range(radius..=size.y - radius),
      );
      let candidate = Disk { center, radius };
      if disks.iter().all(|d| !d.overlaps(&candidate)) {
        disks.push(candidate);
        continue 'disk;
      }
    }
    return None;
  }
  Some(disks)
}

pub fn random_color(rng: &mut SmallRng) -> Color {
  Color::new(rng.gen(), rng.gen(), rng.gen())
}

pub fn disk_to_world(disk: &Disk, width: u32, height: u32) -> (Vector2<f32>, f32) {
  // Height spans two world units around the canvas center, y up, so planets
  // land where they are drawn at unit zoom. This replaces a fixed 1/400
  // scale with no centering or flip.
  let unit = height as f32 * 0.5;
  let position = Vector2::new(
    (disk.center.x - width as f32 * 0.5) / unit,
    (height as f32 * 0.5 - disk.center.y) / unit,
  );
  (position, disk.radius / unit)
}

/// Lays out `count` planets (clamped to the supported range) on a
/// `width × height` canvas and gives each a random color.
pub fn create_planets(
  rng: &mut SmallRng,
  count: usize,
  width: u32,
  height: u32,
) -> Result<Vec<Planet>, LayoutError> {
  let count = count.clamp(MIN_PLANETS, MAX_PLANETS);
  let (width, height) = (width.max(1), height.max(1));
  let disks = pack_disks(rng, count, MIN_DISK_RADIUS, MAX_DISK_RADIUS, width, height)?;
  Ok(
    disks
      .iter()
      .map(|disk| {
        let (position, radius) = disk_to_world(disk, width, height);
        Planet::new(position, radius, random_color(rng))
      })
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use rand::SeedableRng;

  #[test]
  fn disks_do_not_overlap_and_stay_inside() {
    let mut rng = SmallRng::seed_from_u64(42);
    for count in [1, 3, 25, 100] {
      let disks = pack_disks(&mut rng, count, 20.0, 400.0, 1280, 720).unwrap();
      assert_eq!(disks.len(), count);
      for (i, a) in disks.iter().enumerate() {
        assert!(a.radius > 0.0);
        assert!(a.center.x - a.radius >= 0.0 && a.center.x + a.radius <= 1280.0 + 1e-3);
        assert!(a.center.y - a.radius >= 0.0 && a.center.y + a.radius <= 720.0 + 1e-3);
        for b in &disks[i + 1..] {
          assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
      }
    }
  }

  #[test]
  fn tiny_canvas_shrinks_radii() {
    let mut rng = SmallRng::seed_from_u64(7);
    let disks = pack_disks(&mut rng, 4, 20.0, 400.0, 30, 30).unwrap();
    assert_eq!(disks.len(), 4);
    assert!(disks.iter().all(|d| d.radius < 15.0));
  }

  #[test]
  fn zero_count_is_clamped_to_one_planet() {
    let mut rng = SmallRng::seed_from_u64(1);
    let planets = create_planets(&mut rng, 0, 800, 600).unwrap();
    assert_eq!(planets.len(), 1);
    let planets = create_planets(&mut rng, 500, 1920, 1080).unwrap();
    assert_eq!(planets.len(), MAX_PLANETS);
  }

  #[test]
  fn world_mapping_centers_canvas() {
    let disk = Disk {
      center: Vector2::new(400.0, 300.0),
      radius: 60.0,
    };
    let (position, radius) = disk_to_world(&disk, 800, 600);
    assert_relative_eq!(position.x, 0.0);
    assert_relative_eq!(position.y, 0.0);
    assert_relative_eq!(radius, 0.2);

    let corner = Disk {
      center: Vector2::new(0.0, 0.0),
      radius: 1.0,
    };
    let (position, _) = disk_to_world(&corner, 800, 600);
    assert_relative_eq!(position.x, -800.0 / 600.0);
    assert_relative_eq!(position.y, 1.0);
  }

  #[test]
  fn colors_are_in_unit_range() {
    let mut rng = SmallRng::seed_from_u64(3);
    for _ in 0..100 {
      let c = random_color(&mut rng);
      for v in c.to_array() {
        assert!((0.0..=1.0).contains(&v));
      }
    }
  }
}
