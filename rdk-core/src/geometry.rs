//! Points in visual degrees, disk sampling, angle helpers and the aperture
//! boundary policies.
//!
//! All coordinates are relative to the aperture centre with the y axis
//! pointing up; angles are counter-clockwise from the positive x axis.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::ops::{Add, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance from the aperture centre.
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }
}

pub fn polar_to_cartesian(radius: f64, angle_rad: f64) -> Point {
    let (sin, cos) = angle_rad.sin_cos();
    Point::new(radius * cos, radius * sin)
}

/// Returns `(radius, angle_rad)` with the angle in `(-π, π]`.
pub fn cartesian_to_polar(p: Point) -> (f64, f64) {
    (p.norm(), p.y.atan2(p.x))
}

/// Displacement of `distance` along `direction_deg`.
pub fn heading(direction_deg: f64, distance: f64) -> Point {
    polar_to_cartesian(distance, direction_deg.to_radians())
}

/// Wraps any angle in degrees into `[0, 360)`.
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// One point uniformly distributed over the disk of `radius`.
pub fn sample_disk_point<R: Rng + ?Sized>(rng: &mut R, radius: f64) -> Point {
    let angle = rng.random::<f64>() * TAU;
    // sqrt keeps areal density uniform; a linear draw piles points at the centre
    let r = rng.random::<f64>().sqrt() * radius;
    polar_to_cartesian(r, angle)
}

/// `n` points uniformly distributed over the disk of `radius`.
pub fn sample_uniform_disk<R: Rng + ?Sized>(rng: &mut R, n: usize, radius: f64) -> Vec<Point> {
    (0..n).map(|_| sample_disk_point(rng, radius)).collect()
}

/// True when `p` falls inside the no-dot zone around fixation.
pub fn is_excluded(p: Point, exclusion_radius: f64) -> bool {
    p.norm() < exclusion_radius
}

pub fn opacity(p: Point, exclusion_radius: f64) -> f32 {
    if is_excluded(p, exclusion_radius) {
        0.0
    } else {
        1.0
    }
}

/// What happens to a dot whose move carried it outside the aperture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Undo the move, mirror the old position through the centre, redo the move.
    #[default]
    ReflectPreservingHeading,
    /// Undo the move and mirror the old position through the centre.
    ReflectThroughCenter,
    /// Replace the dot with a fresh uniform draw inside the aperture.
    ResampleOnExit,
}

impl BoundaryPolicy {
    /// Moves `before` by `delta` and keeps the result inside `radius`.
    ///
    /// `before` must already lie inside the aperture. Points that stay inside
    /// are returned untouched; the rng is only consulted by `ResampleOnExit`.
    pub fn apply<R: Rng + ?Sized>(
        self,
        before: Point,
        delta: Point,
        radius: f64,
        rng: &mut R,
    ) -> Point {
        let moved = before + delta;
        if moved.norm() <= radius {
            return moved;
        }
        match self {
            BoundaryPolicy::ReflectPreservingHeading => wrap_or_reflect(moved, delta, radius),
            BoundaryPolicy::ReflectThroughCenter => -before,
            BoundaryPolicy::ResampleOnExit => sample_disk_point(rng, radius),
        }
    }
}

/// Point-symmetric wrap for a dot that has just moved by `prior_delta`.
pub fn wrap_or_reflect(position: Point, prior_delta: Point, aperture_radius: f64) -> Point {
    if position.norm() <= aperture_radius {
        return position;
    }
    let before = position - prior_delta;
    let wrapped = -before + prior_delta;
    // a tangential exit can leave the re-applied move outside too
    if wrapped.norm() <= aperture_radius {
        wrapped
    } else {
        -before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn disk_samples_have_area_proportional_density() {
        let mut rng = StdRng::seed_from_u64(7);
        let radius = 4.0;
        let points = sample_uniform_disk(&mut rng, 20_000, radius);
        assert_eq!(points.len(), 20_000);
        assert!(points.iter().all(|p| p.norm() <= radius));

        for frac in [0.25, 0.5, 0.75] {
            let r = radius * frac;
            let inside = points.iter().filter(|p| p.norm() <= r).count() as f64;
            let expected = frac * frac;
            let observed = inside / points.len() as f64;
            assert!(
                (observed - expected).abs() < 0.015,
                "fraction within {r}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn angles_wrap_into_half_open_range() {
        assert_eq!(wrap_degrees(380.0), 20.0);
        assert_eq!(wrap_degrees(-20.0), 340.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-1e-18), 0.0);
        assert_eq!(wrap_degrees(0.0), 0.0);
    }

    #[test]
    fn polar_round_trip() {
        let p = polar_to_cartesian(2.0, 1.0);
        let (r, a) = cartesian_to_polar(p);
        assert!((r - 2.0).abs() < 1e-12);
        assert!((a - 1.0).abs() < 1e-12);
    }

    #[test]
    fn exclusion_test_is_strict() {
        let r = 0.32;
        assert_eq!(opacity(Point::new(r, 0.0), r), 1.0);
        assert_eq!(opacity(Point::new(0.0, r - 1e-9), r), 0.0);
        assert_eq!(opacity(Point::new(0.0, r + 1e-9), r), 1.0);
        assert!(is_excluded(Point::ORIGIN, r));
    }

    #[test]
    fn reflect_preserving_heading_mirrors_and_keeps_direction() {
        let mut rng = StdRng::seed_from_u64(1);
        let before = Point::new(3.9, 0.0);
        let delta = Point::new(0.2, 0.0);
        let out = BoundaryPolicy::ReflectPreservingHeading.apply(before, delta, 4.0, &mut rng);
        assert!((out.x - (-3.7)).abs() < 1e-12);
        assert_eq!(out.y, 0.0);

        let wrapped = wrap_or_reflect(before + delta, delta, 4.0);
        assert!((wrapped.x - out.x).abs() < 1e-12);
    }

    #[test]
    fn tangential_exit_stays_inside() {
        let mut rng = StdRng::seed_from_u64(1);
        let before = Point::new(4.0, 0.0);
        let delta = Point::new(0.0, 0.3);
        let out = BoundaryPolicy::ReflectPreservingHeading.apply(before, delta, 4.0, &mut rng);
        assert!(out.norm() <= 4.0);
        assert_eq!(out, Point::new(-4.0, 0.0));
    }

    #[test]
    fn heading_policy_matches_wrap_or_reflect() {
        let mut rng = StdRng::seed_from_u64(11);
        let radius = 4.0;
        let mut exits = 0;
        for _ in 0..5_000 {
            let before = sample_disk_point(&mut rng, radius);
            let delta = heading(rng.random::<f64>() * 360.0, 0.8);
            let out = BoundaryPolicy::ReflectPreservingHeading.apply(before, delta, radius, &mut rng);
            assert_eq!(out, wrap_or_reflect(before + delta, delta, radius));
            if (before + delta).norm() > radius {
                exits += 1;
            }
        }
        assert!(exits > 0);
    }

    #[test]
    fn every_policy_contains_the_dot() {
        let mut rng = StdRng::seed_from_u64(3);
        let radius = 4.0;
        let policies = [
            BoundaryPolicy::ReflectPreservingHeading,
            BoundaryPolicy::ReflectThroughCenter,
            BoundaryPolicy::ResampleOnExit,
        ];
        for policy in policies {
            for _ in 0..2_000 {
                let before = sample_disk_point(&mut rng, radius);
                let delta = heading(rng.random::<f64>() * 360.0, 0.6);
                let out = policy.apply(before, delta, radius, &mut rng);
                assert!(out.norm() <= radius, "{policy:?} left {out:?} outside");
            }
        }
    }

    #[test]
    fn points_inside_are_untouched() {
        let mut rng = StdRng::seed_from_u64(3);
        let before = Point::new(1.0, 1.0);
        let delta = Point::new(0.1, -0.1);
        for policy in [
            BoundaryPolicy::ReflectThroughCenter,
            BoundaryPolicy::ResampleOnExit,
        ] {
            assert_eq!(policy.apply(before, delta, 4.0, &mut rng), before + delta);
        }
    }
}
