use crate::geometry::{heading, opacity, polar_to_cartesian, sample_disk_point, sample_uniform_disk, Point};
use crate::stimulus::{MotionParams, NoiseMode};
use rand::seq::index;
use rand::Rng;
use serde::Serialize;
use std::f64::consts::TAU;

/// One interleaved cohort of dots with a parallel opacity per dot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DotSet {
    positions: Vec<Point>,
    opacities: Vec<f32>,
}

impl DotSet {
    pub fn from_positions(positions: Vec<Point>, exclusion_radius: f64) -> Self {
        let mut set = Self {
            opacities: vec![1.0; positions.len()],
            positions,
        };
        set.refresh_opacities(exclusion_radius);
        set
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn opacities(&self) -> &[f32] {
        &self.opacities
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn refresh_opacities(&mut self, exclusion_radius: f64) {
        for (alpha, p) in self.opacities.iter_mut().zip(&self.positions) {
            *alpha = opacity(*p, exclusion_radius);
        }
    }
}

/// Evolves dot sets frame by frame for a fixed [`MotionParams`].
#[derive(Debug, Clone)]
pub struct DotPopulation {
    params: MotionParams,
}

impl DotPopulation {
    pub fn new(params: MotionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MotionParams {
        &self.params
    }

    /// A fresh set of `n_dots` uniform over the aperture.
    pub fn initialize<R: Rng + ?Sized>(&self, rng: &mut R) -> DotSet {
        let positions = sample_uniform_disk(rng, self.params.n_dots, self.params.aperture_radius);
        DotSet::from_positions(positions, self.params.exclusion_radius)
    }

    /// Signal dots for this coherence, `round(n_dots * coherence)`.
    pub fn coherent_count(&self, n_dots: usize, coherence: f64) -> usize {
        ((n_dots as f64 * coherence.clamp(0.0, 1.0)).round() as usize).min(n_dots)
    }

    /// Advances `set` by one update.
    ///
    /// Signal membership is redrawn on every call, so no dot stays coherent
    /// across updates.
    pub fn step<R: Rng + ?Sized>(
        &self,
        set: &mut DotSet,
        direction_deg: f64,
        coherence: f64,
        rng: &mut R,
    ) {
        let n = set.len();
        let mut coherent = vec![false; n];
        for i in index::sample(rng, n, self.coherent_count(n, coherence)) {
            coherent[i] = true;
        }

        let radius = self.params.aperture_radius;
        let distance = self.params.move_distance;
        let boundary = self.params.boundary;
        let signal = heading(direction_deg, distance);

        for (p, is_signal) in set.positions.iter_mut().zip(coherent) {
            *p = if is_signal {
                boundary.apply(*p, signal, radius, rng)
            } else {
                match self.params.noise {
                    NoiseMode::RandomWalk => {
                        let delta = polar_to_cartesian(distance, rng.random::<f64>() * TAU);
                        boundary.apply(*p, delta, radius, rng)
                    }
                    // resampled inside the disk, so no boundary check
                    NoiseMode::RandomPosition => sample_disk_point(rng, radius),
                }
            };
        }

        set.refresh_opacities(self.params.exclusion_radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundaryPolicy;
    use crate::stimulus::StimulusConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(noise: NoiseMode, boundary: BoundaryPolicy) -> MotionParams {
        StimulusConfig {
            dot_density: 4.0,
            random_dot_behaviour: noise,
            boundary_policy: boundary,
            ..Default::default()
        }
        .derive(60.0)
        .unwrap()
    }

    #[test]
    fn initial_set_fills_the_aperture() {
        let population = DotPopulation::new(params(NoiseMode::RandomPosition, Default::default()));
        let mut rng = StdRng::seed_from_u64(11);
        let set = population.initialize(&mut rng);
        assert_eq!(set.len(), population.params().n_dots);
        assert_eq!(set.opacities().len(), set.len());
        assert!(set.positions().iter().all(|p| p.norm() <= 4.0));
    }

    #[test]
    fn full_coherence_translates_every_dot() {
        let mut motion = params(NoiseMode::RandomWalk, Default::default());
        motion.move_distance = 0.01;
        let population = DotPopulation::new(motion);
        let start = vec![
            Point::new(0.5, 0.5),
            Point::new(-1.0, 0.2),
            Point::new(0.0, -2.0),
            Point::new(1.5, 0.0),
        ];
        let mut set = DotSet::from_positions(start.clone(), motion.exclusion_radius);
        let mut rng = StdRng::seed_from_u64(5);
        let direction = 30.0_f64;
        let k = 10;
        for _ in 0..k {
            population.step(&mut set, direction, 1.0, &mut rng);
        }
        let (dx, dy) = (direction.to_radians().cos(), direction.to_radians().sin());
        for (p, p0) in set.positions().iter().zip(&start) {
            let expected_x = p0.x + k as f64 * 0.01 * dx;
            let expected_y = p0.y + k as f64 * 0.01 * dy;
            assert!((p.x - expected_x).abs() < 1e-9);
            assert!((p.y - expected_y).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_coherence_moves_nothing_coherently() {
        let population = DotPopulation::new(params(NoiseMode::RandomPosition, Default::default()));
        assert_eq!(population.coherent_count(50, 0.0), 0);
        assert_eq!(population.coherent_count(50, 1.0), 50);
        assert_eq!(population.coherent_count(50, 0.51), 26);
        assert_eq!(population.coherent_count(50, 1.7), 50);

        let mut rng = StdRng::seed_from_u64(2);
        let mut set = population.initialize(&mut rng);
        population.step(&mut set, 90.0, 0.0, &mut rng);
        population.step(&mut set, 90.0, 1.0, &mut rng);
        assert!(set.positions().iter().all(|p| p.norm() <= 4.0));
    }

    #[test]
    fn containment_holds_across_many_frames_for_every_mode() {
        let policies = [
            BoundaryPolicy::ReflectPreservingHeading,
            BoundaryPolicy::ReflectThroughCenter,
            BoundaryPolicy::ResampleOnExit,
        ];
        for noise in [NoiseMode::RandomPosition, NoiseMode::RandomWalk] {
            for boundary in policies {
                let population = DotPopulation::new(params(noise, boundary));
                let mut rng = StdRng::seed_from_u64(99);
                let mut set = population.initialize(&mut rng);
                for frame in 0..300 {
                    population.step(&mut set, 45.0, 0.6, &mut rng);
                    assert!(
                        set.positions().iter().all(|p| p.norm() <= 4.0),
                        "{noise:?}/{boundary:?} escaped on frame {frame}"
                    );
                }
            }
        }
    }

    #[test]
    fn opacities_track_the_exclusion_zone() {
        let motion = params(NoiseMode::RandomPosition, Default::default());
        let population = DotPopulation::new(motion);
        let mut rng = StdRng::seed_from_u64(17);
        let mut set = population.initialize(&mut rng);
        population.step(&mut set, 0.0, 0.5, &mut rng);
        for (p, alpha) in set.positions().iter().zip(set.opacities()) {
            let expected = if p.norm() < motion.exclusion_radius { 0.0 } else { 1.0 };
            assert_eq!(*alpha, expected);
        }
    }
}
