use crate::dots::{DotPopulation, DotSet};
use crate::error::FrameError;
use crate::scene::{palette, Drawable, Frame, FrameSink};
use crate::stimulus::MotionParams;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Mixes a set index into the trial seed so every set draws from its own stream.
fn set_seed(seed: u64, set_index: usize) -> u64 {
    seed ^ (set_index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Rotates through `n_sets` independently seeded dot sets, one per frame.
///
/// Only the active set (`frame_count % n_sets`) is advanced and drawn; the
/// others stay frozen until their turn.
pub struct FrameScheduler {
    population: DotPopulation,
    sets: Vec<DotSet>,
    rngs: Vec<StdRng>,
    updates: Vec<usize>,
    direction_deg: f64,
    coherence: f64,
    frame_count: usize,
}

impl FrameScheduler {
    pub fn new(params: MotionParams, direction_deg: f64, coherence: f64, seed: u64) -> Self {
        let population = DotPopulation::new(params);
        let mut rngs: Vec<StdRng> = (0..params.n_sets)
            .map(|i| StdRng::seed_from_u64(set_seed(seed, i)))
            .collect();
        let sets = rngs
            .iter_mut()
            .map(|rng| population.initialize(rng))
            .collect();
        Self {
            population,
            sets,
            rngs,
            updates: vec![0; params.n_sets],
            direction_deg,
            coherence,
            frame_count: 0,
        }
    }

    pub fn params(&self) -> &MotionParams {
        self.population.params()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn sets(&self) -> &[DotSet] {
        &self.sets
    }

    /// How many times each set has been advanced so far.
    pub fn update_counts(&self) -> &[usize] {
        &self.updates
    }

    /// The presentation ends once `frame_count / frame_rate` reaches the duration.
    pub fn is_finished(&self) -> bool {
        let params = self.params();
        (self.frame_count as f64) / params.frame_rate >= params.duration
    }

    /// Advances the active set and returns its index, or `None` when the
    /// presentation time is used up.
    pub fn advance(&mut self) -> Option<usize> {
        if self.is_finished() {
            return None;
        }
        let active = self.frame_count % self.sets.len();
        self.population.step(
            &mut self.sets[active],
            self.direction_deg,
            self.coherence,
            &mut self.rngs[active],
        );
        self.updates[active] += 1;
        self.frame_count += 1;
        Some(active)
    }

    /// Drives the whole presentation, handing one frame per refresh to `sink`.
    ///
    /// Returns the number of frames shown. An abort from the sink stops the
    /// loop immediately.
    pub fn run<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<usize, FrameError> {
        while let Some(active) = self.advance() {
            let frame = stimulus_frame(self.params(), &self.sets[active]);
            sink.present_frame(&frame)?;
        }
        log::debug!(
            "stimulus finished after {} frames, set updates {:?}",
            self.frame_count,
            self.updates
        );
        Ok(self.frame_count)
    }
}

/// Aperture outline, fixation marker and one dot set.
pub fn stimulus_frame<'a>(params: &MotionParams, set: &'a DotSet) -> Frame<'a> {
    Frame::new(vec![
        Drawable::Fixation {
            diameter: params.fixation_diameter,
            color: palette::WHITE,
        },
        Drawable::ApertureOutline {
            radius: params.aperture_radius,
            color: palette::WHITE,
        },
        Drawable::Dots {
            positions: set.positions(),
            opacities: set.opacities(),
            diameter: params.dot_diameter,
            color: palette::WHITE,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::StimulusConfig;

    struct CountingSink {
        frames: usize,
        dot_counts: Vec<usize>,
        abort_after: Option<usize>,
    }

    impl FrameSink for CountingSink {
        fn present_frame(&mut self, frame: &Frame<'_>) -> Result<(), FrameError> {
            self.frames += 1;
            for drawable in frame.drawables() {
                if let Drawable::Dots { positions, .. } = drawable {
                    self.dot_counts.push(positions.len());
                }
            }
            match self.abort_after {
                Some(limit) if self.frames >= limit => Err(FrameError::Aborted),
                _ => Ok(()),
            }
        }

        fn actual_frame_rate(&self) -> f64 {
            60.0
        }
    }

    fn one_second() -> MotionParams {
        StimulusConfig {
            duration: 1.0,
            ..Default::default()
        }
        .derive(60.0)
        .unwrap()
    }

    #[test]
    fn sets_take_turns() {
        let mut scheduler = FrameScheduler::new(one_second(), 90.0, 0.5, 1);
        let order: Vec<usize> = (0..7).filter_map(|_| scheduler.advance()).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(scheduler.update_counts(), &[3, 2, 2]);
    }

    #[test]
    fn frozen_sets_do_not_move() {
        let mut scheduler = FrameScheduler::new(one_second(), 90.0, 0.5, 1);
        let before = scheduler.sets()[1].clone();
        scheduler.advance();
        assert_eq!(scheduler.sets()[1], before);
    }

    #[test]
    fn run_presents_one_set_per_frame_until_duration() {
        let mut scheduler = FrameScheduler::new(one_second(), 180.0, 0.3, 4);
        let mut sink = CountingSink {
            frames: 0,
            dot_counts: Vec::new(),
            abort_after: None,
        };
        let shown = scheduler.run(&mut sink).unwrap();
        assert_eq!(shown, 60);
        assert_eq!(sink.frames, 60);
        assert!(sink.dot_counts.iter().all(|&n| n == 50));
        assert_eq!(scheduler.update_counts(), &[20, 20, 20]);
        assert!(scheduler.advance().is_none());
    }

    #[test]
    fn abort_stops_the_loop() {
        let mut scheduler = FrameScheduler::new(one_second(), 0.0, 0.3, 4);
        let mut sink = CountingSink {
            frames: 0,
            dot_counts: Vec::new(),
            abort_after: Some(5),
        };
        assert!(matches!(scheduler.run(&mut sink), Err(FrameError::Aborted)));
        assert_eq!(scheduler.frame_count(), 5);
    }

    #[test]
    fn distinct_sets_start_from_distinct_positions() {
        let scheduler = FrameScheduler::new(one_second(), 0.0, 0.3, 4);
        assert_ne!(scheduler.sets()[0], scheduler.sets()[1]);
    }
}
