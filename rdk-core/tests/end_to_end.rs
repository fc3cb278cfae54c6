use rand::rngs::StdRng;
use rand::SeedableRng;
use rdk_core::{
    generate_trial_params, Drawable, Frame, FrameError, FrameScheduler, FrameSink, LevelBounds,
    Point, StaircaseConfig, StaircaseController, StimulusConfig,
};

/// Records every dot snapshot handed to the display.
#[derive(Default)]
struct RecordingSink {
    snapshots: Vec<Vec<Point>>,
}

impl FrameSink for RecordingSink {
    fn present_frame(&mut self, frame: &Frame<'_>) -> Result<(), FrameError> {
        for drawable in frame.drawables() {
            if let Drawable::Dots { positions, .. } = drawable {
                self.snapshots.push(positions.to_vec());
            }
        }
        Ok(())
    }

    fn actual_frame_rate(&self) -> f64 {
        60.0
    }
}

fn run_trial(seed: u64) -> (Vec<Vec<Point>>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let bounds = LevelBounds {
        low_coherence: 0.2,
        high_coherence: 0.4,
        low_distance: 10.0,
        high_distance: 30.0,
    };
    let trial = generate_trial_params(&mut rng, &bounds);
    let params = StimulusConfig {
        duration: 1.0,
        ..Default::default()
    }
    .derive(60.0)
    .unwrap();

    let mut scheduler = FrameScheduler::new(params, trial.direction, trial.coherence, seed);
    let mut sink = RecordingSink::default();
    let frames = scheduler.run(&mut sink).unwrap();
    assert_eq!(frames, 60);
    (sink.snapshots, scheduler.update_counts().to_vec())
}

#[test]
fn seeded_trial_is_reproducible_bit_for_bit() {
    let (first, counts) = run_trial(2024);
    let (second, _) = run_trial(2024);
    assert_eq!(first.len(), 60);
    assert_eq!(counts, vec![20, 20, 20]);

    for (a, b) in first.iter().zip(&second) {
        for (p, q) in a.iter().zip(b) {
            assert_eq!(p.x.to_bits(), q.x.to_bits());
            assert_eq!(p.y.to_bits(), q.y.to_bits());
        }
    }

    let (other, _) = run_trial(2025);
    assert_ne!(first, other);
}

#[test]
fn staircase_feeds_the_trial_generator() {
    let mut staircase = StaircaseController::new(StaircaseConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    staircase.begin_block();

    for _ in 0..20 {
        let bounds = staircase.bounds();
        let trial = generate_trial_params(&mut rng, &bounds);
        let (low, high) = staircase.active_bounds();
        assert!(trial.coherence == low || trial.coherence == high);
        // always answer CW, so roughly half the trials are wrong
        staircase.record(trial.is_correct(rdk_core::ReferenceDirection::Cw));
    }

    assert_eq!(staircase.state().trials, 20);
    let medium = staircase.state().medium_coherence;
    assert!((0.01..=1.0).contains(&medium));
}
