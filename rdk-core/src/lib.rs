pub mod dots;
pub mod error;
pub mod geometry;
pub mod phase;
pub mod scene;
pub mod scheduler;
pub mod staircase;
pub mod stimulus;
pub mod trial;

pub use dots::{DotPopulation, DotSet};
pub use error::{ConfigError, FrameError};
pub use geometry::{BoundaryPolicy, Point};
pub use phase::{Phase, SessionStage};
pub use scene::{palette, Drawable, Frame, FrameSink, Rgba};
pub use scheduler::{stimulus_frame, FrameScheduler};
pub use staircase::{Adjustment, Dimension, StaircaseConfig, StaircaseController, StaircaseState};
pub use stimulus::{MotionParams, NoiseMode, StimulusConfig};
pub use trial::{
    generate_trial_params, reference_angle, ConfidenceRating, LevelBounds, ReferenceDirection,
    TrialOutcome, TrialParams, TrialState,
};
