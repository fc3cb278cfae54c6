use crate::geometry::wrap_degrees;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the reference the true motion lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceDirection {
    #[serde(rename = "CW")]
    Cw,
    #[serde(rename = "CCW")]
    Ccw,
}

impl fmt::Display for ReferenceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceDirection::Cw => "CW",
            ReferenceDirection::Ccw => "CCW",
        })
    }
}

/// `(direction ± distance) mod 360`, plus for CW and minus for CCW.
pub fn reference_angle(direction: f64, distance: f64, side: ReferenceDirection) -> f64 {
    match side {
        ReferenceDirection::Cw => wrap_degrees(direction + distance),
        ReferenceDirection::Ccw => wrap_degrees(direction - distance),
    }
}

/// Low/high levels each trial picks between by coin flip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelBounds {
    pub low_coherence: f64,
    pub high_coherence: f64,
    pub low_distance: f64,
    pub high_distance: f64,
}

impl LevelBounds {
    /// Same level on both sides, as used during training.
    pub fn fixed(coherence: f64, distance: f64) -> Self {
        Self {
            low_coherence: coherence,
            high_coherence: coherence,
            low_distance: distance,
            high_distance: distance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialParams {
    /// Motion direction in degrees, in `(0, 360]`.
    pub direction: f64,
    pub coherence: f64,
    pub distance: f64,
    pub reference_direction: ReferenceDirection,
    /// Always in `[0, 360)`.
    pub reference_angle: f64,
}

impl TrialParams {
    pub fn new(
        direction: f64,
        coherence: f64,
        distance: f64,
        reference_direction: ReferenceDirection,
    ) -> Self {
        Self {
            direction,
            coherence,
            distance,
            reference_direction,
            reference_angle: reference_angle(direction, distance, reference_direction),
        }
    }

    pub fn is_correct(&self, response: ReferenceDirection) -> bool {
        response == self.reference_direction
    }
}

/// Samples one trial: uniform direction, coin flips for coherence, distance
/// and reference side.
pub fn generate_trial_params<R: Rng + ?Sized>(rng: &mut R, bounds: &LevelBounds) -> TrialParams {
    let direction = 360.0 - rng.random::<f64>() * 360.0;
    let coherence = if rng.random_bool(0.5) {
        bounds.high_coherence
    } else {
        bounds.low_coherence
    };
    let distance = if rng.random_bool(0.5) {
        bounds.high_distance
    } else {
        bounds.low_distance
    };
    let side = if rng.random_bool(0.5) {
        ReferenceDirection::Cw
    } else {
        ReferenceDirection::Ccw
    };
    TrialParams::new(direction, coherence, distance, side)
}

/// Where a trial is in its presentation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Fixation,
    Stimulus,
    Response,
    Feedback,
    Confidence,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRating {
    /// Percentage in steps of ten, 50 to 100.
    pub rating: u8,
    pub response_time: f64,
}

/// What the participant did on one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub response: ReferenceDirection,
    pub response_time: f64,
    pub correct: bool,
    pub confidence: Option<ConfidenceRating>,
}
