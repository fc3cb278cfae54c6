//! Two interleaved 2-down/1-up staircases, one for coherence and one for
//! angular distance, with one dimension active per block.

use crate::error::{positive, within, ConfigError};
use crate::trial::LevelBounds;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COHERENCE_RANGE: (f64, f64) = (0.01, 1.0);
pub const DISTANCE_RANGE: (f64, f64) = (1.0, 50.0);

/// Correct answers in a row needed before the task gets harder.
const STREAK_TO_DESCEND: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Coherence,
    Distance,
}

impl Dimension {
    pub fn other(self) -> Self {
        match self {
            Dimension::Coherence => Dimension::Distance,
            Dimension::Distance => Dimension::Coherence,
        }
    }

    pub fn range(self) -> (f64, f64) {
        match self {
            Dimension::Coherence => COHERENCE_RANGE,
            Dimension::Distance => DISTANCE_RANGE,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dimension::Coherence => "coherence",
            Dimension::Distance => "distance",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaircaseConfig {
    pub initial_coherence: f64,
    pub initial_distance: f64,
    pub coherence_step: f64,
    pub distance_step: f64,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            initial_coherence: 0.3,
            initial_distance: 20.0,
            coherence_step: 0.01,
            distance_step: 1.0,
        }
    }
}

impl StaircaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        within("initial_coherence", self.initial_coherence, COHERENCE_RANGE)?;
        within("initial_distance", self.initial_distance, DISTANCE_RANGE)?;
        positive("coherence_step", self.coherence_step)?;
        positive("distance_step", self.distance_step)?;
        Ok(())
    }
}

/// Everything the controller knows, logged with every calibration trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaircaseState {
    pub medium_coherence: f64,
    pub medium_distance: f64,
    pub bounds: LevelBounds,
    pub correct_streak: u32,
    pub active_dimension: Dimension,
    pub blocks_started: usize,
    pub trials: usize,
}

/// Which way the last outcome moved the active level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Easier,
    Harder,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct StaircaseController {
    config: StaircaseConfig,
    state: StaircaseState,
}

fn derived_bounds(medium: f64, (min, max): (f64, f64)) -> (f64, f64) {
    ((medium * 0.5).clamp(min, max), (medium * 2.0).clamp(min, max))
}

impl StaircaseController {
    /// Starts with the distance flag set so the first `begin_block` lands on
    /// coherence.
    pub fn new(config: StaircaseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut controller = Self {
            state: StaircaseState {
                medium_coherence: config.initial_coherence,
                medium_distance: config.initial_distance,
                bounds: LevelBounds::fixed(config.initial_coherence, config.initial_distance),
                correct_streak: 0,
                active_dimension: Dimension::Distance,
                blocks_started: 0,
                trials: 0,
            },
            config,
        };
        controller.recompute_bounds();
        Ok(controller)
    }

    pub fn state(&self) -> &StaircaseState {
        &self.state
    }

    pub fn active_dimension(&self) -> Dimension {
        self.state.active_dimension
    }

    pub fn medium(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Coherence => self.state.medium_coherence,
            Dimension::Distance => self.state.medium_distance,
        }
    }

    /// Derived bounds for both dimensions.
    pub fn bounds(&self) -> LevelBounds {
        self.state.bounds
    }

    /// `(low, high)` for whichever dimension the current block calibrates.
    pub fn active_bounds(&self) -> (f64, f64) {
        let b = &self.state.bounds;
        match self.state.active_dimension {
            Dimension::Coherence => (b.low_coherence, b.high_coherence),
            Dimension::Distance => (b.low_distance, b.high_distance),
        }
    }

    /// Flips the active dimension at a block boundary.
    pub fn begin_block(&mut self) -> Dimension {
        self.state.active_dimension = self.state.active_dimension.other();
        self.state.blocks_started += 1;
        log::info!(
            "staircase block {} calibrates {}",
            self.state.blocks_started,
            self.state.active_dimension
        );
        self.state.active_dimension
    }

    /// Applies one trial outcome with the 2-down/1-up rule.
    pub fn record(&mut self, correct: bool) -> Adjustment {
        self.state.trials += 1;
        let dimension = self.state.active_dimension;
        let adjustment = if correct {
            self.state.correct_streak += 1;
            if self.state.correct_streak == STREAK_TO_DESCEND {
                self.state.correct_streak = 0;
                self.shift(dimension, -1.0);
                Adjustment::Harder
            } else {
                Adjustment::Unchanged
            }
        } else {
            self.state.correct_streak = 0;
            self.shift(dimension, 1.0);
            Adjustment::Easier
        };
        self.recompute_bounds();
        log::debug!(
            "staircase {dimension}: correct={correct} -> {adjustment:?}, medium {:.3}",
            self.medium(dimension)
        );
        adjustment
    }

    fn shift(&mut self, dimension: Dimension, sign: f64) {
        let (min, max) = dimension.range();
        match dimension {
            Dimension::Coherence => {
                let next = self.state.medium_coherence + sign * self.config.coherence_step;
                self.state.medium_coherence = next.clamp(min, max);
            }
            Dimension::Distance => {
                let next = self.state.medium_distance + sign * self.config.distance_step;
                self.state.medium_distance = next.clamp(min, max);
            }
        }
    }

    fn recompute_bounds(&mut self) {
        let (low_coherence, high_coherence) =
            derived_bounds(self.state.medium_coherence, COHERENCE_RANGE);
        let (low_distance, high_distance) =
            derived_bounds(self.state.medium_distance, DISTANCE_RANGE);
        self.state.bounds = LevelBounds {
            low_coherence,
            high_coherence,
            low_distance,
            high_distance,
        };
    }
}
