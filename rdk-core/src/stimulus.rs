use crate::error::{non_negative, positive, ConfigError};
use crate::geometry::BoundaryPolicy;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// How noise dots behave on the frames they are not carrying signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoiseMode {
    /// Noise dots jump to a fresh uniform position every update.
    #[default]
    #[serde(rename = "random_position", alias = "reposition")]
    RandomPosition,
    /// Noise dots step `move_distance` along a freshly drawn angle every update.
    #[serde(rename = "random_walk", alias = "random-walk")]
    RandomWalk,
}

/// Per-trial stimulus parameters, in visual degrees and seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub aperture_diameter: f64,
    pub dot_diameter: f64,
    /// Dots per square degree of aperture.
    pub dot_density: f64,
    /// Degrees per second before compensating for set interleaving.
    pub speed: f64,
    pub n_dot_sets: usize,
    pub random_dot_behaviour: NoiseMode,
    pub boundary_policy: BoundaryPolicy,
    pub fixation_diameter: f64,
    /// Defaults to `fixation_diameter + 0.02`.
    pub fixation_exclusion_radius: Option<f64>,
    /// Presentation time in seconds.
    pub duration: f64,
    /// Overrides the measured display rate when set.
    pub frame_rate: Option<f64>,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            aperture_diameter: 8.0,
            dot_diameter: 0.16,
            dot_density: 1.0,
            speed: 2.0,
            n_dot_sets: 3,
            random_dot_behaviour: NoiseMode::RandomPosition,
            boundary_policy: BoundaryPolicy::ReflectPreservingHeading,
            fixation_diameter: 0.3,
            fixation_exclusion_radius: None,
            duration: 5.0,
            frame_rate: None,
        }
    }
}

/// Quantities derived once from a validated [`StimulusConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionParams {
    pub n_dots: usize,
    pub n_sets: usize,
    pub aperture_radius: f64,
    pub dot_diameter: f64,
    pub fixation_diameter: f64,
    pub exclusion_radius: f64,
    /// Speed scaled by the set count, since each set only moves every Nth frame.
    pub adjusted_speed: f64,
    pub frame_rate: f64,
    /// Distance a dot travels on each update of its set.
    pub move_distance: f64,
    pub duration: f64,
    pub noise: NoiseMode,
    pub boundary: BoundaryPolicy,
}

impl MotionParams {
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.frame_rate
    }

    /// Frames shown for the presentation at this rate.
    pub fn frames_for_duration(&self) -> usize {
        (0usize..)
            .take_while(|&frame| (frame as f64) / self.frame_rate < self.duration)
            .count()
    }
}

impl StimulusConfig {
    pub fn aperture_radius(&self) -> f64 {
        self.aperture_diameter / 2.0
    }

    pub fn aperture_area(&self) -> f64 {
        PI * self.aperture_radius().powi(2)
    }

    pub fn exclusion_radius(&self) -> f64 {
        self.fixation_exclusion_radius
            .unwrap_or(self.fixation_diameter + 0.02)
    }

    /// Number of dots in each set for this density and aperture.
    pub fn n_dots(&self) -> usize {
        (self.dot_density * self.aperture_area()).floor() as usize
    }

    /// Checks everything that does not depend on the display.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("aperture_diameter", self.aperture_diameter)?;
        positive("dot_diameter", self.dot_diameter)?;
        positive("dot_density", self.dot_density)?;
        non_negative("speed", self.speed)?;
        non_negative("fixation_diameter", self.fixation_diameter)?;
        positive("duration", self.duration)?;
        if self.n_dot_sets == 0 {
            return Err(ConfigError::NoDotSets);
        }
        let exclusion = non_negative("fixation_exclusion_radius", self.exclusion_radius())?;
        if exclusion >= self.aperture_radius() {
            return Err(ConfigError::ExclusionTooLarge {
                exclusion,
                aperture: self.aperture_radius(),
            });
        }
        if self.n_dots() == 0 {
            return Err(ConfigError::NoDots {
                density: self.dot_density,
                area: self.aperture_area(),
            });
        }
        if let Some(rate) = self.frame_rate {
            positive("frame_rate", rate)?;
        }
        Ok(())
    }

    /// Validates and derives the per-frame quantities.
    ///
    /// `measured_frame_rate` is used unless the config pins `frame_rate`.
    pub fn derive(&self, measured_frame_rate: f64) -> Result<MotionParams, ConfigError> {
        self.validate()?;
        let frame_rate = positive("frame_rate", self.frame_rate.unwrap_or(measured_frame_rate))?;
        let adjusted_speed = self.speed * self.n_dot_sets as f64;
        Ok(MotionParams {
            n_dots: self.n_dots(),
            n_sets: self.n_dot_sets,
            aperture_radius: self.aperture_radius(),
            dot_diameter: self.dot_diameter,
            fixation_diameter: self.fixation_diameter,
            exclusion_radius: self.exclusion_radius(),
            adjusted_speed,
            frame_rate,
            move_distance: adjusted_speed / frame_rate,
            duration: self.duration,
            noise: self.random_dot_behaviour,
            boundary: self.boundary_policy,
        })
    }
}
