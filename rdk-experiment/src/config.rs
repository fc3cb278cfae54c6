use crate::error::SessionError;
use crate::input::Key;
use rdk_core::error::{non_negative, positive, within};
use rdk_core::{ConfigError, LevelBounds, MotionParams, StaircaseConfig, StimulusConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantInfo {
    pub exp_name: String,
    pub participant: String,
    pub session_nr: String,
    pub age: String,
    pub gender: String,
    /// Send EEG triggers for this session.
    pub eeg: bool,
}

impl Default for ParticipantInfo {
    fn default() -> Self {
        Self {
            exp_name: "rdk-confidence".into(),
            participant: "999".into(),
            session_nr: "1".into(),
            age: String::new(),
            gender: String::new(),
            eeg: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub width_cm: f64,
    pub distance_cm: f64,
    pub fullscreen: bool,
    /// Window size when not fullscreen.
    pub resolution: [u32; 2],
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            width_cm: 53.0,
            distance_cm: 60.0,
            fullscreen: true,
            resolution: [1512, 982],
        }
    }
}

impl MonitorConfig {
    /// Horizontal visual angle covered by the whole screen.
    pub fn width_degrees(&self) -> f64 {
        (2.0 * (self.width_cm / (2.0 * self.distance_cm)).atan()).to_degrees()
    }

    pub fn pixels_per_degree(&self, width_px: u32) -> f64 {
        width_px as f64 / self.width_degrees()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_trials: usize,
    pub coherence: f64,
    pub distance: f64,
    /// Bonus per correct training response.
    pub bonus_factor: f64,
    pub feedback: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_trials: 40,
            coherence: 0.5,
            distance: 30.0,
            bonus_factor: 0.1,
            feedback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaircaseStageConfig {
    pub n_blocks: usize,
    pub trials_per_block: usize,
    #[serde(flatten)]
    pub levels: StaircaseConfig,
}

impl Default for StaircaseStageConfig {
    fn default() -> Self {
        Self {
            n_blocks: 6,
            trials_per_block: 20,
            levels: StaircaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub n_trials: usize,
    pub low_coherence: f64,
    pub high_coherence: f64,
    pub low_distance: f64,
    pub high_distance: f64,
    pub confidence_probability: f64,
    /// Take the task levels from the staircase instead of the fixed ones above.
    pub use_calibrated_levels: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            n_trials: 50,
            low_coherence: 0.2,
            high_coherence: 0.4,
            low_distance: 10.0,
            high_distance: 30.0,
            confidence_probability: 1.0 / 3.0,
            use_calibrated_levels: false,
        }
    }
}

impl TaskConfig {
    pub fn bounds(&self) -> LevelBounds {
        LevelBounds {
            low_coherence: self.low_coherence,
            high_coherence: self.high_coherence,
            low_distance: self.low_distance,
            high_distance: self.high_distance,
        }
    }
}

/// Seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub dot_display_time: f64,
    pub inter_trial_interval: [f64; 2],
    pub choice_display: f64,
    pub feedback: f64,
    pub blank: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dot_display_time: 1.0,
            inter_trial_interval: [0.5, 1.0],
            choice_display: 0.5,
            feedback: 0.8,
            blank: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// `[clockwise, counter-clockwise]`; also move the confidence marker.
    pub response: [Key; 2],
    pub confirm: Key,
    pub quit: Vec<Key>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            response: [Key::Char('d'), Key::Char('e')],
            confirm: Key::Space,
            quit: vec![Key::Char('q'), Key::Escape],
        }
    }
}

/// Everything a session needs, loaded once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub participant: ParticipantInfo,
    pub stimulus: StimulusConfig,
    pub monitor: MonitorConfig,
    pub training: TrainingConfig,
    pub staircase: StaircaseStageConfig,
    pub task: TaskConfig,
    pub timing: TimingConfig,
    pub keys: KeyConfig,
    pub data_dir: PathBuf,
    /// Absent means a fresh seed from the OS.
    pub seed: Option<u64>,
    pub font_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            participant: ParticipantInfo::default(),
            stimulus: StimulusConfig::default(),
            monitor: MonitorConfig::default(),
            training: TrainingConfig::default(),
            staircase: StaircaseStageConfig::default(),
            task: TaskConfig::default(),
            timing: TimingConfig::default(),
            keys: KeyConfig::default(),
            data_dir: PathBuf::from("data"),
            seed: None,
            font_path: None,
        }
    }
}

impl SessionConfig {
    /// Reads and validates a JSON config, or returns validated defaults when
    /// no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str::<SessionConfig>(&text)?
            }
            None => SessionConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stimulus.validate()?;
        self.staircase.levels.validate()?;

        positive("monitor.width_cm", self.monitor.width_cm)?;
        positive("monitor.distance_cm", self.monitor.distance_cm)?;

        within("training.coherence", self.training.coherence, (0.0, 1.0))?;
        positive("training.distance", self.training.distance)?;
        non_negative("training.bonus_factor", self.training.bonus_factor)?;

        let task = &self.task;
        within("task.low_coherence", task.low_coherence, (0.0, 1.0))?;
        within("task.high_coherence", task.high_coherence, (0.0, 1.0))?;
        positive("task.low_distance", task.low_distance)?;
        positive("task.high_distance", task.high_distance)?;
        within("task.confidence_probability", task.confidence_probability, (0.0, 1.0))?;

        if self.staircase.n_blocks == 0 || self.staircase.trials_per_block == 0 {
            return Err(ConfigError::Invalid(
                "staircase needs at least one block of one trial".into(),
            ));
        }

        let t = &self.timing;
        positive("timing.dot_display_time", t.dot_display_time)?;
        let [iti_min, iti_max] = t.inter_trial_interval;
        non_negative("timing.inter_trial_interval", iti_min)?;
        non_negative("timing.inter_trial_interval", iti_max)?;
        if iti_min > iti_max {
            return Err(ConfigError::Invalid(format!(
                "inter-trial interval [{iti_min}, {iti_max}] is reversed"
            )));
        }
        non_negative("timing.choice_display", t.choice_display)?;
        non_negative("timing.feedback", t.feedback)?;
        non_negative("timing.blank", t.blank)?;

        let keys = &self.keys;
        if keys.response[0] == keys.response[1] {
            return Err(ConfigError::Invalid(
                "the two response keys must differ".into(),
            ));
        }
        let mut reserved = keys.response.iter().chain([&keys.confirm]);
        if let Some(clash) = reserved.find(|k| keys.quit.contains(k)) {
            return Err(ConfigError::Invalid(format!(
                "`{clash}` is both a response key and a quit key"
            )));
        }
        if keys.response.contains(&keys.confirm) {
            return Err(ConfigError::Invalid(format!(
                "`{}` cannot both confirm and respond",
                keys.confirm
            )));
        }
        Ok(())
    }

    /// Stimulus quantities for session trials, which last `dot_display_time`.
    pub fn motion_params(&self, measured_frame_rate: f64) -> Result<MotionParams, ConfigError> {
        let stimulus = StimulusConfig {
            duration: self.timing.dot_display_time,
            ..self.stimulus.clone()
        };
        stimulus.derive(measured_frame_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SessionConfig::load(None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.participant.participant, "999");
        assert_eq!(config.staircase.levels.initial_coherence, 0.3);
        assert_eq!(config.keys.response, [Key::Char('d'), Key::Char('e')]);
    }

    #[test]
    fn shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/session.json");
        let config = SessionConfig::load(Some(&path)).unwrap();
        assert_eq!(config, {
            let mut expected = SessionConfig::default();
            expected.font_path = config.font_path.clone();
            expected
        });
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{
            "participant": { "participant": "17", "eeg": true },
            "stimulus": { "n_dot_sets": 2, "random_dot_behaviour": "random_walk" },
            "staircase": { "n_blocks": 4, "coherence_step": 0.02 },
            "keys": { "response": ["o", "p"] },
            "seed": 9
        }"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.participant.participant, "17");
        assert_eq!(config.participant.session_nr, "1");
        assert_eq!(config.stimulus.n_dot_sets, 2);
        assert_eq!(config.stimulus.aperture_diameter, 8.0);
        assert_eq!(config.staircase.n_blocks, 4);
        assert_eq!(config.staircase.trials_per_block, 20);
        assert_eq!(config.staircase.levels.coherence_step, 0.02);
        assert_eq!(config.staircase.levels.distance_step, 1.0);
        assert_eq!(config.keys.response, [Key::Char('o'), Key::Char('p')]);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn invalid_values_fail_fast() {
        let mut config = SessionConfig::default();
        config.timing.inter_trial_interval = [1.0, 0.5];
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.keys.quit.push(Key::Char('d'));
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.stimulus.dot_density = 0.0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.task.confidence_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn session_trials_use_the_display_time() {
        let config = SessionConfig::default();
        let params = config.motion_params(60.0).unwrap();
        assert_eq!(params.duration, 1.0);
        assert_eq!(params.frames_for_duration(), 60);
    }

    #[test]
    fn pixels_per_degree_follows_viewing_geometry() {
        let monitor = MonitorConfig::default();
        let degrees = monitor.width_degrees();
        assert!((degrees - 47.65).abs() < 0.05);
        let ppd = monitor.pixels_per_degree(1920);
        assert!((ppd - 1920.0 / degrees).abs() < 1e-9);
    }
}
