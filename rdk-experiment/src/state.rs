use crate::config::{ParticipantInfo, SessionConfig};
use crate::error::SessionError;
use crate::input::Screen;
use crate::record::{TrialLog, TrialRecord, WallClock};
use crate::trial::{show_instructions, TrialRunner};
use crate::trigger::{TriggerPort, EXPERIMENT_END, EXPERIMENT_START};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdk_core::{
    generate_trial_params, LevelBounds, Phase, SessionStage, StaircaseController, StaircaseState,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// What one stage hands to the next, and what the session summary records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub participant: ParticipantInfo,
    pub seed: u64,
    pub frame_rate: f64,
    pub date: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub stage: SessionStage,
    pub completed_stages: Vec<SessionStage>,
    pub block_count: usize,
    pub trials_completed: usize,
    pub training_correct: usize,
    pub bonus: f64,
    pub staircase: Option<StaircaseState>,
    /// Levels the task stage ran with.
    pub task_bounds: Option<LevelBounds>,
    pub task_correct: usize,
}

/// A fresh seed when the config does not pin one.
pub fn session_seed(config: &SessionConfig) -> u64 {
    config.seed.unwrap_or_else(|| rand::rng().random())
}

/// Drives Welcome → Training → Staircase → Task → Debrief on one screen.
pub struct Session<'c, D: Screen> {
    pub phase: SessionStage,
    config: &'c SessionConfig,
    screen: D,
    rng: StdRng,
    runner: TrialRunner<'c>,
    trigger: TriggerPort,
    state: SessionState,
}

impl<'c, D: Screen> Session<'c, D> {
    /// Derives the stimulus for the screen's measured frame rate, unless the
    /// config pins one.
    pub fn new(config: &'c SessionConfig, screen: D, seed: u64) -> Result<Self, SessionError> {
        let motion = config.motion_params(screen.actual_frame_rate())?;
        let started = WallClock::now();
        log::info!(
            "session for participant {} (session {}): {} dots x {} sets at {:.2} Hz, seed {seed}",
            config.participant.participant,
            config.participant.session_nr,
            motion.n_dots,
            motion.n_sets,
            motion.frame_rate
        );
        Ok(Self {
            phase: SessionStage::default(),
            config,
            screen,
            rng: StdRng::seed_from_u64(seed),
            runner: TrialRunner::new(config, motion),
            trigger: TriggerPort::new(config.participant.eeg),
            state: SessionState {
                participant: config.participant.clone(),
                seed,
                frame_rate: motion.frame_rate,
                date: started.date_stamp(),
                start_time: started.datetime(),
                end_time: None,
                stage: SessionStage::default(),
                completed_stages: Vec::new(),
                block_count: 0,
                trials_completed: 0,
                training_correct: 0,
                bonus: 0.0,
                staircase: None,
                task_bounds: None,
                task_correct: 0,
            },
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn trigger(&self) -> &TriggerPort {
        &self.trigger
    }

    pub fn advance_phase(&mut self) -> bool {
        match self.phase.next() {
            Some(next) => {
                self.state.completed_stages.push(self.phase);
                self.phase = next;
                self.state.stage = next;
                log::info!("entering {} stage", next.label());
                true
            }
            None => false,
        }
    }

    /// Runs every stage in order and returns the final state.
    ///
    /// An abort at any point ends the session with `Err(Aborted)`; trials
    /// finished before it are already on disk.
    pub fn run(mut self) -> Result<SessionState, SessionError> {
        self.trigger.send(EXPERIMENT_START);
        loop {
            self.run_stage()?;
            if !self.advance_phase() {
                break;
            }
        }
        self.state.completed_stages.push(self.phase);
        Ok(self.state)
    }

    fn run_stage(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionStage::Welcome => self.instructions("Welcome!\n\nPress SPACE to start."),
            SessionStage::Training => self.run_training(),
            SessionStage::Staircase => self.run_staircase(),
            SessionStage::Task => self.run_task(),
            SessionStage::Debrief => self.run_debrief(),
        }
    }

    fn instructions(&mut self, text: &str) -> Result<(), SessionError> {
        show_instructions(&mut self.screen, self.config, text)
    }

    fn open_log(&self) -> Result<TrialLog, SessionError> {
        TrialLog::create(
            &self.config.data_dir,
            self.phase,
            &self.state.participant,
            &self.state.date,
            &self.state.start_time,
        )
    }

    /// Runs and logs one trial drawn from `bounds`; returns whether it was correct.
    fn run_logged_trial(
        &mut self,
        log: &mut TrialLog,
        bounds: &LevelBounds,
        trial_count: usize,
        staircase: Option<&mut StaircaseController>,
    ) -> Result<bool, SessionError> {
        let params = generate_trial_params(&mut self.rng, bounds);
        let outcome = self
            .runner
            .run(&mut self.screen, &mut self.rng, self.phase, &params)?;

        let calibration = staircase.map(|controller| {
            controller.record(outcome.correct);
            (controller.active_dimension(), controller.bounds())
        });
        let record = TrialRecord {
            block_count: self.state.block_count,
            trial_count,
            end_time: WallClock::now().datetime(),
            params,
            outcome,
            calibration,
        };
        log.append(&record)?;
        self.state.trials_completed += 1;
        Ok(outcome.correct)
    }

    fn run_training(&mut self) -> Result<(), SessionError> {
        let config = self.config;
        let training = &config.training;
        self.instructions(
            "In this task, you will see a cloud of dots moving in a certain direction. \
             Afterward, a reference direction will be shown. Decide whether the overall \
             direction of the dots was towards the BLUE or the ORANGE side of the reference.\n\n\
             Press SPACE to continue.",
        )?;
        let feedback = if training.feedback {
            "If your choice is correct, the fixation will turn green; \
             if it is incorrect, it will turn red.\n\n"
        } else {
            ""
        };
        self.instructions(&format!(
            "{feedback}There will be {} practice trials.\n\nPress SPACE to begin.",
            training.n_trials
        ))?;

        let bounds = LevelBounds::fixed(training.coherence, training.distance);
        let mut log = self.open_log()?;
        for trial in 1..=training.n_trials {
            if self.run_logged_trial(&mut log, &bounds, trial, None)? {
                self.state.training_correct += 1;
            }
        }
        self.state.bonus = self.state.training_correct as f64 * training.bonus_factor;
        log::info!(
            "training done: {}/{} correct, bonus {:.2}",
            self.state.training_correct,
            training.n_trials,
            self.state.bonus
        );
        self.instructions("Well done! You have completed the training.\n\nPress SPACE to continue.")
    }

    fn run_staircase(&mut self) -> Result<(), SessionError> {
        let config = self.config;
        let stage = &config.staircase;
        let mut controller = StaircaseController::new(stage.levels.clone())?;
        self.instructions(
            "The next part adapts to your performance and will get harder as you improve.\n\n\
             Press SPACE to begin.",
        )?;

        let mut log = self.open_log()?;
        for block in 1..=stage.n_blocks {
            controller.begin_block();
            self.state.block_count = block;
            for trial in 1..=stage.trials_per_block {
                let bounds = controller.bounds();
                self.run_logged_trial(&mut log, &bounds, trial, Some(&mut controller))?;
            }
            self.state.staircase = Some(controller.state().clone());
            if block < stage.n_blocks {
                self.instructions(&format!(
                    "Block {block} of {} complete. Take a short break.\n\nPress SPACE to continue.",
                    stage.n_blocks
                ))?;
            }
        }
        let s = controller.state();
        log::info!(
            "calibrated medium coherence {:.3}, medium distance {:.1}",
            s.medium_coherence,
            s.medium_distance
        );
        Ok(())
    }

    fn task_bounds(&self) -> LevelBounds {
        match (&self.state.staircase, self.config.task.use_calibrated_levels) {
            (Some(staircase), true) => staircase.bounds,
            (None, true) => {
                log::warn!("no calibrated levels available, using the configured task levels");
                self.config.task.bounds()
            }
            (_, false) => self.config.task.bounds(),
        }
    }

    fn run_task(&mut self) -> Result<(), SessionError> {
        let bounds = self.task_bounds();
        self.state.task_bounds = Some(bounds);
        self.state.block_count = 0;
        self.instructions(
            "Now the main task begins. After some trials you will be asked how confident \
             you are in your choice.\n\nPress SPACE to begin.",
        )?;

        let mut log = self.open_log()?;
        for trial in 1..=self.config.task.n_trials {
            if self.run_logged_trial(&mut log, &bounds, trial, None)? {
                self.state.task_correct += 1;
            }
        }
        Ok(())
    }

    fn run_debrief(&mut self) -> Result<(), SessionError> {
        self.state.end_time = Some(WallClock::now().datetime());
        self.trigger.send(EXPERIMENT_END);
        let path = self.write_summary()?;
        log::info!("session summary written to {}", path.display());
        self.instructions(&format!(
            "Thank you for taking part!\n\nTraining bonus: {:.2}\n\nPress SPACE to finish.",
            self.state.bonus
        ))
    }

    /// Writes the session state as JSON next to the stage folders.
    pub fn write_summary(&self) -> Result<PathBuf, SessionError> {
        fs::create_dir_all(&self.config.data_dir)?;
        let info = &self.state.participant;
        let path = self.config.data_dir.join(format!(
            "{}_{}_{}_summary.json",
            info.participant, info.session_nr, self.state.date
        ));
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &self.state)?;
        writer.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_seed_wins() {
        let config = SessionConfig {
            seed: Some(77),
            ..Default::default()
        };
        assert_eq!(session_seed(&config), 77);
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = SessionState {
            participant: ParticipantInfo::default(),
            seed: 3,
            frame_rate: 60.0,
            date: "2024-03-07_09h05".into(),
            start_time: "2024-03-07 09:05:00".into(),
            end_time: None,
            stage: SessionStage::Staircase,
            completed_stages: vec![SessionStage::Welcome, SessionStage::Training],
            block_count: 2,
            trials_completed: 60,
            training_correct: 30,
            bonus: 3.0,
            staircase: None,
            task_bounds: Some(LevelBounds::fixed(0.3, 20.0)),
            task_correct: 0,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"stage\":\"staircase\""));
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
