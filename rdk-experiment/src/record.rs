//! Per-trial records and the delimited trial log.

use crate::config::ParticipantInfo;
use crate::error::SessionError;
use chrono::{DateTime, Local};
use rdk_core::{Dimension, LevelBounds, Phase, SessionStage, TrialOutcome, TrialParams};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Placeholder for fields a trial has no value for.
pub const MISSING: &str = "None";

const SESSION_COLUMNS: &[&str] = &[
    "exp_name",
    "participant",
    "session_nr",
    "age",
    "gender",
    "date",
    "start_time",
    "end_time",
    "block_count",
    "trial_count",
];

const TRIAL_COLUMNS: &[&str] = &[
    "coherence",
    "distance",
    "direction",
    "reference_direction",
    "response",
    "response_time",
    "confidence_rating",
    "confidence_response_time",
];

const STAIRCASE_COLUMNS: &[&str] = &[
    "block_type",
    "low_coherence",
    "high_coherence",
    "low_distance",
    "high_distance",
];

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock(DateTime<Local>);

impl WallClock {
    pub fn now() -> Self {
        Self(Local::now())
    }

    pub fn at(time: DateTime<Local>) -> Self {
        Self(time)
    }

    /// `2024-03-07 09:05:00`
    pub fn datetime(&self) -> String {
        self.0.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// `2024-03-07_09h05`, safe for file names.
    pub fn date_stamp(&self) -> String {
        self.0.format("%Y-%m-%d_%Hh%M").to_string()
    }
}

/// One completed trial, built fresh and appended once.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub block_count: usize,
    pub trial_count: usize,
    pub end_time: String,
    pub params: TrialParams,
    pub outcome: TrialOutcome,
    /// Active dimension and bounds, for staircase trials.
    pub calibration: Option<(Dimension, LevelBounds)>,
}

fn text(value: &str) -> String {
    if value.is_empty() {
        MISSING.to_string()
    } else {
        value.replace([',', '\n', '\r'], ";")
    }
}

fn opt<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

/// Comma-delimited log with a header row, synced to disk after every row.
pub struct TrialLog {
    path: PathBuf,
    writer: BufWriter<File>,
    staircase_columns: bool,
    session_fields: Vec<String>,
    rows: usize,
}

impl TrialLog {
    /// Creates `<data_dir>/<stage>/<participant>_<session>_<date>.csv`.
    pub fn create(
        data_dir: &Path,
        stage: SessionStage,
        info: &ParticipantInfo,
        date: &str,
        start_time: &str,
    ) -> Result<Self, SessionError> {
        if !stage.records_trials() {
            return Err(SessionError::NoTrialLog(stage));
        }
        let dir = data_dir.join(stage.label());
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!(
            "{}_{}_{}.csv",
            info.participant, info.session_nr, date
        ));
        let file = File::create(&path)?;
        let staircase_columns = stage.adapts_levels();

        let mut log = Self {
            path,
            writer: BufWriter::new(file),
            staircase_columns,
            session_fields: vec![
                text(&info.exp_name),
                text(&info.participant),
                text(&info.session_nr),
                text(&info.age),
                text(&info.gender),
                text(date),
                text(start_time),
            ],
            rows: 0,
        };
        let header = log.columns().join(",");
        writeln!(log.writer, "{header}")?;
        log.commit()?;
        log::info!("logging {} trials to {}", stage.label(), log.path.display());
        Ok(log)
    }

    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = SESSION_COLUMNS.to_vec();
        columns.extend_from_slice(TRIAL_COLUMNS);
        if self.staircase_columns {
            columns.extend_from_slice(STAIRCASE_COLUMNS);
        }
        columns
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn append(&mut self, record: &TrialRecord) -> Result<(), SessionError> {
        let row = self.format_row(record);
        writeln!(self.writer, "{}", row.join(","))?;
        self.commit()?;
        self.rows += 1;
        Ok(())
    }

    fn format_row(&self, record: &TrialRecord) -> Vec<String> {
        let mut row = self.session_fields.clone();
        let confidence = record.outcome.confidence;
        row.extend([
            text(&record.end_time),
            record.block_count.to_string(),
            record.trial_count.to_string(),
            record.params.coherence.to_string(),
            record.params.distance.to_string(),
            format!("{:.2}", record.params.direction),
            record.params.reference_direction.to_string(),
            record.outcome.response.to_string(),
            format!("{:.4}", record.outcome.response_time),
            opt(confidence.map(|c| c.rating)),
            opt(confidence.map(|c| format!("{:.4}", c.response_time))),
        ]);
        if self.staircase_columns {
            match record.calibration {
                Some((dimension, bounds)) => row.extend([
                    dimension.to_string(),
                    bounds.low_coherence.to_string(),
                    bounds.high_coherence.to_string(),
                    bounds.low_distance.to_string(),
                    bounds.high_distance.to_string(),
                ]),
                None => row.extend(
                    std::iter::repeat(MISSING.to_string()).take(STAIRCASE_COLUMNS.len()),
                ),
            }
        }
        row
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}
