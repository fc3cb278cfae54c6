use serde::{Deserialize, Serialize};

/// Defines session stages and how they chain
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn next(&self) -> Option<Self>;

    /// Whether trials in this stage are appended to a trial log.
    fn records_trials(&self) -> bool;

    fn gives_feedback(&self) -> bool {
        false
    }
    fn adapts_levels(&self) -> bool {
        false
    }
    fn asks_confidence(&self) -> bool {
        false
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    #[default]
    Welcome,
    Training,
    Staircase,
    Task,
    Debrief,
}

impl SessionStage {
    /// Directory name used for this stage's data files.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStage::Welcome => "welcome",
            SessionStage::Training => "training",
            SessionStage::Staircase => "staircase",
            SessionStage::Task => "task",
            SessionStage::Debrief => "debrief",
        }
    }
}

impl Phase for SessionStage {
    fn next(&self) -> Option<Self> {
        use SessionStage::*;
        Some(match self {
            Welcome => Training,
            Training => Staircase,
            Staircase => Task,
            Task => Debrief,
            Debrief => return None,
        })
    }

    fn records_trials(&self) -> bool {
        matches!(self, Self::Training | Self::Staircase | Self::Task)
    }

    fn gives_feedback(&self) -> bool {
        matches!(self, Self::Training)
    }

    fn adapts_levels(&self) -> bool {
        matches!(self, Self::Staircase)
    }

    fn asks_confidence(&self) -> bool {
        matches!(self, Self::Task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_run_in_order_and_end_at_debrief() {
        let mut stage = SessionStage::default();
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                SessionStage::Welcome,
                SessionStage::Training,
                SessionStage::Staircase,
                SessionStage::Task,
                SessionStage::Debrief,
            ]
        );
    }

    #[test]
    fn only_trial_stages_log() {
        assert!(!SessionStage::Welcome.records_trials());
        assert!(SessionStage::Staircase.records_trials());
        assert!(SessionStage::Training.gives_feedback());
        assert!(SessionStage::Task.asks_confidence());
        assert!(!SessionStage::Task.adapts_levels());
    }
}
