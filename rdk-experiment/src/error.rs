use rdk_core::{ConfigError, FrameError, SessionStage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The participant pressed a quit key; the in-flight trial is dropped.
    #[error("session aborted by participant")]
    Aborted,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the {} stage records no trials", .0.label())]
    NoTrialLog(SessionStage),

    #[error("display failure: {0}")]
    Display(anyhow::Error),
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Aborted => SessionError::Aborted,
            FrameError::Backend(e) => SessionError::Display(e),
        }
    }
}

impl SessionError {
    pub fn is_abort(&self) -> bool {
        matches!(self, SessionError::Aborted)
    }
}
