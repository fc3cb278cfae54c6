pub mod config;
pub mod confidence;
pub mod error;
pub mod input;
pub mod record;
pub mod state;
pub mod trial;
pub mod trigger;

pub use config::{KeyConfig, MonitorConfig, ParticipantInfo, SessionConfig};
pub use confidence::rate_confidence;
pub use error::SessionError;
pub use input::{InputSource, Key, KeyPress, Screen};
pub use record::{TrialLog, TrialRecord, WallClock};
pub use state::{session_seed, Session, SessionState};
pub use trial::{hold, show_instructions, TrialRunner};
pub use trigger::TriggerPort;
