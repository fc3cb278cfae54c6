use std::collections::BTreeMap;

pub const EXPERIMENT_START: &str = "experiment_start";
pub const EXPERIMENT_END: &str = "experiment_end";

/// EEG trigger port. No hardware is attached; codes are only logged.
#[derive(Debug, Clone)]
pub struct TriggerPort {
    codes: BTreeMap<&'static str, u8>,
    live: bool,
    sent: Vec<u8>,
}

impl TriggerPort {
    pub fn new(live: bool) -> Self {
        Self {
            codes: BTreeMap::from([(EXPERIMENT_START, 1), (EXPERIMENT_END, 20)]),
            live,
            sent: Vec::new(),
        }
    }

    pub fn code(&self, name: &str) -> Option<u8> {
        self.codes.get(name).copied()
    }

    /// Sends the named trigger; unknown names are logged and skipped.
    pub fn send(&mut self, name: &str) {
        let Some(code) = self.code(name) else {
            log::warn!("no trigger code named `{name}`");
            return;
        };
        if self.live {
            log::info!("trigger {name}: would write code {code}");
        } else {
            log::debug!("trigger {name} ({code}) suppressed, EEG disabled");
        }
        self.sent.push(code);
    }

    /// Codes sent so far, in order.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }
}
