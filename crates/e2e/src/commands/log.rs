//! Command invocation records

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One named interaction, recorded before it runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub name: String,
    pub display_name: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Records of the commands issued during one test
#[derive(Debug, Default)]
pub struct CommandLog {
    records: Mutex<Vec<CommandRecord>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, display_name: &str, message: &str) {
        info!(command = name, display = display_name, "{}", message);
        self.records.lock().push(CommandRecord {
            name: name.to_string(),
            display_name: display_name.to_string(),
            message: message.to_string(),
            at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> Vec<CommandRecord> {
        self.records.lock().clone()
    }

    /// Hand over the records collected so far and start a fresh list
    pub fn drain(&self) -> Vec<CommandRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
