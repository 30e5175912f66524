use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Who authored a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// One line of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sender: Sender,
    pub message: String,
}

/// Append-only, in-memory conversation log.
///
/// Lives for the process lifetime; nothing is persisted. Inbound messages
/// are appended by webhook processing, outbound ones by the dispatch
/// sequencer once delivery is acknowledged.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: RwLock<Vec<TranscriptEntry>>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, sender: Sender, message: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(TranscriptEntry {
            sender,
            message: message.into(),
        });
    }

    /// Snapshot of all entries in append order.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
