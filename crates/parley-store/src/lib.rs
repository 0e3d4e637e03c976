pub mod json;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use anyhow::Result;
use parley_types::models::{ChatMessage, MessageKind};
use tracing::{info, warn};

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Durable side of the history. The in-memory sequence in [`HistoryStore`]
/// is authoritative; a backend only mirrors it.
pub trait HistoryBackend: Send {
    /// Read every persisted message in insertion order.
    fn load(&mut self) -> Result<Vec<ChatMessage>>;

    /// Persist `appended`, which is already the last element of `all`.
    fn append(&mut self, all: &[ChatMessage], appended: &ChatMessage) -> Result<()>;

    /// Persist an empty history.
    fn clear(&mut self) -> Result<()>;

    /// Make sure everything in `all` is on disk. Called at shutdown.
    fn flush(&mut self, all: &[ChatMessage]) -> Result<()>;

    fn describe(&self) -> String;
}

/// Append-only message history with per-viewer filtering.
pub struct HistoryStore {
    messages: Vec<ChatMessage>,
    backend: Box<dyn HistoryBackend>,
}

impl HistoryStore {
    /// Open a store and load whatever the backend already holds. Records that
    /// break the kind/target pairing are skipped.
    pub fn open(mut backend: Box<dyn HistoryBackend>) -> Result<Self> {
        let loaded = backend.load()?;
        let total = loaded.len();
        let messages: Vec<ChatMessage> = loaded
            .into_iter()
            .filter(|msg| {
                let ok = msg.is_well_formed();
                if !ok {
                    warn!("Skipping malformed history record {}", msg.id);
                }
                ok
            })
            .collect();

        info!(
            "History loaded from {}: {} messages ({} skipped)",
            backend.describe(),
            messages.len(),
            total - messages.len()
        );

        Ok(Self { messages, backend })
    }

    /// In-memory store with nothing persisted.
    pub fn in_memory() -> Self {
        Self {
            messages: Vec::new(),
            backend: Box::new(MemoryBackend),
        }
    }

    /// Append a message. The message is kept in memory even when the write
    /// fails; the error is returned so the caller can log it.
    pub fn append(&mut self, message: ChatMessage) -> Result<()> {
        self.messages.push(message);
        let appended = &self.messages[self.messages.len() - 1];
        self.backend.append(&self.messages, appended)
    }

    /// Drop every message, in memory and on disk.
    pub fn clear(&mut self) -> Result<()> {
        self.messages.clear();
        self.backend.clear()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.backend.flush(&self.messages)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages `viewer` may see, in insertion order. `is_member` answers
    /// whether `viewer` is currently in the named group, so group visibility
    /// follows membership at viewing time rather than at send time.
    pub fn visible_to<F>(&self, viewer: &str, is_member: F) -> Vec<ChatMessage>
    where
        F: Fn(&str) -> bool,
    {
        self.messages
            .iter()
            .filter(|msg| is_visible(msg, viewer, &is_member))
            .cloned()
            .collect()
    }
}

fn is_visible<F>(msg: &ChatMessage, viewer: &str, is_member: &F) -> bool
where
    F: Fn(&str) -> bool,
{
    match msg.kind {
        MessageKind::Public => true,
        MessageKind::Private => msg.sender == viewer || msg.target.as_deref() == Some(viewer),
        MessageKind::Group => msg.target.as_deref().is_some_and(|group| is_member(group)),
    }
}
