use anyhow::Result;
use parley_types::models::ChatMessage;

use crate::HistoryBackend;

/// Keeps nothing. History lives only as long as the process.
pub struct MemoryBackend;

impl HistoryBackend for MemoryBackend {
    fn load(&mut self) -> Result<Vec<ChatMessage>> {
        Ok(Vec::new())
    }

    fn append(&mut self, _all: &[ChatMessage], _appended: &ChatMessage) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self, _all: &[ChatMessage]) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
