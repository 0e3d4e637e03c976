//! Whole-file JSON history: one array of messages, rewritten on every change.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parley_types::models::ChatMessage;
use tracing::{debug, warn};

use crate::HistoryBackend;

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write to a sibling temp file then rename over the target, so a crash
    /// mid-write leaves the previous file intact.
    fn write_all(&self, messages: &[ChatMessage]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_vec(messages).context("Failed to serialize history")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Wrote {} messages to {}", messages.len(), self.path.display());
        Ok(())
    }
}

impl HistoryBackend for JsonFileBackend {
    fn load(&mut self) -> Result<Vec<ChatMessage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history JSON in {}", self.path.display()))?;

        Ok(records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| {
                serde_json::from_value(record)
                    .map_err(|e| warn!("Corrupt history record #{} in {}: {}", index, self.path.display(), e))
                    .ok()
            })
            .collect())
    }

    fn append(&mut self, all: &[ChatMessage], _appended: &ChatMessage) -> Result<()> {
        self.write_all(all)
    }

    fn clear(&mut self) -> Result<()> {
        self.write_all(&[])
    }

    fn flush(&mut self, all: &[ChatMessage]) -> Result<()> {
        self.write_all(all)
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}
