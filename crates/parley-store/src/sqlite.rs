//! SQLite history: one row per message, inserted as it arrives. A flush
//! rewrites the table from memory.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parley_types::models::{ChatMessage, ConnectionId, MessageKind};
use rusqlite::{Connection, params};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{HistoryBackend, migrations};

/// Raw `messages` row, before any parsing.
struct MessageRow {
    id: String,
    sender_id: String,
    sender: String,
    body: String,
    image: Option<String>,
    kind: String,
    target: Option<String>,
    created_at: String,
}

pub struct SqliteBackend {
    conn: Connection,
    label: String,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrations::run(&conn)?;

        info!("History database opened at {}", path.display());
        Ok(Self {
            conn,
            label: format!("sqlite {}", path.display()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn,
            label: "sqlite :memory:".into(),
        })
    }
}

fn insert(conn: &Connection, msg: &ChatMessage) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, sender_id, sender, body, image, kind, target, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            msg.id.to_string(),
            msg.sender_id.to_string(),
            msg.sender,
            msg.text,
            msg.image,
            msg.kind.as_str(),
            msg.target,
            msg.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn parse_row(row: MessageRow) -> Option<ChatMessage> {
    let id = row
        .id
        .parse::<Uuid>()
        .map_err(|e| warn!("Corrupt message id '{}': {}", row.id, e))
        .ok()?;
    let sender_id = row
        .sender_id
        .parse::<Uuid>()
        .map_err(|e| warn!("Corrupt sender_id '{}' on message '{}': {}", row.sender_id, row.id, e))
        .ok()?;
    let kind = row
        .kind
        .parse::<MessageKind>()
        .map_err(|e| warn!("Corrupt kind on message '{}': {}", row.id, e))
        .ok()?;
    let timestamp = row
        .created_at
        .parse::<DateTime<Utc>>()
        .map_err(|e| warn!("Corrupt created_at '{}' on message '{}': {}", row.created_at, row.id, e))
        .ok()?;

    Some(ChatMessage {
        id,
        sender_id: ConnectionId::from_uuid(sender_id),
        sender: row.sender,
        text: row.body,
        image: row.image,
        timestamp,
        kind,
        target: row.target,
    })
}

impl HistoryBackend for SqliteBackend {
    fn load(&mut self) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sender_id, sender, body, image, kind, target, created_at
             FROM messages ORDER BY seq ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    sender_id: row.get(1)?,
                    sender: row.get(2)?,
                    body: row.get(3)?,
                    image: row.get(4)?,
                    kind: row.get(5)?,
                    target: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().filter_map(parse_row).collect())
    }

    fn append(&mut self, _all: &[ChatMessage], appended: &ChatMessage) -> Result<()> {
        insert(&self.conn, appended)
    }

    fn clear(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM messages", [])?;
        Ok(())
    }

    /// Rewrites the table to match `all`, repairing gaps and ordering left by
    /// a failed append and rows left behind by a failed clear.
    fn flush(&mut self, all: &[ChatMessage]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM messages", [])?;
        for msg in all {
            insert(&tx, msg)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
