use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            sender_id   TEXT NOT NULL,
            sender      TEXT NOT NULL,
            body        TEXT NOT NULL,
            image       TEXT,
            kind        TEXT NOT NULL CHECK (kind IN ('public', 'private', 'group')),
            target      TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_kind_target
            ON messages(kind, target);
        ",
    )?;

    info!("History migrations complete");
    Ok(())
}
