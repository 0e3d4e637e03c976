use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Where message history is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackendKind {
    Json,
    Sqlite,
    Memory,
}

impl HistoryBackendKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("PARLEY_HISTORY_BACKEND must be json, sqlite or memory, got '{}'", other),
        }
    }

    fn default_path(&self) -> &'static str {
        match self {
            Self::Sqlite => "history.db",
            Self::Json | Self::Memory => "history.json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub history_backend: HistoryBackendKind,
    pub history_path: PathBuf,
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("PARLEY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        let history_backend = match lookup("PARLEY_HISTORY_BACKEND") {
            Some(value) => HistoryBackendKind::parse(&value)?,
            None => HistoryBackendKind::Json,
        };
        let history_path = lookup("PARLEY_HISTORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(history_backend.default_path()));

        let static_dir = lookup("PARLEY_STATIC_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            addr,
            history_backend,
            history_path,
            static_dir,
        })
    }
}
