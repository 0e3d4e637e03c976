use std::collections::BTreeSet;

use parley_types::models::ConnectionId;

use crate::error::ChatError;

/// Nickname reported for a connection that has not asserted one yet.
pub const UNKNOWN_NICKNAME: &str = "Unknown";

#[derive(Debug, Clone)]
struct Session {
    connection_id: ConnectionId,
    nickname: Option<String>,
}

/// Live connections and the nickname each one asserted, in connect order.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: Vec<Session>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection that has no nickname yet.
    pub fn connect(&mut self, connection_id: ConnectionId) {
        if self.position(connection_id).is_none() {
            self.sessions.push(Session {
                connection_id,
                nickname: None,
            });
        }
    }

    /// Assert a nickname for `connection_id`, replacing any previous one.
    ///
    /// A nickname held by another live connection is refused, so reverse
    /// lookup never has to pick between two holders. The placeholder
    /// [`UNKNOWN_NICKNAME`] cannot be claimed. Unregistered connections are
    /// registered on the way.
    pub fn set_nickname(&mut self, connection_id: ConnectionId, nickname: &str) -> Result<(), ChatError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(ChatError::InvalidRequest("nickname must not be empty".into()));
        }
        if nickname == UNKNOWN_NICKNAME {
            return Err(ChatError::InvalidRequest(format!("'{}' is reserved", UNKNOWN_NICKNAME)));
        }

        if let Some(holder) = self.connection_of(nickname) {
            if holder != connection_id {
                return Err(ChatError::NicknameTaken(nickname.to_string()));
            }
        }

        match self.position(connection_id) {
            Some(idx) => self.sessions[idx].nickname = Some(nickname.to_string()),
            None => self.sessions.push(Session {
                connection_id,
                nickname: Some(nickname.to_string()),
            }),
        }
        Ok(())
    }

    /// Forget a connection. Returns the nickname it held, if any.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<String> {
        let idx = self.position(connection_id)?;
        self.sessions.remove(idx).nickname
    }

    pub fn nickname(&self, connection_id: ConnectionId) -> Option<&str> {
        self.position(connection_id)
            .and_then(|idx| self.sessions[idx].nickname.as_deref())
    }

    /// Nickname for `connection_id`, or [`UNKNOWN_NICKNAME`].
    pub fn nickname_of(&self, connection_id: ConnectionId) -> &str {
        self.nickname(connection_id).unwrap_or(UNKNOWN_NICKNAME)
    }

    /// First live connection holding `nickname`.
    pub fn connection_of(&self, nickname: &str) -> Option<ConnectionId> {
        self.sessions
            .iter()
            .find(|s| s.nickname.as_deref() == Some(nickname))
            .map(|s| s.connection_id)
    }

    pub fn all_nicknames(&self) -> BTreeSet<String> {
        self.sessions
            .iter()
            .filter_map(|s| s.nickname.clone())
            .collect()
    }

    /// Every live connection, named or not, in connect order.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.sessions.iter().map(|s| s.connection_id).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn position(&self, connection_id: ConnectionId) -> Option<usize> {
        self.sessions
            .iter()
            .position(|s| s.connection_id == connection_id)
    }
}
