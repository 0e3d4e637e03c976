use thiserror::Error;

/// Why a single inbound event was refused. The `Display` text is what the
/// sender sees in its `system message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Group '{0}' already exists")]
    DuplicateGroup(String),

    #[error("Group '{0}' has no online members")]
    NoValidMembers(String),

    #[error("User '{0}' is not connected")]
    TargetNotConnected(String),

    #[error("You are not a member of group '{0}'")]
    NotAGroupMember(String),

    #[error("Group '{0}' does not exist")]
    GroupNotFound(String),

    #[error("Nickname '{0}' is already in use")]
    NicknameTaken(String),
}
