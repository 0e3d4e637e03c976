use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, MessageBody};

/// Events sent FROM server TO client over the WebSocket.
///
/// Framed as `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Every nickname currently asserted by a live connection
    #[serde(rename = "user list")]
    UserList(Vec<String>),

    /// Groups the receiving nickname belongs to. Computed per recipient.
    #[serde(rename = "group list")]
    GroupList(Vec<String>),

    /// History replay, filtered for the receiving nickname
    #[serde(rename = "chat history")]
    ChatHistory(Vec<ChatMessage>),

    /// A single live message
    #[serde(rename = "chat message")]
    ChatMessage(ChatMessage),

    /// Notice addressed to one connection, usually a rejected request
    #[serde(rename = "system message")]
    SystemMessage { text: String },

    /// Someone is typing
    #[serde(rename = "typing")]
    Typing {
        name: String,
        #[serde(rename = "type")]
        scope: TypingScope,
        target: Option<String>,
    },
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    /// Assert (or change) the display name for this connection
    #[serde(rename = "set nickname")]
    SetNickname(String),

    #[serde(rename = "chat public")]
    ChatPublic(PublicPayload),

    #[serde(rename = "chat private")]
    ChatPrivate(PrivatePayload),

    #[serde(rename = "chat group")]
    ChatGroup(GroupPayload),

    #[serde(rename = "create group")]
    CreateGroup(CreateGroupPayload),

    /// Typing indicator. Routed, never stored.
    #[serde(rename = "typing")]
    Typing(TypingPayload),
}

/// Declared content type of an inbound chat payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    #[serde(other)]
    Other,
}

/// Body fields shared by every chat payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type", default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl Content {
    /// Image payloads carry `data` and no text; anything else, including an
    /// image with no `data`, keeps `text` verbatim.
    pub fn into_body(self) -> MessageBody {
        match (self.content_type, self.data) {
            (Some(ContentType::Image), Some(data)) if !data.is_empty() => MessageBody::image(data),
            _ => MessageBody::text(self.text.unwrap_or_default()),
        }
    }
}

/// `chat public` accepts either a bare string or a content object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublicPayload {
    Text(String),
    Content(Content),
}

impl PublicPayload {
    pub fn into_body(self) -> MessageBody {
        match self {
            Self::Text(text) => MessageBody::text(text),
            Self::Content(content) => content.into_body(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivatePayload {
    pub target: String,
    #[serde(flatten)]
    pub content: Content,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    pub group_name: String,
    #[serde(flatten)]
    pub content: Content,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupPayload {
    pub group_name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypingScope {
    Public,
    Private,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingPayload {
    #[serde(rename = "type")]
    pub scope: TypingScope,
    #[serde(default)]
    pub target: Option<String>,
}
