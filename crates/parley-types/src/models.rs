use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of one live transport connection. Distinct from the
/// nickname the connection asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who a stored message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Public,
    Private,
    Group,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "group" => Ok(Self::Group),
            other => Err(format!("unknown message kind '{}'", other)),
        }
    }
}

/// A chat message as stored in history and delivered to clients.
///
/// `target` is `None` for public messages, the recipient nickname for
/// private messages and the group name for group messages. Build messages
/// through [`ChatMessage::public`], [`ChatMessage::private`] and
/// [`ChatMessage::group`] so that pairing always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: ConnectionId,
    pub sender: String,
    pub text: String,
    pub image: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub target: Option<String>,
}

impl ChatMessage {
    fn build(
        sender_id: ConnectionId,
        sender: String,
        body: MessageBody,
        kind: MessageKind,
        target: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            sender,
            text: body.text,
            image: body.image,
            timestamp: Utc::now(),
            kind,
            target,
        }
    }

    pub fn public(sender_id: ConnectionId, sender: String, body: MessageBody) -> Self {
        Self::build(sender_id, sender, body, MessageKind::Public, None)
    }

    pub fn private(
        sender_id: ConnectionId,
        sender: String,
        target: String,
        body: MessageBody,
    ) -> Self {
        Self::build(sender_id, sender, body, MessageKind::Private, Some(target))
    }

    pub fn group(
        sender_id: ConnectionId,
        sender: String,
        group_name: String,
        body: MessageBody,
    ) -> Self {
        Self::build(sender_id, sender, body, MessageKind::Group, Some(group_name))
    }

    /// True when `target` is present exactly for private and group messages.
    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            MessageKind::Public => self.target.is_none(),
            MessageKind::Private | MessageKind::Group => self.target.is_some(),
        }
    }
}

/// Message content after the image/text rule has been applied: an image
/// message never carries text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    pub text: String,
    pub image: Option<String>,
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn image(data: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            image: Some(data.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_pair_kind_and_target() {
        let conn = ConnectionId::new();
        let public = ChatMessage::public(conn, "ann".into(), MessageBody::text("hi"));
        let private =
            ChatMessage::private(conn, "ann".into(), "bob".into(), MessageBody::text("psst"));
        let group = ChatMessage::group(conn, "ann".into(), "crew".into(), MessageBody::text("yo"));

        assert!(public.is_well_formed());
        assert!(private.is_well_formed());
        assert!(group.is_well_formed());
        assert_eq!(private.target.as_deref(), Some("bob"));
        assert_eq!(group.kind, MessageKind::Group);
    }

    #[test]
    fn wire_shape_is_camel_case_with_null_target() {
        let msg = ChatMessage::public(ConnectionId::new(), "ann".into(), MessageBody::text("hi"));
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["kind"], "public");
        assert_eq!(value["sender"], "ann");
        assert!(value["target"].is_null());
        assert!(value["image"].is_null());
        assert!(value.get("senderId").is_some());
    }

    #[test]
    fn detects_malformed_records() {
        let mut msg = ChatMessage::public(ConnectionId::new(), "ann".into(), MessageBody::text("hi"));
        msg.target = Some("bob".into());
        assert!(!msg.is_well_formed());

        msg.kind = MessageKind::Private;
        msg.target = None;
        assert!(!msg.is_well_formed());
    }

    #[test]
    fn image_body_drops_text() {
        let body = MessageBody::image("data:image/png;base64,AAAA");
        assert!(body.text.is_empty());
        assert!(body.image.is_some());
    }

    #[test]
    fn message_kind_parses_its_own_names() {
        for kind in [MessageKind::Public, MessageKind::Private, MessageKind::Group] {
            assert_eq!(kind.as_str().parse::<MessageKind>().unwrap(), kind);
        }
        assert!("broadcast".parse::<MessageKind>().is_err());
    }
}
