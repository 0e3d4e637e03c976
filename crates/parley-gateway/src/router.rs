//! Turns one inbound event into a history change plus the exact set of
//! connections that must hear about it.

use parley_store::HistoryStore;
use parley_types::events::{
    ClientCommand, CreateGroupPayload, GroupPayload, PrivatePayload, PublicPayload, ServerEvent,
    TypingPayload, TypingScope,
};
use parley_types::models::{ChatMessage, ConnectionId};
use tracing::{debug, error, info, warn};

use crate::directory::SessionDirectory;
use crate::error::ChatError;
use crate::groups::GroupRegistry;

/// One outbound event and the connections it goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipients: Vec<ConnectionId>,
    pub event: ServerEvent,
}

impl Delivery {
    pub fn to(recipients: Vec<ConnectionId>, event: ServerEvent) -> Self {
        Self { recipients, event }
    }

    pub fn to_one(recipient: ConnectionId, event: ServerEvent) -> Self {
        Self {
            recipients: vec![recipient],
            event,
        }
    }
}

/// Everything the router reads and writes. Owned by a single handler at a
/// time; see `Hub`.
pub struct ChatState {
    pub directory: SessionDirectory,
    pub groups: GroupRegistry,
    pub history: HistoryStore,
}

impl ChatState {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            directory: SessionDirectory::new(),
            groups: GroupRegistry::new(),
            history,
        }
    }

    /// A transport connection opened. It sees who is online straight away.
    pub fn connect(&mut self, conn: ConnectionId) -> Vec<Delivery> {
        self.directory.connect(conn);
        vec![Delivery::to_one(conn, self.user_list())]
    }

    /// Route one client command. Refused commands produce a single
    /// `system message` back to the sender and change nothing.
    pub fn handle(&mut self, from: ConnectionId, cmd: ClientCommand) -> Vec<Delivery> {
        let result = match cmd {
            ClientCommand::SetNickname(nickname) => self.set_nickname(from, &nickname),
            ClientCommand::ChatPublic(payload) => Ok(self.chat_public(from, payload)),
            ClientCommand::ChatPrivate(payload) => self.chat_private(from, payload),
            ClientCommand::ChatGroup(payload) => self.chat_group(from, payload),
            ClientCommand::CreateGroup(payload) => self.create_group(from, payload),
            ClientCommand::Typing(payload) => Ok(self.typing(from, payload)),
        };

        result.unwrap_or_else(|err| {
            warn!("{} ({}) request refused: {}", self.directory.nickname_of(from), from, err);
            vec![Delivery::to_one(
                from,
                ServerEvent::SystemMessage {
                    text: err.to_string(),
                },
            )]
        })
    }

    /// A connection closed. Everyone left gets the new presence list and
    /// their own group list.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Vec<Delivery> {
        let nickname = self.directory.remove(conn);
        info!(
            "{} ({}) left, {} connections remain",
            nickname.as_deref().unwrap_or("unnamed connection"),
            conn,
            self.directory.len()
        );

        let mut deliveries = vec![Delivery::to(self.directory.connections(), self.user_list())];
        deliveries.extend(
            self.directory
                .connections()
                .into_iter()
                .map(|c| Delivery::to_one(c, ServerEvent::GroupList(self.group_list_for(c)))),
        );
        deliveries
    }

    /// Administrative reset: drop all history and groups, keep presence.
    pub fn reset(&mut self) -> Vec<Delivery> {
        if let Err(e) = self.history.clear() {
            error!("Failed to persist cleared history: {:#}", e);
        }
        self.groups.clear();
        info!("History and groups cleared by administrative reset");

        let everyone = self.directory.connections();
        let mut deliveries = vec![
            Delivery::to(everyone.clone(), self.user_list()),
            Delivery::to(everyone.clone(), ServerEvent::GroupList(Vec::new())),
        ];
        deliveries.extend(
            everyone
                .into_iter()
                .map(|c| Delivery::to_one(c, ServerEvent::ChatHistory(self.history_for_connection(c)))),
        );
        deliveries
    }

    /// History as `viewer` is allowed to see it right now.
    pub fn history_for(&self, viewer: &str) -> Vec<ChatMessage> {
        self.history
            .visible_to(viewer, |group| self.groups.is_member(group, viewer))
    }

    fn history_for_connection(&self, conn: ConnectionId) -> Vec<ChatMessage> {
        match self.directory.nickname(conn) {
            Some(nick) => self.history_for(nick),
            None => self.history.visible_to("", |_| false),
        }
    }

    fn group_list_for(&self, conn: ConnectionId) -> Vec<String> {
        self.directory
            .nickname(conn)
            .map(|nick| self.groups.groups_containing(nick))
            .unwrap_or_default()
    }

    fn user_list(&self) -> ServerEvent {
        ServerEvent::UserList(self.directory.all_nicknames().into_iter().collect())
    }

    fn store(&mut self, message: &ChatMessage) {
        if let Err(e) = self.history.append(message.clone()) {
            error!("Failed to persist message {}: {:#}", message.id, e);
        }
    }

    fn set_nickname(&mut self, from: ConnectionId, nickname: &str) -> Result<Vec<Delivery>, ChatError> {
        self.directory.set_nickname(from, nickname)?;
        let nickname = self.directory.nickname_of(from).to_string();
        info!("{} is now known as {}", from, nickname);

        Ok(vec![
            Delivery::to(self.directory.connections(), self.user_list()),
            Delivery::to_one(from, ServerEvent::ChatHistory(self.history_for(&nickname))),
            Delivery::to_one(
                from,
                ServerEvent::GroupList(self.groups.groups_containing(&nickname)),
            ),
        ])
    }

    fn chat_public(&mut self, from: ConnectionId, payload: PublicPayload) -> Vec<Delivery> {
        let sender = self.directory.nickname_of(from).to_string();
        let message = ChatMessage::public(from, sender, payload.into_body());
        self.store(&message);

        let recipients = self.directory.connections();
        debug!("public message {} to {} connections", message.id, recipients.len());
        vec![Delivery::to(recipients, ServerEvent::ChatMessage(message))]
    }

    fn chat_private(&mut self, from: ConnectionId, payload: PrivatePayload) -> Result<Vec<Delivery>, ChatError> {
        let target_conn = self
            .directory
            .connection_of(&payload.target)
            .ok_or_else(|| ChatError::TargetNotConnected(payload.target.clone()))?;

        let sender = self.directory.nickname_of(from).to_string();
        let message = ChatMessage::private(from, sender, payload.target, payload.content.into_body());
        self.store(&message);

        let mut recipients = vec![from];
        if target_conn != from {
            recipients.push(target_conn);
        }
        debug!("private message {} to {} connections", message.id, recipients.len());
        Ok(vec![Delivery::to(recipients, ServerEvent::ChatMessage(message))])
    }

    fn chat_group(&mut self, from: ConnectionId, payload: GroupPayload) -> Result<Vec<Delivery>, ChatError> {
        let group_name = payload.group_name.trim().to_string();
        let members = self
            .groups
            .members_of(&group_name)
            .ok_or_else(|| ChatError::GroupNotFound(group_name.clone()))?;

        let sender = self
            .directory
            .nickname(from)
            .filter(|nick| members.contains(*nick))
            .ok_or_else(|| ChatError::NotAGroupMember(group_name.clone()))?
            .to_string();

        let recipients: Vec<ConnectionId> = members
            .iter()
            .filter_map(|nick| self.directory.connection_of(nick))
            .collect();

        let message = ChatMessage::group(from, sender, group_name, payload.content.into_body());
        self.store(&message);

        debug!("group message {} to {} connections", message.id, recipients.len());
        Ok(vec![Delivery::to(recipients, ServerEvent::ChatMessage(message))])
    }

    fn create_group(&mut self, from: ConnectionId, payload: CreateGroupPayload) -> Result<Vec<Delivery>, ChatError> {
        let online = self.directory.all_nicknames();
        let creator = self.directory.nickname(from).map(str::to_string);
        let members = self.groups.create(
            &payload.group_name,
            &payload.members,
            creator.as_deref(),
            &online,
        )?;

        info!(
            "{} created group '{}' with {} members",
            self.directory.nickname_of(from),
            payload.group_name.trim(),
            members.len()
        );

        Ok(members
            .iter()
            .filter_map(|nick| {
                let conn = self.directory.connection_of(nick)?;
                Some(Delivery::to_one(
                    conn,
                    ServerEvent::GroupList(self.groups.groups_containing(nick)),
                ))
            })
            .collect())
    }

    /// Typing indicators are never stored and never answered with an error;
    /// anything that cannot be routed is dropped.
    fn typing(&self, from: ConnectionId, payload: TypingPayload) -> Vec<Delivery> {
        let recipients: Vec<ConnectionId> = match (payload.scope, payload.target.as_deref()) {
            (TypingScope::Public, _) => self
                .directory
                .connections()
                .into_iter()
                .filter(|c| *c != from)
                .collect(),
            (TypingScope::Private, Some(target)) => {
                self.directory.connection_of(target).into_iter().collect()
            }
            (TypingScope::Group, Some(group)) => self.group_peers(from, group.trim()),
            _ => Vec::new(),
        };

        if recipients.is_empty() {
            debug!("typing indicator from {} dropped", from);
            return Vec::new();
        }

        let target = match payload.scope {
            TypingScope::Public => None,
            TypingScope::Group => payload.target.map(|group| group.trim().to_string()),
            TypingScope::Private => payload.target,
        };
        vec![Delivery::to(
            recipients,
            ServerEvent::Typing {
                name: self.directory.nickname_of(from).to_string(),
                scope: payload.scope,
                target,
            },
        )]
    }

    /// Live connections of the other members of `group`, if `from` is one.
    fn group_peers(&self, from: ConnectionId, group: &str) -> Vec<ConnectionId> {
        let Some(nick) = self.directory.nickname(from) else {
            return Vec::new();
        };
        if !self.groups.is_member(group, nick) {
            return Vec::new();
        }
        self.groups
            .members_of(group)
            .into_iter()
            .flatten()
            .filter_map(|member| self.directory.connection_of(member))
            .filter(|c| *c != from)
            .collect()
    }
}
