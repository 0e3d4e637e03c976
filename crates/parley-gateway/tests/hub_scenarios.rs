//! End-to-end routing scenarios through the hub: commands go in, serialized
//! events come out of each connection's channel.

use parley_gateway::Hub;
use parley_gateway::hub::Outbound;
use parley_store::{HistoryStore, JsonFileBackend};
use parley_types::events::{
    ClientCommand, Content, CreateGroupPayload, GroupPayload, PrivatePayload, PublicPayload,
    ServerEvent, TypingPayload, TypingScope,
};
use parley_types::models::ConnectionId;
use tokio::sync::mpsc::UnboundedReceiver;

struct Client {
    id: ConnectionId,
    rx: UnboundedReceiver<Outbound>,
}

impl Client {
    /// Everything queued for this client so far.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(json) = self.rx.try_recv() {
            events.push(serde_json::from_str(&json).unwrap());
        }
        events
    }
}

async fn join(hub: &Hub, nick: &str) -> Client {
    let (id, rx) = hub.connect().await;
    hub.handle(id, ClientCommand::SetNickname(nick.into())).await;
    Client { id, rx }
}

fn text(body: &str) -> Content {
    Content {
        content_type: None,
        text: Some(body.into()),
        data: None,
    }
}

fn chat_texts(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::ChatMessage(msg) => Some(msg.text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn private_message_reaches_only_the_pair() {
    let hub = Hub::new(HistoryStore::in_memory());
    let mut ann = join(&hub, "ann").await;
    let mut bob = join(&hub, "bob").await;
    let mut cat = join(&hub, "cat").await;
    ann.drain();
    bob.drain();
    cat.drain();

    hub.handle(
        ann.id,
        ClientCommand::ChatPrivate(PrivatePayload {
            target: "bob".into(),
            content: text("just us"),
        }),
    )
    .await;

    assert_eq!(chat_texts(&ann.drain()), vec!["just us"]);
    assert_eq!(chat_texts(&bob.drain()), vec!["just us"]);
    assert!(cat.drain().is_empty());
}

#[tokio::test]
async fn new_identity_replays_only_visible_history() {
    let hub = Hub::new(HistoryStore::in_memory());
    let ann = join(&hub, "ann").await;
    let _bob = join(&hub, "bob").await;

    hub.handle(ann.id, ClientCommand::ChatPublic(PublicPayload::Text("everyone".into())))
        .await;
    hub.handle(
        ann.id,
        ClientCommand::ChatPrivate(PrivatePayload {
            target: "bob".into(),
            content: text("bob only"),
        }),
    )
    .await;

    let mut cat = join(&hub, "cat").await;
    let events = cat.drain();
    let history = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::ChatHistory(history) => Some(history.clone()),
            _ => None,
        })
        .expect("chat history sent on identity");

    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["everyone"]);
}

#[tokio::test]
async fn group_send_by_outsider_is_rejected_privately() {
    let hub = Hub::new(HistoryStore::in_memory());
    let mut ann = join(&hub, "ann").await;
    let mut bob = join(&hub, "bob").await;
    let mut dan = join(&hub, "dan").await;

    hub.handle(
        ann.id,
        ClientCommand::CreateGroup(CreateGroupPayload {
            group_name: "crew".into(),
            members: vec!["bob".into()],
        }),
    )
    .await;
    ann.drain();
    bob.drain();
    dan.drain();

    hub.handle(
        dan.id,
        ClientCommand::ChatGroup(GroupPayload {
            group_name: "crew".into(),
            content: text("hi crew"),
        }),
    )
    .await;

    assert!(ann.drain().is_empty());
    assert!(bob.drain().is_empty());
    assert_eq!(
        dan.drain(),
        vec![ServerEvent::SystemMessage {
            text: "You are not a member of group 'crew'".into()
        }]
    );
    assert_eq!(hub.stats().await.messages, 0);
}

#[tokio::test]
async fn typing_to_missing_target_sends_nothing() {
    let hub = Hub::new(HistoryStore::in_memory());
    let mut ann = join(&hub, "ann").await;
    let mut bob = join(&hub, "bob").await;
    ann.drain();
    bob.drain();

    hub.handle(
        ann.id,
        ClientCommand::Typing(TypingPayload {
            scope: TypingScope::Private,
            target: Some("ghost".into()),
        }),
    )
    .await;

    assert!(ann.drain().is_empty());
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn disconnect_rebroadcasts_presence_and_group_lists() {
    let hub = Hub::new(HistoryStore::in_memory());
    let mut ann = join(&hub, "ann").await;
    let mut bob = join(&hub, "bob").await;
    let cat = join(&hub, "cat").await;

    hub.handle(
        ann.id,
        ClientCommand::CreateGroup(CreateGroupPayload {
            group_name: "crew".into(),
            members: vec!["cat".into()],
        }),
    )
    .await;
    ann.drain();
    bob.drain();

    hub.disconnect(cat.id).await;

    assert_eq!(
        ann.drain(),
        vec![
            ServerEvent::UserList(vec!["ann".into(), "bob".into()]),
            ServerEvent::GroupList(vec!["crew".into()]),
        ]
    );
    assert_eq!(
        bob.drain(),
        vec![
            ServerEvent::UserList(vec!["ann".into(), "bob".into()]),
            ServerEvent::GroupList(Vec::new()),
        ]
    );
}

#[tokio::test]
async fn reset_clears_history_on_disk_and_keeps_presence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let store = HistoryStore::open(Box::new(JsonFileBackend::new(&path))).unwrap();
    let hub = Hub::new(store);

    let mut ann = join(&hub, "ann").await;
    let mut bob = join(&hub, "bob").await;
    hub.handle(ann.id, ClientCommand::ChatPublic(PublicPayload::Text("pub1".into())))
        .await;
    hub.handle(
        ann.id,
        ClientCommand::ChatPrivate(PrivatePayload {
            target: "bob".into(),
            content: text("priv1"),
        }),
    )
    .await;
    hub.handle(
        ann.id,
        ClientCommand::CreateGroup(CreateGroupPayload {
            group_name: "crew".into(),
            members: vec!["bob".into()],
        }),
    )
    .await;
    hub.handle(
        ann.id,
        ClientCommand::ChatGroup(GroupPayload {
            group_name: "crew".into(),
            content: text("grp1"),
        }),
    )
    .await;
    assert_eq!(hub.stats().await.messages, 3);
    ann.drain();
    bob.drain();

    hub.reset().await;

    for client in [&mut ann, &mut bob] {
        assert_eq!(
            client.drain(),
            vec![
                ServerEvent::UserList(vec!["ann".into(), "bob".into()]),
                ServerEvent::GroupList(Vec::new()),
                ServerEvent::ChatHistory(Vec::new()),
            ]
        );
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

    let stats = hub.stats().await;
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.groups, 0);
    assert_eq!(stats.messages, 0);
}

#[tokio::test]
async fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");

    {
        let hub = Hub::new(HistoryStore::open(Box::new(JsonFileBackend::new(&path))).unwrap());
        let ann = join(&hub, "ann").await;
        hub.handle(ann.id, ClientCommand::ChatPublic(PublicPayload::Text("remember me".into())))
            .await;
        hub.flush().await.unwrap();
    }

    let hub = Hub::new(HistoryStore::open(Box::new(JsonFileBackend::new(&path))).unwrap());
    let mut bob = join(&hub, "bob").await;
    let replay = bob
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ChatHistory(history) => Some(history),
            _ => None,
        })
        .unwrap();
    assert_eq!(replay.len(), 1);
    assert_eq!(replay[0].text, "remember me");
    assert_eq!(replay[0].sender, "ann");
}
