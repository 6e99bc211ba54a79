//! Networking primitives.
//!
//! Goals:
//! - Typed client/server events mirroring the game server's socket protocol.
//! - One persistent TCP stream carrying length-prefixed JSON frames.
//! - Keep serialization explicit: every frame is
//!   `{"event": <name>, "data": <payload>}`.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use crate::{
    history::ChatEntry,
    model::{BagItem, Direction, Entity, Item, Position, Stats},
};

/// Frames larger than this are treated as a broken stream.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Entity table keyed by user id or AI name, iterated in stable order.
pub type EntityMap = BTreeMap<String, Entity>;

/// Events the client sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinGame(JoinGame),
    PlayerMove {
        user_id: String,
        position: Position,
        direction: Direction,
        animation_frame: u32,
    },
    ChatMessage {
        user_id: String,
        message: String,
        target_id: Option<String>,
    },
    InteractItem {
        user_id: String,
        item: Item,
        scene: String,
    },
}

/// Profile announced when entering the game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinGame {
    pub token: String,
    pub nickname: String,
    pub sprite: String,
    #[serde(flatten)]
    pub stats: Stats,
    pub position: Position,
    #[serde(default)]
    pub bag: Vec<BagItem>,
}

/// Events the server pushes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full snapshot sent right after joining.
    GameState(GameStateSnapshot),
    PlayerJoined(Entity),
    PlayerDisconnected {
        user_id: String,
    },
    PlayerMoved(PlayerMoved),
    PlayerStatusUpdate(StatusUpdate),
    InteractionResult(InteractionResult),
    ChatMessage(ChatEntry),
    /// Periodic replacement of both AI tables.
    AiUpdate(AiUpdate),
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::GameState(_) => "game_state",
            ServerEvent::PlayerJoined(_) => "player_joined",
            ServerEvent::PlayerDisconnected { .. } => "player_disconnected",
            ServerEvent::PlayerMoved(_) => "player_moved",
            ServerEvent::PlayerStatusUpdate(_) => "player_status_update",
            ServerEvent::InteractionResult(_) => "interaction_result",
            ServerEvent::ChatMessage(_) => "chat_message",
            ServerEvent::AiUpdate(_) => "ai_update",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GameStateSnapshot {
    #[serde(default)]
    pub players: EntityMap,
    #[serde(default)]
    pub ai_characters: EntityMap,
    #[serde(default)]
    pub ai_players: EntityMap,
    pub your_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AiUpdate {
    #[serde(default)]
    pub ai_characters: EntityMap,
    #[serde(default)]
    pub ai_players: EntityMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerMoved {
    pub user_id: String,
    pub position: Position,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub animation_frame: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub user_id: String,
    #[serde(flatten)]
    pub stats: Stats,
}

/// Kind of an interaction outcome. Unknown kinds map to `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Chat,
    SceneChange,
    #[serde(other)]
    Other,
}

/// Payload of an interaction outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_y: Option<f32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionResult {
    #[serde(rename = "type", default)]
    pub kind: Option<InteractionKind>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub data: InteractionData,
}

/// Writes one length-prefixed JSON frame.
async fn write_frame<T: Serialize>(
    stream: &mut (impl AsyncWriteExt + Unpin),
    msg: &T,
) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg).context("serialize event")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    stream.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

/// Reads one length-prefixed JSON frame.
async fn read_frame<T: DeserializeOwned>(
    stream: &mut (impl AsyncReadExt + Unpin),
) -> anyhow::Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {len} bytes exceeds limit");
    }
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    serde_json::from_slice(&payload).context("deserialize event")
}

/// Persistent event connection over TCP.
#[derive(Debug)]
pub struct EventConn {
    stream: TcpStream,
}

impl EventConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        stream.set_nodelay(true).context("set nodelay")?;
        Ok(Self::new(stream))
    }

    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        read_frame(&mut self.stream).await
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into halves that can live on separate tasks.
    pub fn into_split(self) -> (EventReader, EventWriter) {
        let (read, write) = self.stream.into_split();
        (EventReader { read }, EventWriter { write })
    }
}

/// Receiving half of an [`EventConn`].
#[derive(Debug)]
pub struct EventReader {
    read: OwnedReadHalf,
}

impl EventReader {
    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        read_frame(&mut self.read).await
    }
}

/// Sending half of an [`EventConn`].
#[derive(Debug)]
pub struct EventWriter {
    write: OwnedWriteHalf,
}

impl EventWriter {
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        write_frame(&mut self.write, msg).await
    }
}

/// TCP listener producing event connections.
pub struct EventListener {
    listener: TcpListener,
}

impl EventListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(EventConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((EventConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes<T: Serialize>(msg: &T) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes<T: DeserializeOwned>(b: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    #[test]
    fn server_events_parse_from_server_json() {
        let raw = br#"{"event":"player_moved","data":{"user_id":"u1","position":{"x":1.5,"y":2,"scene":"campus"},"direction":"left","animation_frame":2}}"#;
        let ev: ServerEvent = decode_from_bytes(raw).unwrap();
        match ev {
            ServerEvent::PlayerMoved(m) => {
                assert_eq!(m.user_id, "u1");
                assert_eq!(m.direction, Direction::Left);
                assert_eq!(m.position.y, 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn interaction_result_tolerates_unknown_and_missing_kind() {
        let ev: ServerEvent = decode_from_bytes(
            br#"{"event":"interaction_result","data":{"type":"teleport","data":{"foo":1}}}"#,
        )
        .unwrap();
        let ServerEvent::InteractionResult(r) = ev else {
            panic!("expected interaction_result");
        };
        assert_eq!(r.kind, Some(InteractionKind::Other));
        assert_eq!(r.data.extra.get("foo"), Some(&serde_json::json!(1)));

        let ev: ServerEvent = decode_from_bytes(
            br#"{"event":"interaction_result","data":{"type":null,"data":{}}}"#,
        )
        .unwrap();
        let ServerEvent::InteractionResult(r) = ev else {
            panic!("expected interaction_result");
        };
        assert_eq!(r.kind, None);
    }

    #[test]
    fn snapshot_keeps_entities_of_unknown_type() {
        let raw = br#"{"event":"game_state","data":{
            "players":{"u1":{"user_id":"u1","nickname":"Kim","position":{"x":5,"y":5,"scene":"campus"},"type":"human_player"}},
            "ai_characters":{"Vendor":{"name":"Vendor","position":{"x":3,"y":4,"scene":"campus"},"type":"npc"}},
            "your_id":"u1"}}"#;
        let ev: ServerEvent = decode_from_bytes(raw).unwrap();
        let ServerEvent::GameState(state) = ev else {
            panic!("expected game_state");
        };
        assert_eq!(state.players["u1"].kind, Some(EntityKind::HumanPlayer));
        assert_eq!(state.ai_characters["Vendor"].kind, Some(EntityKind::Unknown));
        assert_eq!(state.ai_characters["Vendor"].display_name(), "Vendor");
    }

    #[test]
    fn join_game_flattens_stats() {
        let ev = ClientEvent::JoinGame(JoinGame {
            token: "t".into(),
            nickname: "n".into(),
            sprite: "character1.png".into(),
            stats: Stats::default(),
            position: Position::default(),
            bag: Vec::new(),
        });
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "join_game");
        assert_eq!(v["data"]["energy"], 100.0);
        assert_eq!(v["data"]["position"]["scene"], "campus");
    }

    #[test]
    fn chat_message_sends_null_target() {
        let ev = ClientEvent::ChatMessage {
            user_id: "u".into(),
            message: "hi".into(),
            target_id: None,
        };
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert!(v["data"]["target_id"].is_null());
    }

    #[tokio::test]
    async fn frames_cross_a_real_socket() -> anyhow::Result<()> {
        let listener = EventListener::bind("127.0.0.1:0".parse()?).await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await?;
            let ev: ClientEvent = conn.recv().await?;
            conn.send(&ServerEvent::Error {
                message: format!("got {}", matches!(ev, ClientEvent::ChatMessage { .. })),
            })
            .await?;
            Ok::<_, anyhow::Error>(())
        });

        let (mut reader, mut writer) = EventConn::connect(addr).await?.into_split();
        writer
            .send(&ClientEvent::ChatMessage {
                user_id: "u".into(),
                message: "hello".into(),
                target_id: None,
            })
            .await?;
        let reply: ServerEvent = reader.recv().await?;
        assert_eq!(
            reply,
            ServerEvent::Error {
                message: "got true".into()
            }
        );
        server.await??;
        Ok(())
    }
}
