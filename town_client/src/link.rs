//! Socket link to the game server.
//!
//! The connection is split into a reader task and a writer task. The reader
//! pushes decoded events into the frame loop's inbox; the writer drains an
//! outbound queue. Neither task touches game state.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::sync::mpsc;
use town_shared::{
    error::NetworkError,
    model::Scene,
    net::{ClientEvent, EventConn, ServerEvent},
};
use tracing::{debug, info, warn};

/// Everything the frame loop drains, in arrival order.
#[derive(Debug)]
pub enum Incoming {
    Server(ServerEvent),
    /// Result of a background scene fetch.
    SceneFetched {
        name: String,
        result: Result<Scene, String>,
    },
    /// The socket closed or failed.
    Closed(String),
}

pub type Inbox = mpsc::UnboundedReceiver<Incoming>;
pub type InboxSender = mpsc::UnboundedSender<Incoming>;

/// Sending side of the server connection.
#[derive(Debug, Clone)]
pub struct ServerLink {
    outbound: mpsc::UnboundedSender<ClientEvent>,
}

impl ServerLink {
    /// Connects and starts the reader and writer tasks.
    pub async fn connect(addr: &str, inbox: InboxSender) -> anyhow::Result<Self> {
        let addr: SocketAddr = addr.parse().context("parse server_addr")?;
        info!(server = %addr, "Connecting to server");
        let conn = EventConn::connect(addr).await?;
        Ok(Self::spawn(conn, inbox))
    }

    /// Starts the reader and writer tasks on an open connection.
    pub fn spawn(conn: EventConn, inbox: InboxSender) -> Self {
        let (mut reader, mut writer) = conn.into_split();
        let (outbound, mut rx) = mpsc::unbounded_channel::<ClientEvent>();

        tokio::spawn(async move {
            loop {
                let frame: serde_json::Value = match reader.recv().await {
                    Ok(frame) => frame,
                    Err(e) => {
                        info!(reason = %e, "Server connection closed");
                        let _ = inbox.send(Incoming::Closed(e.to_string()));
                        break;
                    }
                };
                match serde_json::from_value::<ServerEvent>(frame) {
                    Ok(event) => {
                        debug!(event = event.name(), "Server event");
                        if inbox.send(Incoming::Server(event)).is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "Skipping unrecognized server frame"),
                }
            }
        });

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = writer.send(&event).await {
                    warn!(error = %e, "Send failed, stopping writer");
                    break;
                }
            }
        });

        Self { outbound }
    }

    /// A link with no socket behind it; sent events land on the returned receiver.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { outbound }, rx)
    }

    /// Queues an event for the writer task.
    pub fn send(&self, event: ClientEvent) -> Result<(), NetworkError> {
        self.outbound
            .send(event)
            .map_err(|_| NetworkError::Closed("writer stopped".into()))
    }
}
