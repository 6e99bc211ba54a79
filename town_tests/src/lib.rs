//! In-process stand-ins for the game server, its HTTP API and its asset
//! directory, used by the integration tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use town_client::{
    api::{GameApi, LoginError, Session},
    assets::{AssetCache, AssetSource},
    storage::Storage,
    ClientDeps,
};
use town_shared::{
    config::{ClientConfig, GameConfig},
    error::{AssetLoadError, AuthError, NetworkError},
    model::{Direction, Entity, EntityKind, Item, Position, Scene, Stats},
    net::{ClientEvent, EventConn, EventListener, JoinGame},
};
use tracing::info;

pub const TOKEN: &str = "demo-token-123";
pub const USER_ID: &str = "user_001";

/// Installs a test log writer once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Socket side of the game server, bound to an ephemeral local port.
pub struct StubServer {
    listener: EventListener,
    addr: SocketAddr,
}

pub async fn bind_ephemeral() -> anyhow::Result<StubServer> {
    let listener = EventListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
    let addr = listener.local_addr()?;
    Ok(StubServer { listener, addr })
}

impl StubServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts one client and waits for its `join_game`.
    pub async fn accept_join(&self) -> anyhow::Result<(EventConn, JoinGame)> {
        let (mut conn, peer) = self.listener.accept().await?;
        match conn.recv::<ClientEvent>().await? {
            ClientEvent::JoinGame(join) => {
                info!(%peer, nickname = %join.nickname, "Stub server: client joined");
                Ok((conn, join))
            }
            other => anyhow::bail!("expected join_game, got {other:?}"),
        }
    }
}

/// Reads client events until one matches `pred`.
pub async fn recv_until(
    conn: &mut EventConn,
    pred: impl Fn(&ClientEvent) -> bool,
) -> anyhow::Result<ClientEvent> {
    loop {
        let ev: ClientEvent = conn.recv().await?;
        if pred(&ev) {
            return Ok(ev);
        }
    }
}

/// HTTP API answering from fixed data.
pub struct StubApi {
    pub valid_token: String,
    pub user_id: String,
    pub game_config: GameConfig,
    pub characters: Vec<String>,
    pub scenes: HashMap<String, Scene>,
}

impl Default for StubApi {
    fn default() -> Self {
        Self {
            valid_token: TOKEN.to_string(),
            user_id: USER_ID.to_string(),
            game_config: GameConfig::default(),
            characters: vec!["character1.png".to_string(), "char2.png".to_string()],
            scenes: [("campus".to_string(), campus())].into(),
        }
    }
}

#[async_trait]
impl GameApi for StubApi {
    async fn login(&self, token: &str) -> Result<Session, LoginError> {
        if token != self.valid_token {
            return Err(AuthError::Rejected("Invalid token".into()).into());
        }
        Ok(Session {
            token: token.to_string(),
            user_id: self.user_id.clone(),
            game_config: self.game_config.clone(),
        })
    }

    async fn list_characters(&self) -> Result<Vec<String>, NetworkError> {
        Ok(self.characters.clone())
    }

    async fn fetch_scene(&self, name: &str) -> Result<Scene, NetworkError> {
        self.scenes
            .get(name)
            .cloned()
            .ok_or_else(|| NetworkError::Request {
                url: format!("/api/scenes/{name}"),
                source: "404 Not Found".into(),
            })
    }
}

/// Serves a PNG for every path except the ones listed as missing, counting
/// fetches per path.
#[derive(Default)]
pub struct MemoryAssets {
    missing: Vec<String>,
    fetches: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl MemoryAssets {
    pub fn with_missing(paths: &[&str]) -> Self {
        Self {
            missing: paths.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn fetches(&self, path: &str) -> usize {
        self.fetches
            .lock()
            .map(|m| m.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetSource for MemoryAssets {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, AssetLoadError> {
        if let Ok(mut m) = self.fetches.lock() {
            *m.entry(path.to_string()).or_default() += 1;
        }
        self.total.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if self.missing.iter().any(|m| m == path) {
            return Err(AssetLoadError::Fetch {
                path: path.to_string(),
                reason: "404 Not Found".into(),
            });
        }
        Ok(png(96, 128))
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::RgbaImage::new(width, height)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode png");
    buf
}

/// Client dependencies wired to the stubs. Returns the asset source so
/// tests can count fetches.
pub fn stub_deps(api: StubApi, assets: MemoryAssets) -> (ClientDeps, Arc<MemoryAssets>) {
    let assets = Arc::new(assets);
    let deps = ClientDeps {
        api: Arc::new(api),
        assets: Arc::new(AssetCache::new(assets.clone())),
        storage: Storage::in_memory(),
    };
    (deps, assets)
}

pub fn client_config(server: SocketAddr) -> ClientConfig {
    ClientConfig {
        server_addr: server.to_string(),
        token: Some(TOKEN.to_string()),
        nickname: Some("Kim".to_string()),
        ..Default::default()
    }
}

pub fn campus() -> Scene {
    Scene {
        name: "campus".into(),
        width: 20.0,
        height: 15.0,
        floor_texture: Some("grass.png".into()),
        items: vec![Item {
            x: 8.0,
            y: 8.0,
            image: Some("tree.png".into()),
            size: 1.0,
            obstacle: true,
            name: "Oak".into(),
            interaction: None,
        }],
        spawn_points: Vec::new(),
    }
}

pub fn human(user_id: &str, nickname: &str, sprite: &str, at: (f32, f32)) -> Entity {
    Entity {
        user_id: Some(user_id.to_string()),
        nickname: Some(nickname.to_string()),
        name: None,
        sprite: Some(sprite.to_string()),
        position: Position::new(at.0, at.1, "campus"),
        direction: Direction::Down,
        animation_frame: 0,
        stats: Stats::default(),
        kind: Some(EntityKind::HumanPlayer),
    }
}

pub fn ai_character(name: &str, sprite: &str, at: (f32, f32)) -> Entity {
    Entity {
        user_id: None,
        nickname: None,
        name: Some(name.to_string()),
        sprite: Some(sprite.to_string()),
        position: Position::new(at.0, at.1, "campus"),
        direction: Direction::Down,
        animation_frame: 0,
        stats: Stats::default(),
        kind: Some(EntityKind::AiCharacter),
    }
}
