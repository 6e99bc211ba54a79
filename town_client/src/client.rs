//! Client implementation.
//!
//! `GameClient` owns all client state and runs one frame at a time:
//! 1. drain the inbox (server events, finished scene fetches) in order
//! 2. apply queued input
//! 3. expire speech bubbles
//! 4. run a due scene travel
//! 5. predict the local player's movement
//! 6. flush the profile if it changed
//!
//! Drawing is a separate read-only step. Network IO and asset decoding run
//! on background tasks and only report back through the inbox or the asset
//! cache, so nothing here blocks.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use tokio::sync::mpsc;
use town_shared::{
    config::{ClientConfig, GameConfig},
    error::{Alert, AuthError, ProtocolError},
    history::{BoundedHistory, ChatEntry, InteractionEntry, CHAT_HISTORY_CAP},
    model::{BagItem, Position, Scene},
    net::{ClientEvent, InteractionKind, InteractionResult, ServerEvent},
    render::RenderBackend,
};
use tracing::{debug, info, warn};

use crate::{
    api::{GameApi, HttpApi},
    assets::{
        character_asset, floor_asset, item_asset, AssetCache, AssetSource, DirAssetSource,
        HttpAssetSource,
    },
    audio::MusicToggle,
    input::{InputEvent, Key, KeyState},
    interaction::interaction_request,
    link::{Inbox, InboxSender, Incoming, ServerLink},
    overlay::MessageOverlay,
    player::LocalPlayer,
    prediction::{predict_tick, AnimationClock},
    renderer::{draw_frame, FrameView},
    storage::{FileStore, Profile, SavedState, Storage},
    sync::{apply_event, EntityTables},
};

/// Delay between a scene-change result and the actual move.
pub const TRAVEL_DELAY: Duration = Duration::from_millis(1000);
/// Arrival coordinate when a scene change names none.
pub const DEFAULT_ARRIVAL: f32 = 5.0;
/// Bubble text for chat interactions without a message.
pub const DEFAULT_GREETING: &str = "Hello!";

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Joined and running frames.
    Playing,
    /// The server connection closed. There is no reconnect.
    Disconnected,
    /// The user asked to quit.
    Quit,
}

/// Collaborators the client talks to.
pub struct ClientDeps {
    pub api: Arc<dyn GameApi>,
    pub assets: Arc<AssetCache>,
    pub storage: Storage,
}

impl ClientDeps {
    /// HTTP API and assets from `api_base` (or `asset_dir`), file storage in
    /// `storage_dir`.
    pub fn from_config(cfg: &ClientConfig) -> Self {
        let http = reqwest::Client::new();
        let source: Arc<dyn AssetSource> = match &cfg.asset_dir {
            Some(dir) => Arc::new(DirAssetSource::new(dir)),
            None => Arc::new(HttpAssetSource::new(http.clone(), &cfg.api_base)),
        };
        Self {
            api: Arc::new(HttpApi::new(http, &cfg.api_base)),
            assets: Arc::new(AssetCache::new(source)),
            storage: Storage::new(FileStore::new(&cfg.storage_dir)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingTravel {
    due: Instant,
    scene: String,
    x: f32,
    y: f32,
}

/// High-level game client.
pub struct GameClient {
    pub state: ClientState,
    pub config: GameConfig,
    pub local: LocalPlayer,
    pub entities: EntityTables,
    pub overlay: MessageOverlay,
    pub scene: Option<Scene>,
    pub chat_history: BoundedHistory<ChatEntry>,
    pub interaction_history: BoundedHistory<InteractionEntry>,
    /// System lines such as join and leave notices.
    pub notices: BoundedHistory<String>,
    /// Server errors waiting to be shown to the user.
    pub alerts: Vec<Alert>,
    pub music: MusicToggle,
    pub bag_open: bool,
    pub keys: KeyState,

    api: Arc<dyn GameApi>,
    assets: Arc<AssetCache>,
    storage: Storage,
    link: ServerLink,
    inbox: Inbox,
    inbox_tx: InboxSender,
    input: VecDeque<InputEvent>,
    clock: AnimationClock,
    travel: Option<PendingTravel>,
    profile_dirty: bool,
}

impl GameClient {
    /// Logs in, warms the sprite cache, joins the game and loads the
    /// starting scene.
    pub async fn start(cfg: &ClientConfig, deps: ClientDeps) -> anyhow::Result<Self> {
        let saved = deps.storage.load_all();
        let mut local = LocalPlayer::default();
        if let Some(profile) = saved.profile.clone() {
            profile.apply_to(&mut local);
        }
        if let Some(nickname) = &cfg.nickname {
            local.nickname = nickname.clone();
        }
        if let Some(sprite) = &cfg.sprite {
            local.sprite = sprite.clone();
        }

        let token = cfg
            .token
            .clone()
            .or_else(|| saved.token.clone())
            .ok_or(AuthError::MissingToken)?;
        let session = deps.api.login(&token).await.context("login")?;
        local.token = Some(session.token.clone());
        local.user_id = Some(session.user_id.clone());
        local.ensure_nickname();

        warm_sprites(&deps, &local.sprite).await;

        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let link = ServerLink::connect(&cfg.server_addr, inbox_tx.clone()).await?;

        let mut client = Self::assemble(session.game_config, local, saved, deps, link, inbox_tx, inbox);
        if let Err(e) = client.storage.save_token(&session.token) {
            warn!(error = %e, "Could not persist token");
        }
        client.profile_dirty = true;
        client.flush_profile();

        let join = client.local.join_event().ok_or(AuthError::MissingToken)?;
        client.link.send(join)?;
        info!(
            user_id = %session.user_id,
            nickname = %client.local.nickname,
            scene = %client.local.position.scene,
            "Joined game"
        );

        let scene = client.local.position.scene.clone();
        client.load_scene_now(&scene).await;
        Ok(client)
    }

    /// A client with no server behind it. Events it sends land on the
    /// returned receiver; server events can be injected through
    /// [`GameClient::inbox_sender`].
    pub fn detached(
        deps: ClientDeps,
        local: LocalPlayer,
        config: GameConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let saved = deps.storage.load_all();
        let (link, outbound) = ServerLink::detached();
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let client = Self::assemble(config, local, saved, deps, link, inbox_tx, inbox);
        (client, outbound)
    }

    fn assemble(
        config: GameConfig,
        local: LocalPlayer,
        saved: SavedState,
        deps: ClientDeps,
        link: ServerLink,
        inbox_tx: InboxSender,
        inbox: Inbox,
    ) -> Self {
        Self {
            state: ClientState::Playing,
            config,
            local,
            entities: EntityTables::default(),
            overlay: MessageOverlay::default(),
            scene: None,
            chat_history: saved.chat_history,
            interaction_history: saved.interaction_history,
            notices: BoundedHistory::new(CHAT_HISTORY_CAP),
            alerts: Vec::new(),
            music: MusicToggle::new(saved.music_enabled),
            bag_open: false,
            keys: KeyState::default(),
            api: deps.api,
            assets: deps.assets,
            storage: deps.storage,
            link,
            inbox,
            inbox_tx,
            input: VecDeque::new(),
            clock: AnimationClock::default(),
            travel: None,
            profile_dirty: false,
        }
    }

    pub fn inbox_sender(&self) -> InboxSender {
        self.inbox_tx.clone()
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_running(&self) -> bool {
        self.state == ClientState::Playing
    }

    /// Queues input for the next frame.
    pub fn push_input(&mut self, event: InputEvent) {
        self.input.push_back(event);
    }

    /// Bag contents padded to `bag_size` slots.
    pub fn bag_slots(&self) -> Vec<Option<&BagItem>> {
        self.local.bag_slots(self.config.bag_size)
    }

    /// Takes the alerts raised since the last call.
    pub fn take_alerts(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.alerts)
    }

    /// Simulates one frame, then draws it.
    pub fn frame(&mut self, backend: &mut dyn RenderBackend, now: Instant) {
        self.simulate(now);
        self.draw(backend);
    }

    /// Everything in a frame except drawing.
    pub fn simulate(&mut self, now: Instant) {
        self.drain_inbox(now);
        self.apply_input();
        for name in self.overlay.expire(now) {
            debug!(%name, "Bubble expired");
        }
        self.run_due_travel(now);
        self.predict(now);
        self.flush_profile();
    }

    pub fn draw(&self, backend: &mut dyn RenderBackend) {
        draw_frame(
            backend,
            &FrameView {
                config: &self.config,
                scene: self.scene.as_ref(),
                local: &self.local,
                facing: self.keys.facing(),
                entities: &self.entities,
                overlay: &self.overlay,
                images: &*self.assets,
            },
        );
    }

    fn drain_inbox(&mut self, now: Instant) {
        while let Ok(incoming) = self.inbox.try_recv() {
            match incoming {
                Incoming::Server(event) => self.handle_server_event(event, now),
                Incoming::SceneFetched { name, result } => self.scene_fetched(name, result),
                Incoming::Closed(reason) => {
                    if self.state == ClientState::Playing {
                        warn!(%reason, "Disconnected from server");
                        self.state = ClientState::Disconnected;
                        self.alerts.push(Alert::Disconnected(reason));
                    }
                }
            }
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent, now: Instant) {
        if let Some(out) = apply_event(&mut self.entities, &mut self.local, &event) {
            for path in &out.preload {
                self.assets.preload(path);
            }
            for notice in out.notices {
                info!(%notice, "System notice");
                self.notices.push(notice);
            }
            if out.self_stats_changed {
                self.profile_dirty = true;
            }
            return;
        }

        match event {
            ServerEvent::ChatMessage(entry) => self.receive_chat(entry, now),
            ServerEvent::InteractionResult(result) => self.receive_interaction(result, now),
            ServerEvent::Error { message } => {
                warn!(%message, "Server error");
                self.alerts.push(ProtocolError { message }.into());
            }
            other => debug!(event = other.name(), "Unhandled server event"),
        }
    }

    fn receive_chat(&mut self, entry: ChatEntry, now: Instant) {
        let speaker = entry
            .from_nickname
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.entities.player_nickname(&entry.from).map(str::to_string))
            .unwrap_or_else(|| entry.from.clone());
        debug!(%speaker, "Chat message");
        self.overlay.show(&speaker, &entry.message, now);
        self.chat_history.push(entry);
        if let Err(e) = self.storage.save_chat_history(&self.chat_history) {
            warn!(error = %e, "Could not persist chat history");
        }
    }

    fn receive_interaction(&mut self, result: InteractionResult, now: Instant) {
        let entry = InteractionEntry::stamped(result, Utc::now());
        info!(
            kind = ?entry.kind,
            item = entry.item_name.as_deref().unwrap_or(""),
            "Interaction result"
        );

        match entry.kind {
            Some(InteractionKind::Chat) => {
                if let Some(item) = &entry.item_name {
                    let text = entry.data.message.as_deref().unwrap_or(DEFAULT_GREETING);
                    self.overlay.show(item, text, now);
                }
            }
            Some(InteractionKind::SceneChange) => match &entry.data.target_scene {
                Some(scene) => {
                    self.travel = Some(PendingTravel {
                        due: now + TRAVEL_DELAY,
                        scene: scene.clone(),
                        x: entry.data.target_x.unwrap_or(DEFAULT_ARRIVAL),
                        y: entry.data.target_y.unwrap_or(DEFAULT_ARRIVAL),
                    });
                }
                None => warn!("Scene change without target scene ignored"),
            },
            _ => {}
        }

        self.interaction_history.push(entry);
        if let Err(e) = self.storage.save_interaction_history(&self.interaction_history) {
            warn!(error = %e, "Could not persist interaction history");
        }
    }

    fn apply_input(&mut self) {
        while let Some(event) = self.input.pop_front() {
            match event {
                InputEvent::KeyDown(key) if self.keys.chat_focused() => {
                    debug!(?key, "Key ignored while chat is focused");
                }
                InputEvent::KeyDown(Key::E) => self.interact(),
                InputEvent::KeyDown(Key::B) => self.bag_open = !self.bag_open,
                InputEvent::KeyDown(key) => self.keys.press(key),
                InputEvent::KeyUp(key) => self.keys.release(key),
                InputEvent::Chat(text) => self.send_chat(&text),
                InputEvent::ChatFocus(focused) => self.keys.set_chat_focus(focused),
                InputEvent::ToggleMusic => {
                    let enabled = self.music.toggle();
                    info!(enabled, "Music toggled");
                    if let Err(e) = self.storage.save_music_enabled(enabled) {
                        warn!(error = %e, "Could not persist music setting");
                    }
                }
            }
        }
    }

    fn interact(&mut self) {
        let (Some(scene), Some(user_id)) = (&self.scene, &self.local.user_id) else {
            return;
        };
        let request = interaction_request(
            scene,
            &self.local.position,
            user_id,
            self.config.interaction_distance,
        );
        match request {
            Some(event) => self.send(event),
            None => debug!("Nothing in reach"),
        }
    }

    fn send_chat(&mut self, text: &str) {
        let message = text.trim();
        if message.is_empty() {
            return;
        }
        let Some(user_id) = self.local.user_id.clone() else {
            return;
        };
        self.send(ClientEvent::ChatMessage {
            user_id,
            message: message.to_string(),
            target_id: None,
        });
    }

    fn run_due_travel(&mut self, now: Instant) {
        if !self.travel.as_ref().is_some_and(|t| t.due <= now) {
            return;
        }
        let Some(travel) = self.travel.take() else {
            return;
        };
        info!(scene = %travel.scene, x = travel.x, y = travel.y, "Travelling");
        self.local.position = Position::new(travel.x, travel.y, travel.scene.clone());
        self.profile_dirty = true;
        self.spawn_scene_fetch(travel.scene);
    }

    fn predict(&mut self, now: Instant) {
        let intent = self.keys.move_intent();
        let out = predict_tick(
            &mut self.local,
            &mut self.clock,
            intent,
            self.scene.as_ref(),
            &*self.assets,
            self.config.tile_size,
            now,
        );
        if out.moved || out.stats_changed {
            self.profile_dirty = true;
        }
        if let Some(event) = out.event {
            self.send(event);
        }
    }

    fn send(&mut self, event: ClientEvent) {
        if let Err(e) = self.link.send(event) {
            warn!(error = %e, "Dropping outbound event");
        }
    }

    fn flush_profile(&mut self) {
        if !std::mem::take(&mut self.profile_dirty) {
            return;
        }
        if let Err(e) = self.storage.save_profile(&Profile::of(&self.local)) {
            warn!(error = %e, "Could not persist profile");
        }
    }

    /// Fetches a scene in the background; the result comes back through the inbox.
    fn spawn_scene_fetch(&self, name: String) {
        let api = Arc::clone(&self.api);
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_scene(&name).await.map_err(|e| e.to_string());
            let _ = inbox.send(Incoming::SceneFetched { name, result });
        });
    }

    fn scene_fetched(&mut self, name: String, result: Result<Scene, String>) {
        match result {
            Ok(scene) if name == self.local.position.scene => {
                for path in scene_assets(&scene) {
                    self.assets.preload(&path);
                }
                info!(scene = %name, "Scene loaded");
                self.scene = Some(scene);
            }
            Ok(_) => debug!(scene = %name, "Discarding scene the player already left"),
            Err(error) => warn!(scene = %name, %error, "Scene fetch failed"),
        }
    }

    /// Fetches a scene and its textures before returning.
    async fn load_scene_now(&mut self, name: &str) {
        match self.api.fetch_scene(name).await {
            Ok(scene) => {
                for path in scene_assets(&scene) {
                    if let Err(e) = self.assets.load(&path).await {
                        warn!(error = %e, "Scene texture unavailable");
                    }
                }
                self.scene = Some(scene);
            }
            Err(e) => warn!(scene = %name, error = %e, "Scene fetch failed"),
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> Vec<String> {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => Vec::new(),
            "press" | "release" => match Key::parse(rest) {
                Some(key) if command == "press" => {
                    self.push_input(InputEvent::KeyDown(key));
                    Vec::new()
                }
                Some(key) => {
                    self.push_input(InputEvent::KeyUp(key));
                    Vec::new()
                }
                None => vec![format!("Usage: {command} <up|down|left|right|w|a|s|d|e|b>")],
            },
            "interact" => {
                self.push_input(InputEvent::KeyDown(Key::E));
                Vec::new()
            }
            "say" => {
                if rest.is_empty() {
                    return vec!["Usage: say <message>".to_string()];
                }
                self.push_input(InputEvent::Chat(rest.to_string()));
                Vec::new()
            }
            "focus" => {
                self.push_input(InputEvent::ChatFocus(true));
                Vec::new()
            }
            "blur" => {
                self.push_input(InputEvent::ChatFocus(false));
                Vec::new()
            }
            "music" => {
                self.push_input(InputEvent::ToggleMusic);
                vec![format!("Music: {}", if self.music.is_enabled() { "off" } else { "on" })]
            }
            "bag" => self
                .bag_slots()
                .iter()
                .enumerate()
                .map(|(i, slot)| match slot {
                    Some(item) => format!("[{i}] {}", item.name),
                    None => format!("[{i}] -"),
                })
                .collect(),
            "status" => {
                let p = &self.local;
                let mut out = vec![
                    format!("State: {:?}", self.state),
                    format!(
                        "Player: {} ({})",
                        p.nickname,
                        p.user_id.as_deref().unwrap_or("?")
                    ),
                    format!(
                        "Position: {:.1},{:.1} in {} facing {:?}",
                        p.position.x, p.position.y, p.position.scene, p.direction
                    ),
                    format!(
                        "Energy {:.1} / Happiness {:.1} / Health {:.1}",
                        p.stats.energy, p.stats.happiness, p.stats.health
                    ),
                    format!(
                        "Entities: {} players, {} AI players, {} AI characters",
                        self.entities.players.len(),
                        self.entities.ai_players.len(),
                        self.entities.ai_characters.len()
                    ),
                    format!("Assets cached: {}", self.assets.len()),
                    self.music.label().to_string(),
                ];
                if let Some(last) = self.chat_history.last() {
                    out.push(format!("Last chat: {}", last.message));
                }
                out
            }
            "quit" | "exit" => {
                self.state = ClientState::Quit;
                vec!["Bye".to_string()]
            }
            other => vec![format!("Unknown command: {other}")],
        }
    }
}

/// Awaits the player's own sprite, then every selectable character sprite.
/// Failures only cost a fallback drawing, so they are logged and skipped.
async fn warm_sprites(deps: &ClientDeps, own_sprite: &str) {
    if let Err(e) = deps.assets.load(&character_asset(own_sprite)).await {
        warn!(error = %e, "Player sprite unavailable, using fallback");
    }
    match deps.api.list_characters().await {
        Ok(sprites) => {
            for sprite in &sprites {
                if let Err(e) = deps.assets.load(&character_asset(sprite)).await {
                    warn!(error = %e, "Character sprite unavailable");
                }
            }
            info!(count = sprites.len(), "Character sprites warmed");
        }
        Err(e) => warn!(error = %e, "Character list unavailable"),
    }
}

/// Floor and item textures a scene draws with.
pub fn scene_assets(scene: &Scene) -> Vec<String> {
    let mut paths: Vec<String> = scene.floor_texture.as_deref().map(floor_asset).into_iter().collect();
    for image in scene.items.iter().filter_map(|i| i.image.as_deref()) {
        let path = item_asset(image);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}
