//! HTTP API: login, character list and scene documents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use town_shared::{
    config::GameConfig,
    error::{AuthError, NetworkError},
    model::Scene,
};
use tracing::{debug, info};

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub game_config: GameConfig,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    game_config: GameConfig,
    #[serde(default)]
    error: Option<String>,
}

impl LoginResponse {
    fn into_session(self) -> Result<Session, AuthError> {
        if !self.success {
            let reason = self.error.unwrap_or_else(|| "Invalid token".to_string());
            return Err(AuthError::Rejected(reason));
        }
        let token = self.token.ok_or(AuthError::MissingToken)?;
        let user_id = self
            .user_id
            .ok_or_else(|| AuthError::Rejected("response carried no user id".into()))?;
        Ok(Session {
            token,
            user_id,
            game_config: self.game_config,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CharacterList {
    #[serde(default)]
    characters: Vec<String>,
}

/// The game server's HTTP surface.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn login(&self, token: &str) -> Result<Session, LoginError>;
    /// Sprite file names selectable as characters.
    async fn list_characters(&self) -> Result<Vec<String>, NetworkError>;
    async fn fetch_scene(&self, name: &str) -> Result<Scene, NetworkError>;
}

pub struct HttpApi {
    client: reqwest::Client,
    base: String,
}

impl HttpApi {
    pub fn new(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, NetworkError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let request_err = |e: reqwest::Error| NetworkError::Request {
            url: url.clone(),
            source: Box::new(e),
        };
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_err)?
            .json()
            .await
            .map_err(request_err)
    }
}

#[async_trait]
impl GameApi for HttpApi {
    async fn login(&self, token: &str) -> Result<Session, LoginError> {
        let url = self.url("/api/login");
        let request_err = |e: reqwest::Error| NetworkError::Request {
            url: url.clone(),
            source: Box::new(e),
        };
        // Rejections come back as 400/401 with a JSON body, so the status
        // is not checked before decoding.
        let resp: LoginResponse = self
            .client
            .post(&url)
            .json(&LoginRequest { token })
            .send()
            .await
            .map_err(request_err)?
            .json()
            .await
            .map_err(request_err)?;
        let session = resp.into_session()?;
        info!(user_id = %session.user_id, "Logged in");
        Ok(session)
    }

    async fn list_characters(&self) -> Result<Vec<String>, NetworkError> {
        let list: CharacterList = self.get_json("/api/characters/list").await?;
        Ok(list.characters)
    }

    async fn fetch_scene(&self, name: &str) -> Result<Scene, NetworkError> {
        let mut scene: Scene = self.get_json(&format!("/api/scenes/{name}")).await?;
        if scene.name.is_empty() {
            scene.name = name.to_string();
        }
        info!(scene = %scene.name, items = scene.items.len(), "Scene fetched");
        Ok(scene)
    }
}
