//! HTTP implementation of the engine boundary.

use super::{
    DeleteAck, EngineError, GameEngine, NewSessionRequest, NewSessionResponse, ProgressSnapshot,
    SessionState, TurnRequest, TurnResult,
};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

/// Engine client speaking the JSON REST API.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEngine {
    /// Creates a client for the engine at `base_url`.
    #[instrument(skip_all, fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        info!("Creating engine client");
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            EngineError::transport(format!("Invalid engine URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                EngineError::transport(format!("Engine URL '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Decodes a response body, mapping failures onto [`EngineError`].
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, EngineError> {
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, body_len = body.len(), "Got engine response");

        if !status.is_success() {
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|json| {
                    json.get("detail")
                        .or_else(|| json.get("message"))
                        .and_then(|d| d.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("HTTP {}", status));

            return Err(if status == StatusCode::NOT_FOUND {
                EngineError::unknown_session(detail)
            } else {
                EngineError::transport(detail)
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| EngineError::transport(format!("Invalid engine response: {}", e)))
    }
}

#[async_trait::async_trait]
impl GameEngine for HttpEngine {
    #[instrument(skip(self, initial_context))]
    async fn create_session(
        &self,
        initial_context: Option<String>,
    ) -> Result<NewSessionResponse, EngineError> {
        info!("Creating engine session");
        let response = self
            .client
            .post(self.url(&["api", "new_game"])?)
            .json(&NewSessionRequest { initial_context })
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn get_session_state(&self, session_id: &str) -> Result<SessionState, EngineError> {
        debug!("Fetching session state");
        let response = self
            .client
            .get(self.url(&["api", "state", session_id])?)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    async fn submit_turn(&self, request: TurnRequest) -> Result<TurnResult, EngineError> {
        info!(command_len = request.player_command.len(), "Submitting turn");
        let response = self
            .client
            .post(self.url(&["api", "turn"])?)
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn get_progress(&self, session_id: &str) -> Result<ProgressSnapshot, EngineError> {
        let response = self
            .client
            .get(self.url(&["api", "progress", session_id])?)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> Result<DeleteAck, EngineError> {
        info!("Deleting engine session");
        let response = self
            .client
            .delete(self.url(&["api", "session", session_id])?)
            .send()
            .await?;
        Self::decode(response).await
    }
}
