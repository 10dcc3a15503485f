//! HTTP adapter for the expedition and battle ports.
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{ExpeditionConfigError, ServiceConfig};
use crate::constants::{ENDPOINT_ADVANCE, ENDPOINT_BATTLE, ENDPOINT_MOVE, ENDPOINT_START};
use crate::event::Event;
use crate::progress::ExpeditionProgress;
use crate::services::{
    BattleEnvelope, BattleRequest, BattleResult, BattleService, CommitMoveRequest, EventEnvelope,
    ExpeditionService, ProgressEnvelope, ServiceError, StartExpeditionRequest,
};

#[derive(Debug, Error)]
pub enum HttpSetupError {
    #[error(transparent)]
    Config(#[from] ExpeditionConfigError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Talks to a game server over JSON/HTTP. Implements both service ports so a
/// single client (and its connection pool) can back a controller.
#[derive(Debug, Clone)]
pub struct HttpGameClient {
    client: Client,
    config: ServiceConfig,
}

impl HttpGameClient {
    /// # Errors
    ///
    /// Returns [`HttpSetupError`] when the configuration is invalid or the
    /// underlying client cannot be built.
    pub fn new(config: ServiceConfig) -> Result<Self, HttpSetupError> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let builder = self.client.post(self.config.url(path));
        match &self.config.session_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let response = request.send().await.map_err(|err| ServiceError::Transport {
            endpoint,
            message: err.to_string(),
        })?;
        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED) {
            return Err(ServiceError::Unimplemented { endpoint });
        }
        let body = response.text().await.map_err(|err| ServiceError::Transport {
            endpoint,
            message: err.to_string(),
        })?;
        log::debug!("{endpoint} -> {status} ({} bytes)", body.len());

        match serde_json::from_str(&body) {
            Ok(envelope) => Ok(envelope),
            Err(err) if status.is_success() => Err(ServiceError::Malformed {
                endpoint,
                message: err.to_string(),
            }),
            Err(_) => Err(ServiceError::rejected(endpoint, &format!("HTTP {status}: {body}"))),
        }
    }
}

#[async_trait]
impl ExpeditionService for HttpGameClient {
    async fn start_expedition(
        &self,
        request: &StartExpeditionRequest,
    ) -> Result<ExpeditionProgress, ServiceError> {
        let envelope: ProgressEnvelope =
            Self::send(ENDPOINT_START, self.post(&self.config.start_path).json(request)).await?;
        envelope.into_result(ENDPOINT_START)
    }

    async fn commit_move(
        &self,
        request: &CommitMoveRequest,
    ) -> Result<ExpeditionProgress, ServiceError> {
        let envelope: ProgressEnvelope =
            Self::send(ENDPOINT_MOVE, self.post(&self.config.move_path).json(request)).await?;
        envelope.into_result(ENDPOINT_MOVE)
    }

    async fn advance(&self) -> Result<Event, ServiceError> {
        let envelope: EventEnvelope =
            Self::send(ENDPOINT_ADVANCE, self.post(&self.config.advance_path)).await?;
        envelope.into_result()
    }
}

#[async_trait]
impl BattleService for HttpGameClient {
    async fn simulate_battle(&self, request: &BattleRequest) -> Result<BattleResult, ServiceError> {
        let envelope: BattleEnvelope =
            Self::send(ENDPOINT_BATTLE, self.post(&self.config.battle_path).json(request)).await?;
        envelope.into_result()
    }
}
