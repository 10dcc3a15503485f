//! Ports to the authoritative server and the battle engine.
//!
//! The controller only talks to the outside world through
//! [`ExpeditionService`] and [`BattleService`]. Wire shapes live here too so
//! every adapter decodes the same envelopes.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::constants::{ENDPOINT_ADVANCE, ENDPOINT_BATTLE};
use crate::event::{Event, MonsterSnapshot};
use crate::ledger::StatDeltas;
use crate::progress::ExpeditionProgress;

/// Why the server refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    FacilityNotFound,
    InsufficientFunds,
    Other(String),
}

impl Rejection {
    /// Classify a free-form server error message.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("facility") && lower.contains("not found") {
            Self::FacilityNotFound
        } else if lower.contains("insufficient") {
            Self::InsufficientFunds
        } else {
            Self::Other(message.to_string())
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FacilityNotFound => f.write_str("facility not found"),
            Self::InsufficientFunds => f.write_str("insufficient funds"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

/// Failure of an external call. Never retried by the controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{endpoint} request failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} request rejected: {reason}")]
    Rejected {
        endpoint: &'static str,
        reason: Rejection,
    },
    #[error("{endpoint} endpoint is not implemented by the server")]
    Unimplemented { endpoint: &'static str },
    #[error("{endpoint} returned malformed data: {message}")]
    Malformed {
        endpoint: &'static str,
        message: String,
    },
}

impl ServiceError {
    #[must_use]
    pub fn rejected(endpoint: &'static str, message: &str) -> Self {
        Self::Rejected {
            endpoint,
            reason: Rejection::classify(message),
        }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &'static str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Rejected { endpoint, .. }
            | Self::Unimplemented { endpoint }
            | Self::Malformed { endpoint, .. } => endpoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExpeditionRequest {
    pub island_id: String,
    pub facility_id: String,
    pub team_monster_ids: Vec<String>,
}

/// Body of the authoritative move commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMoveRequest {
    pub path: Vec<String>,
}

/// Where a battle takes place, sent alongside the monster payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleContext {
    pub island_id: String,
    pub facility_id: String,
    pub node_id: String,
    pub step: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRequest {
    pub player_monster_data: Vec<MonsterSnapshot>,
    pub opponent_monster_data: MonsterSnapshot,
    #[serde(flatten)]
    pub context: BattleContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleWinner {
    Player,
    Opponent,
    Draw,
}

/// Outcome of a simulated battle. Only the winner and the stat deltas are
/// interpreted by the expedition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResult {
    pub winner: BattleWinner,
    #[serde(default)]
    pub turns: u32,
    #[serde(default)]
    pub deltas: StatDeltas,
    #[serde(default)]
    pub log: Vec<String>,
}

impl BattleResult {
    #[must_use]
    pub const fn player_won(&self) -> bool {
        matches!(self.winner, BattleWinner::Player)
    }
}

/// `{success, adventure_progress}` or `{error}` from start and move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgressEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub adventure_progress: Option<ExpeditionProgress>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressEnvelope {
    /// Unwrap the envelope into progress or a classified error.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Rejected`] for server errors and
    /// [`ServiceError::Malformed`] when a success carries no progress.
    pub fn into_result(self, endpoint: &'static str) -> Result<ExpeditionProgress, ServiceError> {
        if let Some(message) = self.error {
            return Err(ServiceError::rejected(endpoint, &message));
        }
        match (self.success, self.adventure_progress) {
            (true, Some(progress)) => Ok(progress),
            (true, None) => Err(ServiceError::Malformed {
                endpoint,
                message: "success without adventure_progress".to_string(),
            }),
            (false, _) => Err(ServiceError::rejected(endpoint, "request was not successful")),
        }
    }
}

/// `{success, event_data}` or `{error}` from advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub event_data: Option<Event>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EventEnvelope {
    /// Unwrap the envelope into an event or a classified error.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Rejected`] for server errors and
    /// [`ServiceError::Malformed`] when a success carries no event.
    pub fn into_result(self) -> Result<Event, ServiceError> {
        if let Some(message) = self.error {
            return Err(ServiceError::rejected(ENDPOINT_ADVANCE, &message));
        }
        match (self.success, self.event_data) {
            (true, Some(event)) => Ok(event),
            (true, None) => Err(ServiceError::Malformed {
                endpoint: ENDPOINT_ADVANCE,
                message: "success without event_data".to_string(),
            }),
            (false, _) => Err(ServiceError::rejected(
                ENDPOINT_ADVANCE,
                "request was not successful",
            )),
        }
    }
}

/// `{battle_result}` or `{error}` from the battle service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BattleEnvelope {
    #[serde(default)]
    pub battle_result: Option<BattleResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BattleEnvelope {
    /// Unwrap the envelope into a battle result.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the battle service reports an error or
    /// omits the result.
    pub fn into_result(self) -> Result<BattleResult, ServiceError> {
        match (self.battle_result, self.error) {
            (_, Some(message)) => Err(ServiceError::rejected(ENDPOINT_BATTLE, &message)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ServiceError::Malformed {
                endpoint: ENDPOINT_BATTLE,
                message: "missing battle_result".to_string(),
            }),
        }
    }
}

/// Authoritative expedition backend.
#[async_trait]
pub trait ExpeditionService: Send + Sync {
    /// Generate a map and open an expedition.
    async fn start_expedition(
        &self,
        request: &StartExpeditionRequest,
    ) -> Result<ExpeditionProgress, ServiceError>;

    /// Commit a confirmed path. This is the authoritative move boundary.
    async fn commit_move(
        &self,
        request: &CommitMoveRequest,
    ) -> Result<ExpeditionProgress, ServiceError>;

    /// Fetch the next scripted event for the session.
    async fn advance(&self) -> Result<Event, ServiceError>;
}

/// External combat resolution.
#[async_trait]
pub trait BattleService: Send + Sync {
    async fn simulate_battle(&self, request: &BattleRequest) -> Result<BattleResult, ServiceError>;
}

#[async_trait]
impl<T: ExpeditionService + ?Sized> ExpeditionService for Arc<T> {
    async fn start_expedition(
        &self,
        request: &StartExpeditionRequest,
    ) -> Result<ExpeditionProgress, ServiceError> {
        (**self).start_expedition(request).await
    }

    async fn commit_move(
        &self,
        request: &CommitMoveRequest,
    ) -> Result<ExpeditionProgress, ServiceError> {
        (**self).commit_move(request).await
    }

    async fn advance(&self) -> Result<Event, ServiceError> {
        (**self).advance().await
    }
}

#[async_trait]
impl<T: BattleService + ?Sized> BattleService for Arc<T> {
    async fn simulate_battle(&self, request: &BattleRequest) -> Result<BattleResult, ServiceError> {
        (**self).simulate_battle(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ENDPOINT_MOVE, ENDPOINT_START};

    #[test]
    fn classifies_start_rejections() {
        assert_eq!(
            Rejection::classify("Facility not found"),
            Rejection::FacilityNotFound
        );
        assert_eq!(
            Rejection::classify("Insufficient gold for this facility"),
            Rejection::InsufficientFunds
        );
        assert_eq!(
            Rejection::classify("maintenance window"),
            Rejection::Other("maintenance window".to_string())
        );
    }

    #[test]
    fn progress_envelope_surfaces_errors() {
        let err = ProgressEnvelope {
            error: Some("insufficient funds".to_string()),
            ..ProgressEnvelope::default()
        }
        .into_result(ENDPOINT_START)
        .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Rejected {
                endpoint: ENDPOINT_START,
                reason: Rejection::InsufficientFunds
            }
        );

        let err = ProgressEnvelope {
            success: true,
            ..ProgressEnvelope::default()
        }
        .into_result(ENDPOINT_MOVE)
        .unwrap_err();
        assert!(matches!(err, ServiceError::Malformed { endpoint, .. } if endpoint == ENDPOINT_MOVE));
    }

    #[test]
    fn battle_envelope_requires_result() {
        let envelope: BattleEnvelope = serde_json::from_str(
            r#"{"battle_result": {"winner": "player", "turns": 7, "deltas": {"gold": 50}}}"#,
        )
        .unwrap();
        let result = envelope.into_result().unwrap();
        assert!(result.player_won());
        assert_eq!(result.deltas.gold, 50);

        let missing: BattleEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.into_result().unwrap_err().endpoint(), ENDPOINT_BATTLE);
    }

    #[test]
    fn start_request_uses_camel_case() {
        let request = StartExpeditionRequest {
            island_id: "isle-1".to_string(),
            facility_id: "reef".to_string(),
            team_monster_ids: vec!["m1".to_string()],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["islandId"], "isle-1");
        assert_eq!(json["teamMonsterIds"][0], "m1");
    }
}
