//! Error taxonomy of the expedition controller.
use thiserror::Error;

use crate::map::MapDataError;
use crate::progress::ExpeditionPhase;
use crate::services::ServiceError;

/// Caller mistakes and unmet preconditions. No request is sent when one of
/// these is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("the expedition team is empty")]
    EmptyTeam,
    #[error("monster `{monster_id}` is busy")]
    MonsterBusy { monster_id: String },
    #[error("monster `{monster_id}` is critically injured")]
    MonsterInjured { monster_id: String },
    #[error("monster `{monster_id}` is selected more than once")]
    DuplicateMonster { monster_id: String },
    #[error("facility `{facility_id}` was not found on island `{island_id}`")]
    UnknownFacility {
        island_id: String,
        facility_id: String,
    },
    #[error("{operation} is not allowed while the expedition is {phase}")]
    WrongPhase {
        operation: &'static str,
        phase: ExpeditionPhase,
    },
    #[error("node `{node_id}` does not exist on this map")]
    UnknownNode { node_id: String },
    #[error("node `{node_id}` is an obstacle")]
    ObstacleTarget { node_id: String },
    #[error("path is invalid: {reason}")]
    InvalidPath { reason: String },
    #[error("there is no pending event")]
    NoPendingEvent,
    #[error("choice `{choice_id}` is not offered by the pending event")]
    UnknownChoice { choice_id: String },
}

/// Every failure the controller can surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpeditionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no traversable route from `{from}` to `{to}`")]
    UnreachablePath { from: String, to: String },
    #[error("malformed map snapshot: {0}")]
    MapData(#[from] MapDataError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ExpeditionError {
    /// A malformed map poisons the expedition instance; everything else can
    /// be retried or followed by a different operation.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::MapData(_))
    }

    pub(crate) const fn wrong_phase(operation: &'static str, phase: ExpeditionPhase) -> Self {
        Self::Validation(ValidationError::WrongPhase { operation, phase })
    }

    pub(crate) fn invalid_path(reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidPath {
            reason: reason.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_map_errors_are_fatal() {
        assert!(!ExpeditionError::from(MapDataError::MissingStart).is_recoverable());
        assert!(ExpeditionError::from(ValidationError::EmptyTeam).is_recoverable());
        assert!(
            ExpeditionError::from(ServiceError::Unimplemented { endpoint: "move" })
                .is_recoverable()
        );
        assert!(
            ExpeditionError::UnreachablePath {
                from: "a".to_string(),
                to: "b".to_string()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn messages_name_the_problem() {
        let err = ExpeditionError::wrong_phase("advance", ExpeditionPhase::Inactive);
        assert_eq!(
            err.to_string(),
            "advance is not allowed while the expedition is inactive"
        );
    }
}
