//! Expedition lifecycle: session state and the controller driving it.
//!
//! The controller is the only component that talks to the service ports.
//! Everything it returns is owned so callers can keep plans and outcomes
//! around while issuing the next operation.
use serde::{Deserialize, Serialize};

use crate::event::EventType;
use crate::ledger::MoveCost;
use crate::map::{NodeType, Position};
use crate::progress::ExpeditionPhase;
use crate::services::BattleResult;

mod controller;
mod session;

pub use controller::ExpeditionController;
pub use session::ExpeditionSession;

/// A previewed route. Planning is free; nothing is charged until the path is
/// committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlan {
    /// Node ids from the current node to the target, both inclusive.
    pub path: Vec<String>,
    pub positions: Vec<Position>,
    pub cost: MoveCost,
    pub destination_type: NodeType,
}

impl MovePlan {
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    #[must_use]
    pub const fn is_stationary(&self) -> bool {
        self.cost.is_free()
    }
}

/// Result of an authoritative move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Node the server placed the team on.
    pub node_id: String,
    pub node_type: NodeType,
    pub cost: MoveCost,
    pub encounter_due: bool,
    pub phase: ExpeditionPhase,
}

/// Result of resolving a choice on the pending event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChoiceOutcome {
    /// A boss battle was simulated and folded into the ledger.
    BattleFought {
        result: BattleResult,
        phase: ExpeditionPhase,
    },
    /// The choice has no mechanical effect yet.
    Unresolved {
        event_type: EventType,
        choice_id: String,
    },
}

impl ChoiceOutcome {
    #[must_use]
    pub const fn battle(&self) -> Option<&BattleResult> {
        match self {
            Self::BattleFought { result, .. } => Some(result),
            Self::Unresolved { .. } => None,
        }
    }
}
