//! Expedition progress snapshot and lifecycle phases.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ledger::ExpeditionStats;
use crate::map::MapData;

/// Lifecycle phase of the expedition controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpeditionPhase {
    #[default]
    Inactive,
    Active,
    EventPending,
    BossBattle,
    Completed,
}

impl ExpeditionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::EventPending => "event_pending",
            Self::BossBattle => "boss_battle",
            Self::Completed => "completed",
        }
    }

    /// Whether a session exists in this phase.
    #[must_use]
    pub const fn has_session(self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

impl fmt::Display for ExpeditionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpeditionPhase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            "event_pending" => Ok(Self::EventPending),
            "boss_battle" => Ok(Self::BossBattle),
            "completed" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

/// Authoritative expedition state as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpeditionProgress {
    pub island_id: String,
    pub facility_id: String,
    pub is_active: bool,
    pub current_node_id: String,
    pub map_data: MapData,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub stats: ExpeditionStats,
}
