//! Expedition Engine
//!
//! Platform-agnostic core of the monster expedition mode: grid map model,
//! A* path planner, resource ledger and the lifecycle controller that drives
//! an expedition against an authoritative server.
//! This crate provides all expedition mechanics without UI dependencies; the
//! optional `http` feature adds a JSON/HTTP adapter for the service ports.

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod expedition;
pub mod facility;
#[cfg(feature = "http")]
pub mod http;
pub mod ledger;
pub mod map;
pub mod pathfinding;
pub mod progress;
pub mod render;
pub mod services;
pub mod summary;

// Re-export commonly used types
pub use config::{ExpeditionCfg, ExpeditionConfigError, ServiceConfig};
pub use error::{ExpeditionError, ValidationError};
pub use event::{
    Event, EventChoice, EventType, MonsterCondition, MonsterSnapshot, TeamMember,
};
pub use expedition::{ChoiceOutcome, ExpeditionController, ExpeditionSession, MoveOutcome, MovePlan};
pub use facility::{Facility, FacilityCatalog};
#[cfg(feature = "http")]
pub use http::{HttpGameClient, HttpSetupError};
pub use ledger::{ExpeditionStats, Ledger, MoveCost, StatDeltas};
pub use map::{Bounds, MapData, MapDataError, MapModel, Node, NodeType, Position, map_from_rows};
pub use pathfinding::{find_path, path_positions, step_count};
pub use progress::{ExpeditionPhase, ExpeditionProgress};
pub use render::{MapOverlay, MapRenderer, TerminalGrid};
pub use services::{
    BattleContext, BattleEnvelope, BattleRequest, BattleResult, BattleService, BattleWinner,
    CommitMoveRequest, EventEnvelope, ExpeditionService, ProgressEnvelope, Rejection,
    ServiceError, StartExpeditionRequest,
};
pub use summary::{Ending, ExpeditionSummary};
