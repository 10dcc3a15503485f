//! Centralized tuning constants for expedition logic.
//!
//! Values that are not part of [`crate::ExpeditionCfg`] live here so that the
//! movement math can only change through reviewed code.

/// Exploration points debited for every step along a committed path.
pub const EXPLORATION_POINTS_PER_STEP: u32 = 1;
/// Default number of steps covered by one unit of food.
pub const DEFAULT_STEPS_PER_FOOD: u32 = 5;

/// Unit edge cost used by the path planner.
pub(crate) const STEP_COST: u32 = 1;

// Endpoint names -------------------------------------------------------------
pub const ENDPOINT_START: &str = "start";
pub const ENDPOINT_MOVE: &str = "move";
pub const ENDPOINT_ADVANCE: &str = "advance";
pub const ENDPOINT_BATTLE: &str = "battle";

// HTTP adapter defaults --------------------------------------------------------
pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub(crate) const DEFAULT_START_PATH: &str = "/api/adventure/start";
pub(crate) const DEFAULT_MOVE_PATH: &str = "/api/adventure/move";
pub(crate) const DEFAULT_ADVANCE_PATH: &str = "/api/adventure/advance";
pub(crate) const DEFAULT_BATTLE_PATH: &str = "/api/battle/simulate";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 15;
