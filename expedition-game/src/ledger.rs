//! Resource ledger: movement costs and run-wide statistics.
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_STEPS_PER_FOOD, EXPLORATION_POINTS_PER_STEP};

/// Run-wide counters accumulated during an expedition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpeditionStats {
    pub gold_obtained: u64,
    pub dna_fragments_obtained: u64,
    pub events_encountered: u32,
    pub bosses_fought: u32,
    pub hp_consumed: u64,
    pub hp_healed: u64,
    pub mp_consumed: u64,
    pub mp_healed: u64,
    pub captain_switches: u32,
    pub buffs_received: u32,
    pub debuffs_received: u32,
}

impl ExpeditionStats {
    /// Fold one event's deltas into the counters.
    pub const fn absorb(&mut self, deltas: &StatDeltas) {
        self.gold_obtained = self.gold_obtained.saturating_add(deltas.gold);
        self.dna_fragments_obtained = self
            .dna_fragments_obtained
            .saturating_add(deltas.dna_fragments);
        self.hp_consumed = self.hp_consumed.saturating_add(deltas.hp_consumed);
        self.hp_healed = self.hp_healed.saturating_add(deltas.hp_healed);
        self.mp_consumed = self.mp_consumed.saturating_add(deltas.mp_consumed);
        self.mp_healed = self.mp_healed.saturating_add(deltas.mp_healed);
        self.captain_switches = self
            .captain_switches
            .saturating_add(deltas.captain_switches);
        self.buffs_received = self.buffs_received.saturating_add(deltas.buffs);
        self.debuffs_received = self.debuffs_received.saturating_add(deltas.debuffs);
    }
}

/// Per-event changes reported by the battle service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatDeltas {
    pub gold: u64,
    pub dna_fragments: u64,
    pub hp_consumed: u64,
    pub hp_healed: u64,
    pub mp_consumed: u64,
    pub mp_healed: u64,
    pub captain_switches: u32,
    pub buffs: u32,
    pub debuffs: u32,
}

/// Resources needed to walk a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCost {
    pub steps: u32,
    pub exploration_points: u32,
    pub food: u32,
}

impl MoveCost {
    /// Cost of a path containing `path_len` nodes.
    ///
    /// A path of L nodes takes L-1 steps; food is charged per started block
    /// of `steps_per_food` steps. A zero divisor falls back to the default.
    #[must_use]
    pub fn for_path_len(path_len: usize, steps_per_food: u32) -> Self {
        let steps = u32::try_from(path_len.saturating_sub(1)).unwrap_or(u32::MAX);
        let per_food = if steps_per_food == 0 {
            DEFAULT_STEPS_PER_FOOD
        } else {
            steps_per_food
        };
        Self {
            steps,
            exploration_points: steps.saturating_mul(EXPLORATION_POINTS_PER_STEP),
            food: steps.div_ceil(per_food),
        }
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.steps == 0
    }
}

/// Accumulates resource spending and statistics for one expedition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    steps_per_food: u32,
    stats: ExpeditionStats,
    spent: MoveCost,
    moves_committed: u32,
}

impl Ledger {
    #[must_use]
    pub fn new(steps_per_food: u32) -> Self {
        Self {
            steps_per_food,
            ..Self::default()
        }
    }

    /// Resume from stats recorded by the server.
    #[must_use]
    pub fn with_stats(steps_per_food: u32, stats: ExpeditionStats) -> Self {
        Self {
            steps_per_food,
            stats,
            ..Self::default()
        }
    }

    /// Preview the cost of a path without touching the ledger.
    #[must_use]
    pub fn quote(&self, path_len: usize) -> MoveCost {
        MoveCost::for_path_len(path_len, self.steps_per_food)
    }

    /// Debit a committed move.
    pub fn debit_move(&mut self, cost: MoveCost) {
        self.spent.steps = self.spent.steps.saturating_add(cost.steps);
        self.spent.exploration_points = self
            .spent
            .exploration_points
            .saturating_add(cost.exploration_points);
        self.spent.food = self.spent.food.saturating_add(cost.food);
        self.moves_committed = self.moves_committed.saturating_add(1);
    }

    pub fn record_event(&mut self) {
        self.stats.events_encountered = self.stats.events_encountered.saturating_add(1);
    }

    /// Fold a finished boss battle into the counters.
    pub fn record_boss_battle(&mut self, deltas: &StatDeltas) {
        self.stats.bosses_fought = self.stats.bosses_fought.saturating_add(1);
        self.stats.absorb(deltas);
    }

    #[must_use]
    pub const fn stats(&self) -> &ExpeditionStats {
        &self.stats
    }

    /// Total resources spent on movement so far.
    #[must_use]
    pub const fn spent(&self) -> MoveCost {
        self.spent
    }

    #[must_use]
    pub const fn moves_committed(&self) -> u32 {
        self.moves_committed
    }
}
