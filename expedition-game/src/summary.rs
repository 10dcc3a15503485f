//! End-of-run summary compiled from the ledger.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::{ExpeditionStats, Ledger, MoveCost};

/// How an expedition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ending {
    /// The team reached the goal node
    GoalReached,
    /// A boss was beaten and victory ends the run
    BossDefeated,
    /// The team lost a boss battle
    TeamDefeated,
    /// The player walked away mid-run
    Abandoned,
    /// Completion requested by the caller for any other reason
    Completed,
}

impl fmt::Display for Ending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ending::GoalReached => write!(f, "goal_reached"),
            Ending::BossDefeated => write!(f, "boss_defeated"),
            Ending::TeamDefeated => write!(f, "team_defeated"),
            Ending::Abandoned => write!(f, "abandoned"),
            Ending::Completed => write!(f, "completed"),
        }
    }
}

/// Complete summary of an expedition for the result screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpeditionSummary {
    pub island_id: String,
    pub facility_id: String,
    pub ending: Ending,
    pub final_node_id: String,
    pub steps_taken: u32,
    pub moves_committed: u32,
    pub resources_spent: MoveCost,
    pub stats: ExpeditionStats,
}

impl ExpeditionSummary {
    #[must_use]
    pub fn compile(
        island_id: &str,
        facility_id: &str,
        final_node_id: &str,
        ending: Ending,
        ledger: &Ledger,
    ) -> Self {
        Self {
            island_id: island_id.to_string(),
            facility_id: facility_id.to_string(),
            ending,
            final_node_id: final_node_id.to_string(),
            steps_taken: ledger.spent().steps,
            moves_committed: ledger.moves_committed(),
            resources_spent: ledger.spent(),
            stats: *ledger.stats(),
        }
    }

    /// One-line human readable digest.
    #[must_use]
    pub fn headline(&self) -> String {
        format!(
            "{} at {}/{}: {} steps, {} food, {} events, {} bosses, {} gold",
            self.ending,
            self.island_id,
            self.facility_id,
            self.steps_taken,
            self.resources_spent.food,
            self.stats.events_encountered,
            self.stats.bosses_fought,
            self.stats.gold_obtained
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StatDeltas;

    #[test]
    fn compile_copies_ledger_totals() {
        let mut ledger = Ledger::new(5);
        ledger.debit_move(ledger.quote(7));
        ledger.record_event();
        ledger.record_boss_battle(&StatDeltas {
            gold: 75,
            ..StatDeltas::default()
        });

        let summary = ExpeditionSummary::compile("isle", "reef", "r2c2", Ending::GoalReached, &ledger);
        assert_eq!(summary.steps_taken, 6);
        assert_eq!(summary.resources_spent.food, 2);
        assert_eq!(summary.moves_committed, 1);
        assert_eq!(summary.stats.bosses_fought, 1);
        assert_eq!(
            summary.headline(),
            "goal_reached at isle/reef: 6 steps, 2 food, 1 events, 1 bosses, 75 gold"
        );
    }
}
