use crate::config::ExpeditionCfg;
use crate::event::{Event, TeamMember};
use crate::ledger::Ledger;
use crate::map::{MapDataError, MapModel, Node};
use crate::progress::ExpeditionProgress;
use crate::summary::{Ending, ExpeditionSummary};

/// Session-scoped state of one running expedition, owned by a controller.
#[derive(Debug, Clone)]
pub struct ExpeditionSession {
    island_id: String,
    facility_id: String,
    map: MapModel,
    current_node_id: String,
    current_step: u32,
    ledger: Ledger,
    team: Vec<TeamMember>,
    pending_event: Option<Event>,
    encounter_due: bool,
    summary: Option<ExpeditionSummary>,
}

impl ExpeditionSession {
    /// Build a session from an authoritative progress snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MapDataError`] when the map is malformed or the current node
    /// is not part of it.
    pub fn from_progress(
        progress: ExpeditionProgress,
        team: Vec<TeamMember>,
        cfg: &ExpeditionCfg,
    ) -> Result<Self, MapDataError> {
        let ExpeditionProgress {
            island_id,
            facility_id,
            current_node_id,
            map_data,
            current_step,
            stats,
            ..
        } = progress;

        let map = MapModel::new(map_data)?;
        if !map.contains(&current_node_id) {
            return Err(MapDataError::UnknownCurrentNode {
                id: current_node_id,
            });
        }
        let unreachable = map.unreachable_nodes();
        if !unreachable.is_empty() {
            log::warn!(
                "map for {island_id}/{facility_id} has {} unreachable non-obstacle nodes (first `{}`)",
                unreachable.len(),
                unreachable[0].id
            );
        }

        Ok(Self {
            island_id,
            facility_id,
            map,
            current_node_id,
            current_step,
            ledger: Ledger::with_stats(cfg.steps_per_food, stats),
            team,
            pending_event: None,
            encounter_due: false,
            summary: None,
        })
    }

    /// Assemble the progress snapshot the server would hold for this session.
    #[must_use]
    pub fn snapshot(&self, is_active: bool) -> ExpeditionProgress {
        ExpeditionProgress {
            island_id: self.island_id.clone(),
            facility_id: self.facility_id.clone(),
            is_active,
            current_node_id: self.current_node_id.clone(),
            map_data: self.map.data().clone(),
            current_step: self.current_step,
            stats: *self.ledger.stats(),
        }
    }

    #[must_use]
    pub fn island_id(&self) -> &str {
        &self.island_id
    }

    #[must_use]
    pub fn facility_id(&self) -> &str {
        &self.facility_id
    }

    #[must_use]
    pub const fn map(&self) -> &MapModel {
        &self.map
    }

    #[must_use]
    pub fn current_node_id(&self) -> &str {
        &self.current_node_id
    }

    /// The node the team stands on; always present on the map.
    #[must_use]
    pub fn current_node(&self) -> Option<&Node> {
        self.map.node(&self.current_node_id)
    }

    #[must_use]
    pub const fn current_step(&self) -> u32 {
        self.current_step
    }

    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub fn team(&self) -> &[TeamMember] {
        &self.team
    }

    #[must_use]
    pub const fn pending_event(&self) -> Option<&Event> {
        self.pending_event.as_ref()
    }

    /// The last committed move ended on an event or boss node.
    #[must_use]
    pub const fn encounter_due(&self) -> bool {
        self.encounter_due
    }

    #[must_use]
    pub const fn summary(&self) -> Option<&ExpeditionSummary> {
        self.summary.as_ref()
    }

    pub(crate) fn set_current_node(&mut self, node_id: String) {
        self.current_node_id = node_id;
    }

    pub(crate) const fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub(crate) const fn set_encounter_due(&mut self, due: bool) {
        self.encounter_due = due;
    }

    pub(crate) fn begin_event(&mut self, event: Event) {
        self.current_step = self.current_step.saturating_add(1);
        self.ledger.record_event();
        self.encounter_due = false;
        self.pending_event = Some(event);
    }

    pub(crate) fn take_pending_event(&mut self) -> Option<Event> {
        self.pending_event.take()
    }

    /// Compile and store the summary for the given ending.
    pub(crate) fn finish(&mut self, ending: Ending) -> ExpeditionSummary {
        let summary = ExpeditionSummary::compile(
            &self.island_id,
            &self.facility_id,
            &self.current_node_id,
            ending,
            &self.ledger,
        );
        self.summary = Some(summary.clone());
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ExpeditionStats;
    use crate::map::map_from_rows;

    fn progress(current: &str) -> ExpeditionProgress {
        ExpeditionProgress {
            island_id: "isle".to_string(),
            facility_id: "reef".to_string(),
            is_active: true,
            current_node_id: current.to_string(),
            map_data: map_from_rows(&["S.E", "..G"]),
            current_step: 3,
            stats: ExpeditionStats {
                gold_obtained: 10,
                ..ExpeditionStats::default()
            },
        }
    }

    #[test]
    fn resumes_from_snapshot_and_roundtrips() {
        let cfg = ExpeditionCfg::default();
        let session = ExpeditionSession::from_progress(progress("r0c1"), Vec::new(), &cfg).unwrap();
        assert_eq!(session.current_node().unwrap().id, "r0c1");
        assert_eq!(session.current_step(), 3);
        assert_eq!(session.ledger().stats().gold_obtained, 10);

        let snapshot = session.snapshot(true);
        assert_eq!(snapshot, progress("r0c1"));
    }

    #[test]
    fn rejects_current_node_outside_map() {
        let cfg = ExpeditionCfg::default();
        let err = ExpeditionSession::from_progress(progress("r9c9"), Vec::new(), &cfg).unwrap_err();
        assert_eq!(
            err,
            MapDataError::UnknownCurrentNode {
                id: "r9c9".to_string()
            }
        );
    }

    #[test]
    fn begin_event_advances_step_and_counts_event() {
        let cfg = ExpeditionCfg::default();
        let mut session =
            ExpeditionSession::from_progress(progress("r0c0"), Vec::new(), &cfg).unwrap();
        session.set_encounter_due(true);
        session.begin_event(Event {
            description: "A quiet grove".to_string(),
            choices: Vec::new(),
            event_type: crate::event::EventType::Generic,
            boss_data: None,
        });
        assert_eq!(session.current_step(), 4);
        assert_eq!(session.ledger().stats().events_encountered, 1);
        assert!(!session.encounter_due());
        assert!(session.pending_event().is_some());
        assert!(session.take_pending_event().is_some());
        assert!(session.pending_event().is_none());
    }
}
