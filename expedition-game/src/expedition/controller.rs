use std::collections::HashSet;

use crate::config::ExpeditionCfg;
use crate::constants::{ENDPOINT_ADVANCE, ENDPOINT_MOVE};
use crate::error::{ExpeditionError, ValidationError};
use crate::event::{Event, MonsterCondition, TeamMember};
use crate::facility::FacilityCatalog;
use crate::map::{MapModel, NodeType};
use crate::pathfinding::{find_path, path_positions};
use crate::progress::{ExpeditionPhase, ExpeditionProgress};
use crate::services::{
    BattleContext, BattleRequest, BattleService, CommitMoveRequest, ExpeditionService,
    ServiceError, StartExpeditionRequest,
};
use crate::summary::{Ending, ExpeditionSummary};

use super::session::ExpeditionSession;
use super::{ChoiceOutcome, MoveOutcome, MovePlan};

/// Drives one expedition at a time against the server and battle ports.
///
/// Every state-changing operation is all-or-nothing: when it returns an
/// error the phase, the current node, the step counter and the ledger are
/// exactly what they were before the call.
pub struct ExpeditionController<S, B> {
    expeditions: S,
    battles: B,
    cfg: ExpeditionCfg,
    facilities: Option<FacilityCatalog>,
    phase: ExpeditionPhase,
    session: Option<ExpeditionSession>,
}

impl<S, B> ExpeditionController<S, B>
where
    S: ExpeditionService,
    B: BattleService,
{
    #[must_use]
    pub fn new(expeditions: S, battles: B, cfg: ExpeditionCfg) -> Self {
        Self {
            expeditions,
            battles,
            cfg,
            facilities: None,
            phase: ExpeditionPhase::Inactive,
            session: None,
        }
    }

    /// Check facility ids against a known catalog before contacting the server.
    #[must_use]
    pub fn with_facilities(mut self, catalog: FacilityCatalog) -> Self {
        self.facilities = Some(catalog);
        self
    }

    #[must_use]
    pub const fn phase(&self) -> ExpeditionPhase {
        self.phase
    }

    #[must_use]
    pub const fn config(&self) -> &ExpeditionCfg {
        &self.cfg
    }

    #[must_use]
    pub const fn session(&self) -> Option<&ExpeditionSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn expedition_service(&self) -> &S {
        &self.expeditions
    }

    #[must_use]
    pub const fn battle_service(&self) -> &B {
        &self.battles
    }

    /// Current progress for display or persistence by the caller.
    #[must_use]
    pub fn snapshot(&self) -> Option<ExpeditionProgress> {
        let is_active = matches!(
            self.phase,
            ExpeditionPhase::Active | ExpeditionPhase::EventPending | ExpeditionPhase::BossBattle
        );
        self.session
            .as_ref()
            .map(|session| session.snapshot(is_active))
    }

    /// Open a new expedition with the given team.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty team, an unavailable or
    /// repeated monster, or a facility missing from the catalog; no request
    /// is sent in those cases. Server rejections and malformed maps are
    /// returned as-is and leave the controller inactive.
    pub async fn start_expedition(
        &mut self,
        island_id: &str,
        facility_id: &str,
        team: Vec<TeamMember>,
    ) -> Result<ExpeditionProgress, ExpeditionError> {
        self.require_phase("start_expedition", &[ExpeditionPhase::Inactive])?;
        validate_team(&team)?;
        if let Some(catalog) = &self.facilities
            && catalog.find(island_id, facility_id).is_none()
        {
            return Err(ValidationError::UnknownFacility {
                island_id: island_id.to_string(),
                facility_id: facility_id.to_string(),
            }
            .into());
        }

        let request = StartExpeditionRequest {
            island_id: island_id.to_string(),
            facility_id: facility_id.to_string(),
            team_monster_ids: team.iter().map(|m| m.monster_id().to_string()).collect(),
        };
        log::debug!(
            "starting expedition at {island_id}/{facility_id} with {} monsters",
            team.len()
        );
        let mut progress = self
            .expeditions
            .start_expedition(&request)
            .await
            .inspect_err(|err| log::warn!("start_expedition failed: {err}"))?;

        let map = MapModel::new(progress.map_data.clone())?;
        let start_id = map.start().id.clone();
        if progress.current_node_id != start_id {
            log::warn!(
                "server opened the expedition on `{}` instead of start node `{start_id}`",
                progress.current_node_id
            );
        }
        progress.current_node_id = start_id;

        let session = ExpeditionSession::from_progress(progress, team, &self.cfg)?;
        let snapshot = session.snapshot(true);
        self.session = Some(session);
        self.transition(ExpeditionPhase::Active);
        Ok(snapshot)
    }

    /// Rebuild a session from a progress snapshot held by the server.
    ///
    /// # Errors
    ///
    /// Same team validation as [`Self::start_expedition`]; a snapshot whose
    /// map or current node is invalid yields a map-data error.
    pub fn resume_expedition(
        &mut self,
        progress: ExpeditionProgress,
        team: Vec<TeamMember>,
    ) -> Result<(), ExpeditionError> {
        self.require_phase("resume_expedition", &[ExpeditionPhase::Inactive])?;
        validate_team(&team)?;
        let session = ExpeditionSession::from_progress(progress, team, &self.cfg)?;
        log::debug!(
            "resuming expedition at {}/{} on `{}`",
            session.island_id(),
            session.facility_id(),
            session.current_node_id()
        );
        self.session = Some(session);
        self.transition(ExpeditionPhase::Active);
        Ok(())
    }

    /// Preview the shortest route from the current node to `target_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown or obstacle target and
    /// [`ExpeditionError::UnreachablePath`] when no route exists.
    pub fn plan_move(&self, target_id: &str) -> Result<MovePlan, ExpeditionError> {
        self.require_phase("plan_move", &[ExpeditionPhase::Active])?;
        let session = self.active_session("plan_move")?;
        let map = session.map();
        let Some(target) = map.node(target_id) else {
            return Err(ValidationError::UnknownNode {
                node_id: target_id.to_string(),
            }
            .into());
        };
        if !target.is_traversable() {
            return Err(ValidationError::ObstacleTarget {
                node_id: target_id.to_string(),
            }
            .into());
        }

        let path = find_path(map, session.current_node_id(), target_id);
        if path.is_empty() {
            return Err(ExpeditionError::UnreachablePath {
                from: session.current_node_id().to_string(),
                to: target_id.to_string(),
            });
        }

        let plan = MovePlan {
            path: path.iter().map(|node| node.id.clone()).collect(),
            positions: path_positions(&path),
            cost: session.ledger().quote(path.len()),
            destination_type: target.node_type,
        };
        log::debug!(
            "planned {} steps to `{target_id}` ({} food)",
            plan.cost.steps,
            plan.cost.food
        );
        Ok(plan)
    }

    /// Commit a path through the authoritative move endpoint.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the path does not start at the current
    /// node or is not a contiguous walk over traversable nodes. Service
    /// failures are returned unchanged and nothing is debited.
    pub async fn commit_move(&mut self, path: &[String]) -> Result<MoveOutcome, ExpeditionError> {
        self.require_phase("commit_move", &[ExpeditionPhase::Active])?;
        let session = self.active_session("commit_move")?;
        validate_walk(session, path)?;

        let request = CommitMoveRequest {
            path: path.to_vec(),
        };
        let progress = self
            .expeditions
            .commit_move(&request)
            .await
            .inspect_err(|err| log::warn!("commit_move failed: {err}"))?;

        let session = self.active_session("commit_move")?;
        let Some(node) = session.map().node(&progress.current_node_id) else {
            return Err(ServiceError::Malformed {
                endpoint: ENDPOINT_MOVE,
                message: format!(
                    "current node `{}` is not on the map",
                    progress.current_node_id
                ),
            }
            .into());
        };
        let node_type = node.node_type;
        // Only the walked prefix is charged when the server stops the team early.
        let walked = match path.iter().position(|id| *id == progress.current_node_id) {
            Some(idx) => idx + 1,
            None => path.len(),
        };
        if walked != path.len() || path.last() != Some(&progress.current_node_id) {
            log::warn!(
                "server placed the team on `{}` but the committed path ends on `{}`",
                progress.current_node_id,
                path.last().map_or("", String::as_str)
            );
        }
        let cost = session.ledger().quote(walked);

        let goal_ends_run = self.cfg.goal_ends_run;
        let Some(session) = self.session.as_mut() else {
            return Err(ExpeditionError::wrong_phase("commit_move", self.phase));
        };
        session.set_current_node(progress.current_node_id.clone());
        session.ledger_mut().debit_move(cost);
        let encounter_due = node_type.triggers_encounter();
        session.set_encounter_due(encounter_due);
        log::debug!(
            "moved {} steps to `{}` ({node_type})",
            cost.steps,
            progress.current_node_id
        );

        if node_type == NodeType::Goal && goal_ends_run {
            self.finish(Ending::GoalReached);
        }

        Ok(MoveOutcome {
            node_id: progress.current_node_id,
            node_type,
            cost,
            encounter_due,
            phase: self.phase,
        })
    }

    /// Fetch the next event for the session.
    ///
    /// # Errors
    ///
    /// Returns a validation error outside the active phase, and a malformed
    /// data error for a boss event that carries no boss.
    pub async fn advance(&mut self) -> Result<Event, ExpeditionError> {
        self.require_phase("advance", &[ExpeditionPhase::Active])?;
        self.active_session("advance")?;

        let event = self
            .expeditions
            .advance()
            .await
            .inspect_err(|err| log::warn!("advance failed: {err}"))?;
        if event.is_boss() && event.boss_data.is_none() {
            return Err(ServiceError::Malformed {
                endpoint: ENDPOINT_ADVANCE,
                message: "boss encounter without boss_data".to_string(),
            }
            .into());
        }

        let Some(session) = self.session.as_mut() else {
            return Err(ExpeditionError::wrong_phase("advance", self.phase));
        };
        session.begin_event(event.clone());
        log::debug!(
            "event at step {}: {} ({})",
            session.current_step(),
            event.description,
            event.event_type.as_str()
        );
        self.transition(ExpeditionPhase::EventPending);
        Ok(event)
    }

    /// Resolve a choice on the pending event.
    ///
    /// Boss encounters are fought through the battle service and folded into
    /// the ledger. Other event types are acknowledged without effect.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no event is pending or the choice is
    /// not offered. A battle-service failure leaves the event pending.
    pub async fn resolve_choice(&mut self, choice_id: &str) -> Result<ChoiceOutcome, ExpeditionError> {
        self.require_phase("resolve_choice", &[ExpeditionPhase::EventPending])?;
        let session = self.active_session("resolve_choice")?;
        let Some(event) = session.pending_event() else {
            return Err(ValidationError::NoPendingEvent.into());
        };
        if event.choice(choice_id).is_none() {
            return Err(ValidationError::UnknownChoice {
                choice_id: choice_id.to_string(),
            }
            .into());
        }

        if !event.is_boss() {
            let event_type = event.event_type;
            if let Some(session) = self.session.as_mut() {
                session.take_pending_event();
            }
            log::info!(
                "choice `{choice_id}` on a {} event has no resolution yet",
                event_type.as_str()
            );
            self.transition(ExpeditionPhase::Active);
            return Ok(ChoiceOutcome::Unresolved {
                event_type,
                choice_id: choice_id.to_string(),
            });
        }

        let Some(boss) = event.boss_data.clone() else {
            return Err(ServiceError::Malformed {
                endpoint: ENDPOINT_ADVANCE,
                message: "boss encounter without boss_data".to_string(),
            }
            .into());
        };
        let request = BattleRequest {
            player_monster_data: session
                .team()
                .iter()
                .map(|member| member.snapshot.clone())
                .collect(),
            opponent_monster_data: boss,
            context: BattleContext {
                island_id: session.island_id().to_string(),
                facility_id: session.facility_id().to_string(),
                node_id: session.current_node_id().to_string(),
                step: session.current_step(),
            },
        };

        self.transition(ExpeditionPhase::BossBattle);
        let battle = {
            // Dropping this future mid-battle leaves the event pending.
            let mut guard = BattleInFlight {
                phase: &mut self.phase,
                settled: false,
            };
            let battle = self.battles.simulate_battle(&request).await;
            guard.settled = battle.is_ok();
            battle
        };
        let result = match battle {
            Ok(result) => result,
            Err(err) => {
                log::warn!(
                    "battle against `{}` failed: {err}",
                    request.opponent_monster_data.monster_id
                );
                return Err(err.into());
            }
        };

        let Some(session) = self.session.as_mut() else {
            return Err(ExpeditionError::wrong_phase("resolve_choice", self.phase));
        };
        session.take_pending_event();
        session.ledger_mut().record_boss_battle(&result.deltas);
        log::info!(
            "boss `{}` battle ended after {} turns, winner {:?}",
            request.opponent_monster_data.monster_id,
            result.turns,
            result.winner
        );

        if result.player_won() {
            if self.cfg.boss_victory_ends_run {
                self.finish(Ending::BossDefeated);
            } else {
                self.transition(ExpeditionPhase::Active);
            }
        } else if self.cfg.boss_loss_ends_run {
            self.finish(Ending::TeamDefeated);
        } else {
            self.transition(ExpeditionPhase::Active);
        }

        Ok(ChoiceOutcome::BattleFought {
            result,
            phase: self.phase,
        })
    }

    /// Compile the summary and mark the expedition complete.
    ///
    /// Calling it again after completion returns the same summary.
    ///
    /// # Errors
    ///
    /// Returns a validation error while an event or battle is pending or when
    /// no expedition is running.
    pub fn complete_expedition(&mut self) -> Result<ExpeditionSummary, ExpeditionError> {
        self.require_phase(
            "complete_expedition",
            &[ExpeditionPhase::Active, ExpeditionPhase::Completed],
        )?;
        if self.phase == ExpeditionPhase::Completed
            && let Some(summary) = self.session.as_ref().and_then(ExpeditionSession::summary)
        {
            return Ok(summary.clone());
        }
        self.finish(Ending::Completed)
            .ok_or_else(|| ExpeditionError::wrong_phase("complete_expedition", self.phase))
    }

    /// Hand over the summary of a completed expedition and reset.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the expedition is completed.
    pub fn acknowledge_completion(&mut self) -> Result<ExpeditionSummary, ExpeditionError> {
        self.require_phase("acknowledge_completion", &[ExpeditionPhase::Completed])?;
        let summary = self
            .session
            .take()
            .and_then(|session| session.summary().cloned())
            .ok_or_else(|| ExpeditionError::wrong_phase("acknowledge_completion", self.phase))?;
        self.transition(ExpeditionPhase::Inactive);
        Ok(summary)
    }

    /// Walk away from the running expedition and discard the session.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no expedition is running.
    pub fn abandon_expedition(&mut self) -> Result<ExpeditionSummary, ExpeditionError> {
        if !self.phase.has_session() {
            return Err(ExpeditionError::wrong_phase("abandon_expedition", self.phase));
        }
        let Some(mut session) = self.session.take() else {
            return Err(ExpeditionError::wrong_phase("abandon_expedition", self.phase));
        };
        let summary = session.finish(Ending::Abandoned);
        log::info!("{}", summary.headline());
        self.transition(ExpeditionPhase::Inactive);
        Ok(summary)
    }

    fn require_phase(
        &self,
        operation: &'static str,
        allowed: &[ExpeditionPhase],
    ) -> Result<(), ExpeditionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ExpeditionError::wrong_phase(operation, self.phase))
        }
    }

    fn active_session(&self, operation: &'static str) -> Result<&ExpeditionSession, ExpeditionError> {
        self.session
            .as_ref()
            .ok_or_else(|| ExpeditionError::wrong_phase(operation, self.phase))
    }

    fn transition(&mut self, next: ExpeditionPhase) {
        if self.phase != next {
            log::info!("expedition {} -> {next}", self.phase);
            self.phase = next;
        }
    }

    fn finish(&mut self, ending: Ending) -> Option<ExpeditionSummary> {
        let summary = self.session.as_mut()?.finish(ending);
        log::info!("{}", summary.headline());
        self.transition(ExpeditionPhase::Completed);
        Some(summary)
    }
}

/// Puts a boss battle back to `EventPending` unless it produced a result.
struct BattleInFlight<'a> {
    phase: &'a mut ExpeditionPhase,
    settled: bool,
}

impl Drop for BattleInFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::info!("expedition {} -> {}", self.phase, ExpeditionPhase::EventPending);
            *self.phase = ExpeditionPhase::EventPending;
        }
    }
}

fn validate_team(team: &[TeamMember]) -> Result<(), ValidationError> {
    if team.is_empty() {
        return Err(ValidationError::EmptyTeam);
    }
    let mut seen = HashSet::with_capacity(team.len());
    for member in team {
        let monster_id = member.monster_id().to_string();
        match member.condition {
            MonsterCondition::Busy => return Err(ValidationError::MonsterBusy { monster_id }),
            MonsterCondition::CriticallyInjured => {
                return Err(ValidationError::MonsterInjured { monster_id });
            }
            MonsterCondition::Ready => {}
        }
        if !seen.insert(member.monster_id()) {
            return Err(ValidationError::DuplicateMonster { monster_id });
        }
    }
    Ok(())
}

fn validate_walk(session: &ExpeditionSession, path: &[String]) -> Result<(), ExpeditionError> {
    let Some(first) = path.first() else {
        return Err(ExpeditionError::invalid_path("path is empty"));
    };
    if first != session.current_node_id() {
        return Err(ExpeditionError::invalid_path(format!(
            "path starts at `{first}` but the team is on `{}`",
            session.current_node_id()
        )));
    }
    if path.len() == 1 {
        return Err(ExpeditionError::invalid_path("path does not leave the current node"));
    }

    let map = session.map();
    let mut previous = None;
    for node_id in path {
        let Some(node) = map.node(node_id) else {
            return Err(ValidationError::UnknownNode {
                node_id: node_id.clone(),
            }
            .into());
        };
        if !node.is_traversable() {
            return Err(ValidationError::ObstacleTarget {
                node_id: node_id.clone(),
            }
            .into());
        }
        if let Some(prev) = previous
            && !node.position.is_adjacent(prev)
        {
            return Err(ExpeditionError::invalid_path(format!(
                "`{node_id}` at {} is not adjacent to {prev}",
                node.position
            )));
        }
        previous = Some(node.position);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ENDPOINT_BATTLE;
    use crate::event::{EventChoice, EventType, MonsterSnapshot};
    use crate::facility::Facility;
    use crate::map::map_from_rows;
    use crate::services::{BattleResult, BattleWinner};
    use crate::ledger::StatDeltas;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ScriptedServer {
        rows: Vec<&'static str>,
        events: Mutex<VecDeque<Result<Event, ServiceError>>>,
        move_override: Mutex<Option<Result<String, ServiceError>>>,
        starts: Mutex<Vec<StartExpeditionRequest>>,
        moves: Mutex<Vec<CommitMoveRequest>>,
    }

    impl ScriptedServer {
        fn new(rows: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                rows: rows.to_vec(),
                ..Self::default()
            })
        }

        fn push_event(&self, event: Result<Event, ServiceError>) {
            self.events.lock().unwrap().push_back(event);
        }

        fn progress(&self, current: &str) -> ExpeditionProgress {
            ExpeditionProgress {
                island_id: "isle".to_string(),
                facility_id: "reef".to_string(),
                is_active: true,
                current_node_id: current.to_string(),
                map_data: map_from_rows(&self.rows),
                current_step: 0,
                stats: Default::default(),
            }
        }
    }

    #[async_trait]
    impl ExpeditionService for ScriptedServer {
        async fn start_expedition(
            &self,
            request: &StartExpeditionRequest,
        ) -> Result<ExpeditionProgress, ServiceError> {
            self.starts.lock().unwrap().push(request.clone());
            Ok(self.progress("r0c0"))
        }

        async fn commit_move(
            &self,
            request: &CommitMoveRequest,
        ) -> Result<ExpeditionProgress, ServiceError> {
            self.moves.lock().unwrap().push(request.clone());
            match self.move_override.lock().unwrap().take() {
                Some(Ok(node)) => Ok(self.progress(&node)),
                Some(Err(err)) => Err(err),
                None => Ok(self.progress(request.path.last().unwrap())),
            }
        }

        async fn advance(&self) -> Result<Event, ServiceError> {
            self.events
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(generic_event()))
        }
    }

    struct FixedBattle {
        outcome: Mutex<VecDeque<Result<BattleResult, ServiceError>>>,
        requests: Mutex<Vec<BattleRequest>>,
    }

    impl FixedBattle {
        fn new(outcomes: Vec<Result<BattleResult, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl BattleService for FixedBattle {
        async fn simulate_battle(&self, request: &BattleRequest) -> Result<BattleResult, ServiceError> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcome
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(battle(BattleWinner::Player)))
        }
    }

    fn battle(winner: BattleWinner) -> BattleResult {
        BattleResult {
            winner,
            turns: 4,
            deltas: StatDeltas {
                gold: 40,
                hp_consumed: 12,
                ..StatDeltas::default()
            },
            log: Vec::new(),
        }
    }

    fn generic_event() -> Event {
        Event {
            description: "A merchant waves".to_string(),
            choices: vec![EventChoice::new("trade", "Trade"), EventChoice::new("leave", "Leave")],
            event_type: EventType::Generic,
            boss_data: None,
        }
    }

    fn boss_event() -> Event {
        Event {
            description: "The reef guardian rises".to_string(),
            choices: vec![EventChoice::new("fight", "Fight")],
            event_type: EventType::BossEncounter,
            boss_data: Some(MonsterSnapshot::new("guardian", "Reef Guardian", 12)),
        }
    }

    fn team() -> Vec<TeamMember> {
        vec![
            TeamMember::ready(MonsterSnapshot::new("m1", "Ember", 5)),
            TeamMember::ready(MonsterSnapshot::new("m2", "Tide", 6)),
        ]
    }

    fn ids(path: &[&str]) -> Vec<String> {
        path.iter().map(ToString::to_string).collect()
    }

    type Controller = ExpeditionController<Arc<ScriptedServer>, Arc<FixedBattle>>;

    async fn started(rows: &[&'static str], cfg: ExpeditionCfg) -> (Controller, Arc<ScriptedServer>, Arc<FixedBattle>) {
        let server = ScriptedServer::new(rows);
        let battles = FixedBattle::new(Vec::new());
        let mut controller = ExpeditionController::new(Arc::clone(&server), Arc::clone(&battles), cfg);
        controller.start_expedition("isle", "reef", team()).await.unwrap();
        (controller, server, battles)
    }

    #[tokio::test]
    async fn empty_team_is_rejected_without_a_request() {
        let server = ScriptedServer::new(&["S.G"]);
        let mut controller =
            ExpeditionController::new(Arc::clone(&server), FixedBattle::new(Vec::new()), ExpeditionCfg::default());

        let err = controller.start_expedition("isle", "reef", Vec::new()).await.unwrap_err();
        assert_eq!(err, ExpeditionError::Validation(ValidationError::EmptyTeam));
        assert!(server.starts.lock().unwrap().is_empty());
        assert_eq!(controller.phase(), ExpeditionPhase::Inactive);
        assert!(controller.snapshot().is_none());
    }

    #[tokio::test]
    async fn unavailable_monsters_and_unknown_facilities_are_rejected() {
        let server = ScriptedServer::new(&["S.G"]);
        let catalog = FacilityCatalog::from_facilities(vec![Facility {
            facility_id: "reef".to_string(),
            island_id: "isle".to_string(),
            name: "Coral Reef".to_string(),
            description: String::new(),
            cost: 100,
            level_range: [1, 20],
        }]);
        let mut controller = ExpeditionController::new(
            Arc::clone(&server),
            FixedBattle::new(Vec::new()),
            ExpeditionCfg::default(),
        )
        .with_facilities(catalog);

        let mut busy = team();
        busy[1].condition = MonsterCondition::Busy;
        let err = controller.start_expedition("isle", "reef", busy).await.unwrap_err();
        assert_eq!(
            err,
            ValidationError::MonsterBusy {
                monster_id: "m2".to_string()
            }
            .into()
        );

        let mut twice = team();
        twice.push(twice[0].clone());
        let err = controller.start_expedition("isle", "reef", twice).await.unwrap_err();
        assert!(matches!(
            err,
            ExpeditionError::Validation(ValidationError::DuplicateMonster { .. })
        ));

        let err = controller.start_expedition("isle", "volcano", team()).await.unwrap_err();
        assert!(matches!(
            err,
            ExpeditionError::Validation(ValidationError::UnknownFacility { .. })
        ));
        assert!(server.starts.lock().unwrap().is_empty());

        controller.start_expedition("isle", "reef", team()).await.unwrap();
        assert_eq!(controller.phase(), ExpeditionPhase::Active);
        assert_eq!(
            server.starts.lock().unwrap()[0].team_monster_ids,
            vec!["m1".to_string(), "m2".to_string()]
        );
    }

    #[tokio::test]
    async fn advance_while_inactive_changes_nothing() {
        let server = ScriptedServer::new(&["S.G"]);
        let mut controller =
            ExpeditionController::new(server, FixedBattle::new(Vec::new()), ExpeditionCfg::default());
        let err = controller.advance().await.unwrap_err();
        assert_eq!(
            err,
            ExpeditionError::wrong_phase("advance", ExpeditionPhase::Inactive)
        );
        assert_eq!(controller.phase(), ExpeditionPhase::Inactive);
    }

    #[tokio::test]
    async fn planning_is_free_and_repeatable() {
        let (controller, server, _) = started(&["S..", ".#.", "..G"], ExpeditionCfg::default()).await;
        let before = controller.snapshot().unwrap();

        let first = controller.plan_move("r2c2").unwrap();
        let second = controller.plan_move("r2c2").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.path, ids(&["r0c0", "r0c1", "r0c2", "r1c2", "r2c2"]));
        assert_eq!(first.cost.steps, 4);
        assert_eq!(first.cost.food, 1);
        assert_eq!(first.destination_type, NodeType::Goal);

        assert_eq!(controller.snapshot().unwrap(), before);
        assert!(server.moves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn planning_rejects_bad_targets() {
        let (controller, _, _) = started(&["S#.", "##.", "..G"], ExpeditionCfg::default()).await;
        assert!(matches!(
            controller.plan_move("r0c1"),
            Err(ExpeditionError::Validation(ValidationError::ObstacleTarget { .. }))
        ));
        assert!(matches!(
            controller.plan_move("r7c7"),
            Err(ExpeditionError::Validation(ValidationError::UnknownNode { .. }))
        ));
        assert_eq!(
            controller.plan_move("r2c2"),
            Err(ExpeditionError::UnreachablePath {
                from: "r0c0".to_string(),
                to: "r2c2".to_string()
            })
        );
        let stay = controller.plan_move("r0c0").unwrap();
        assert!(stay.is_stationary());
        assert_eq!(stay.path, ids(&["r0c0"]));
    }

    #[tokio::test]
    async fn commit_debits_ledger_and_flags_encounters() {
        let (mut controller, server, _) =
            started(&["S.....E", "......G"], ExpeditionCfg::default()).await;
        let plan = controller.plan_move("r0c6").unwrap();
        let outcome = controller.commit_move(&plan.path).await.unwrap();

        assert_eq!(outcome.node_id, "r0c6");
        assert_eq!(outcome.cost.steps, 6);
        assert_eq!(outcome.cost.food, 2);
        assert!(outcome.encounter_due);
        assert_eq!(outcome.phase, ExpeditionPhase::Active);
        assert_eq!(server.moves.lock().unwrap()[0].path, plan.path);

        let session = controller.session().unwrap();
        assert_eq!(session.current_node_id(), "r0c6");
        assert!(session.encounter_due());
        assert_eq!(session.ledger().spent().exploration_points, 6);
        assert_eq!(session.ledger().moves_committed(), 1);
    }

    #[tokio::test]
    async fn malformed_paths_are_rejected_before_sending() {
        let (mut controller, server, _) = started(&["S.#", "..G"], ExpeditionCfg::default()).await;
        for path in [
            ids(&[]),
            ids(&["r0c1", "r1c1"]),
            ids(&["r0c0"]),
            ids(&["r0c0", "r1c1"]),
            ids(&["r0c0", "r0c1", "r0c2"]),
            ids(&["r0c0", "r9c9"]),
        ] {
            let err = controller.commit_move(&path).await.unwrap_err();
            assert!(matches!(err, ExpeditionError::Validation(_)), "{path:?}: {err}");
        }
        assert!(server.moves.lock().unwrap().is_empty());
        assert_eq!(controller.session().unwrap().ledger().moves_committed(), 0);
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_untouched() {
        let (mut controller, server, _) = started(&["S..", "..G"], ExpeditionCfg::default()).await;
        *server.move_override.lock().unwrap() = Some(Err(ServiceError::Unimplemented {
            endpoint: ENDPOINT_MOVE,
        }));
        let before = controller.snapshot().unwrap();

        let err = controller.commit_move(&ids(&["r0c0", "r0c1"])).await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::Unimplemented {
                endpoint: ENDPOINT_MOVE
            }
            .into()
        );
        assert_eq!(controller.snapshot().unwrap(), before);
        assert_eq!(controller.phase(), ExpeditionPhase::Active);
    }

    #[tokio::test]
    async fn server_position_wins_over_client_path() {
        let (mut controller, server, _) = started(&["S..", "..G"], ExpeditionCfg::default()).await;
        *server.move_override.lock().unwrap() = Some(Ok("r0c1".to_string()));
        let outcome = controller.commit_move(&ids(&["r0c0", "r0c1", "r0c2"])).await.unwrap();
        assert_eq!(outcome.node_id, "r0c1");
        assert_eq!(outcome.cost.steps, 1);
        assert_eq!(controller.session().unwrap().current_node_id(), "r0c1");
        assert_eq!(controller.session().unwrap().ledger().spent().steps, 1);
        assert_eq!(controller.session().unwrap().ledger().spent().food, 1);

        *server.move_override.lock().unwrap() = Some(Ok("nowhere".to_string()));
        let err = controller.commit_move(&ids(&["r0c1", "r0c2"])).await.unwrap_err();
        assert!(matches!(err, ExpeditionError::Service(ServiceError::Malformed { .. })));
        assert_eq!(controller.session().unwrap().current_node_id(), "r0c1");
    }

    #[tokio::test]
    async fn reaching_the_goal_completes_the_run() {
        let (mut controller, _, _) = started(&["S.G"], ExpeditionCfg::default()).await;
        let plan = controller.plan_move("r0c2").unwrap();
        let outcome = controller.commit_move(&plan.path).await.unwrap();
        assert_eq!(outcome.phase, ExpeditionPhase::Completed);

        let summary = controller.complete_expedition().unwrap();
        assert_eq!(summary.ending, Ending::GoalReached);
        assert_eq!(summary.steps_taken, 2);

        let handed = controller.acknowledge_completion().unwrap();
        assert_eq!(handed, summary);
        assert_eq!(controller.phase(), ExpeditionPhase::Inactive);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn goal_can_be_walked_over_when_configured() {
        let cfg = ExpeditionCfg {
            goal_ends_run: false,
            ..ExpeditionCfg::default()
        };
        let (mut controller, _, _) = started(&["S.G"], cfg).await;
        let outcome = controller.commit_move(&ids(&["r0c0", "r0c1", "r0c2"])).await.unwrap();
        assert_eq!(outcome.phase, ExpeditionPhase::Active);
    }

    #[tokio::test]
    async fn advance_opens_an_event_and_generic_choices_stay_unresolved() {
        let (mut controller, _, battles) = started(&["S.E", "..G"], ExpeditionCfg::default()).await;
        let event = controller.advance().await.unwrap();
        assert_eq!(event.event_type, EventType::Generic);
        assert_eq!(controller.phase(), ExpeditionPhase::EventPending);
        assert_eq!(controller.session().unwrap().current_step(), 1);
        assert_eq!(
            controller.session().unwrap().ledger().stats().events_encountered,
            1
        );

        assert!(matches!(
            controller.commit_move(&ids(&["r0c0", "r0c1"])).await,
            Err(ExpeditionError::Validation(ValidationError::WrongPhase { .. }))
        ));
        assert!(matches!(
            controller.resolve_choice("dance").await,
            Err(ExpeditionError::Validation(ValidationError::UnknownChoice { .. }))
        ));

        let outcome = controller.resolve_choice("trade").await.unwrap();
        assert_eq!(
            outcome,
            ChoiceOutcome::Unresolved {
                event_type: EventType::Generic,
                choice_id: "trade".to_string()
            }
        );
        assert_eq!(controller.phase(), ExpeditionPhase::Active);
        assert!(controller.session().unwrap().pending_event().is_none());
        assert!(battles.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn boss_event_without_boss_is_malformed() {
        let (mut controller, server, _) = started(&["S.B"], ExpeditionCfg::default()).await;
        server.push_event(Ok(Event {
            boss_data: None,
            ..boss_event()
        }));
        let err = controller.advance().await.unwrap_err();
        assert!(matches!(err, ExpeditionError::Service(ServiceError::Malformed { .. })));
        assert_eq!(controller.phase(), ExpeditionPhase::Active);
        assert_eq!(controller.session().unwrap().current_step(), 0);
    }

    #[tokio::test]
    async fn boss_victory_returns_to_active_and_folds_stats() {
        let (mut controller, server, battles) = started(&["S.B"], ExpeditionCfg::default()).await;
        controller.commit_move(&ids(&["r0c0", "r0c1", "r0c2"])).await.unwrap();
        server.push_event(Ok(boss_event()));
        controller.advance().await.unwrap();

        let outcome = controller.resolve_choice("fight").await.unwrap();
        assert!(outcome.battle().unwrap().player_won());
        assert_eq!(controller.phase(), ExpeditionPhase::Active);

        let stats = *controller.session().unwrap().ledger().stats();
        assert_eq!(stats.bosses_fought, 1);
        assert_eq!(stats.gold_obtained, 40);
        assert_eq!(stats.hp_consumed, 12);

        let requests = battles.requests.lock().unwrap();
        assert_eq!(requests[0].player_monster_data.len(), 2);
        assert_eq!(requests[0].opponent_monster_data.monster_id, "guardian");
        assert_eq!(requests[0].context.node_id, "r0c2");
        assert_eq!(requests[0].context.step, 1);
    }

    #[tokio::test]
    async fn boss_defeat_completes_the_run() {
        let server = ScriptedServer::new(&["S.B"]);
        let battles = FixedBattle::new(vec![Ok(battle(BattleWinner::Opponent))]);
        let mut controller =
            ExpeditionController::new(Arc::clone(&server), battles, ExpeditionCfg::default());
        controller.start_expedition("isle", "reef", team()).await.unwrap();
        server.push_event(Ok(boss_event()));
        controller.advance().await.unwrap();

        let outcome = controller.resolve_choice("fight").await.unwrap();
        assert!(matches!(
            outcome,
            ChoiceOutcome::BattleFought {
                phase: ExpeditionPhase::Completed,
                ..
            }
        ));
        let summary = controller.acknowledge_completion().unwrap();
        assert_eq!(summary.ending, Ending::TeamDefeated);
        assert_eq!(summary.stats.bosses_fought, 1);
    }

    #[tokio::test]
    async fn battle_failure_keeps_the_event_pending() {
        let server = ScriptedServer::new(&["S.B"]);
        let battles = FixedBattle::new(vec![Err(ServiceError::Transport {
            endpoint: ENDPOINT_BATTLE,
            message: "connection reset".to_string(),
        })]);
        let mut controller =
            ExpeditionController::new(Arc::clone(&server), battles, ExpeditionCfg::default());
        controller.start_expedition("isle", "reef", team()).await.unwrap();
        server.push_event(Ok(boss_event()));
        controller.advance().await.unwrap();

        assert!(controller.resolve_choice("fight").await.is_err());
        assert_eq!(controller.phase(), ExpeditionPhase::EventPending);
        assert!(controller.session().unwrap().pending_event().is_some());
        assert_eq!(controller.session().unwrap().ledger().stats().bosses_fought, 0);

        controller.resolve_choice("fight").await.unwrap();
        assert_eq!(controller.session().unwrap().ledger().stats().bosses_fought, 1);
    }

    struct StalledBattle;

    #[async_trait]
    impl BattleService for StalledBattle {
        async fn simulate_battle(&self, _: &BattleRequest) -> Result<BattleResult, ServiceError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn abandoned_battle_future_leaves_the_event_pending() {
        let server = ScriptedServer::new(&["S.B"]);
        let mut controller =
            ExpeditionController::new(Arc::clone(&server), StalledBattle, ExpeditionCfg::default());
        controller.start_expedition("isle", "reef", team()).await.unwrap();
        server.push_event(Ok(boss_event()));
        controller.advance().await.unwrap();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            controller.resolve_choice("fight"),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(controller.phase(), ExpeditionPhase::EventPending);
        assert!(controller.session().unwrap().pending_event().is_some());
        assert_eq!(controller.session().unwrap().ledger().stats().bosses_fought, 0);
        assert!(controller.abandon_expedition().is_ok());
    }

    #[tokio::test]
    async fn completion_requires_a_settled_phase() {
        let (mut controller, _, _) = started(&["S.E"], ExpeditionCfg::default()).await;
        controller.advance().await.unwrap();
        assert!(controller.complete_expedition().is_err());
        controller.resolve_choice("leave").await.unwrap();

        let summary = controller.complete_expedition().unwrap();
        assert_eq!(summary.ending, Ending::Completed);
        assert_eq!(controller.complete_expedition().unwrap(), summary);
        assert!(controller.plan_move("r0c1").is_err());
    }

    #[tokio::test]
    async fn abandon_discards_the_session() {
        let (mut controller, _, _) = started(&["S..G"], ExpeditionCfg::default()).await;
        controller.commit_move(&ids(&["r0c0", "r0c1"])).await.unwrap();
        controller.advance().await.unwrap();

        let summary = controller.abandon_expedition().unwrap();
        assert_eq!(summary.ending, Ending::Abandoned);
        assert_eq!(summary.final_node_id, "r0c1");
        assert_eq!(controller.phase(), ExpeditionPhase::Inactive);
        assert!(controller.abandon_expedition().is_err());
    }

    #[tokio::test]
    async fn resume_restores_position_and_stats() {
        let server = ScriptedServer::new(&["S..", "..G"]);
        let mut progress = server.progress("r1c1");
        progress.current_step = 5;
        progress.stats.bosses_fought = 2;
        let mut controller =
            ExpeditionController::new(server, FixedBattle::new(Vec::new()), ExpeditionCfg::default());

        controller.resume_expedition(progress.clone(), team()).unwrap();
        assert_eq!(controller.phase(), ExpeditionPhase::Active);
        assert_eq!(controller.snapshot().unwrap(), progress);
        assert_eq!(controller.plan_move("r1c2").unwrap().cost.steps, 1);

        assert!(matches!(
            controller.resume_expedition(progress, team()),
            Err(ExpeditionError::Validation(ValidationError::WrongPhase { .. }))
        ));
    }

    #[tokio::test]
    async fn resume_with_foreign_current_node_is_fatal() {
        let server = ScriptedServer::new(&["S.G"]);
        let progress = server.progress("r5c5");
        let mut controller =
            ExpeditionController::new(server, FixedBattle::new(Vec::new()), ExpeditionCfg::default());
        let err = controller.resume_expedition(progress, team()).unwrap_err();
        assert!(!err.is_recoverable());
        assert_eq!(controller.phase(), ExpeditionPhase::Inactive);
    }
}
