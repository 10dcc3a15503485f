//! Drives one whole expedition through the controller with a policy.
use std::sync::Arc;

use anyhow::Result;
use expedition_game::{
    BattleService, ChoiceOutcome, ExpeditionCfg, ExpeditionController, ExpeditionError,
    ExpeditionPhase, ExpeditionService, ExpeditionSummary, MonsterSnapshot, ServiceError,
    TeamMember, find_path, step_count,
};

use super::policy::ExplorerStrategy;
use super::sim_server::{FaultPlan, MapSpec, SIM_FACILITY, SIM_ISLAND};

/// Attempts per operation when the service reports a transport failure.
const TRANSPORT_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug)]
pub struct ExpeditionPlan {
    pub strategy: ExplorerStrategy,
    pub island_id: String,
    pub facility_id: String,
    pub team: Vec<TeamMember>,
    pub map: MapSpec,
    pub faults: FaultPlan,
    pub cfg: ExpeditionCfg,
    pub max_moves: u32,
    /// Needs the in-process server (fault injection or request counting).
    pub simulated_only: bool,
    pub expectations: Vec<RunExpectation>,
}

impl ExpeditionPlan {
    #[must_use]
    pub fn new(strategy: ExplorerStrategy) -> Self {
        Self {
            strategy,
            island_id: SIM_ISLAND.to_string(),
            facility_id: SIM_FACILITY.to_string(),
            team: default_team(),
            map: MapSpec::default(),
            faults: FaultPlan::default(),
            cfg: ExpeditionCfg::default(),
            max_moves: 40,
            simulated_only: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_map(mut self, map: MapSpec) -> Self {
        self.map = map;
        self
    }

    /// Fault injection only exists in simulated mode.
    #[must_use]
    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self.simulated_only = true;
        self
    }

    #[must_use]
    pub fn with_cfg(mut self, cfg: ExpeditionCfg) -> Self {
        self.cfg = cfg;
        self
    }

    #[must_use]
    pub fn with_team(mut self, team: Vec<TeamMember>) -> Self {
        self.team = team;
        self
    }

    #[must_use]
    pub fn simulated_only(mut self) -> Self {
        self.simulated_only = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<RunExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

#[must_use]
pub fn default_team() -> Vec<TeamMember> {
    [("mon-ember", "Ember", 14), ("mon-tide", "Tide", 12), ("mon-gale", "Gale", 11)]
        .into_iter()
        .map(|(id, name, level)| TeamMember::ready(MonsterSnapshot::new(id, name, level)))
        .collect()
}

/// Assertion hook run after an expedition completes.
type RunExpectationFn = Arc<dyn Fn(&RunSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct RunExpectation(RunExpectationFn);

impl std::fmt::Debug for RunExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunExpectation").finish()
    }
}

impl RunExpectation {
    pub fn evaluate(&self, summary: &RunSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for RunExpectation
where
    F: Fn(&RunSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Everything observed while driving one expedition.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub seed: u64,
    pub strategy: Option<ExplorerStrategy>,
    pub start_error: Option<ExpeditionError>,
    /// Errors the run recovered from or gave up on.
    pub errors: Vec<ExpeditionError>,
    pub moves: u32,
    pub events: u32,
    pub battles: u32,
    pub battles_won: u32,
    /// Shortest start-to-goal distance on the generated map.
    pub goal_distance: Option<u32>,
    pub final_phase: ExpeditionPhase,
    pub summary: Option<ExpeditionSummary>,
    /// Requests received by the simulated server, when there is one.
    pub requests_sent: Option<u32>,
    pub transcript: Vec<String>,
}

impl RunSummary {
    #[must_use]
    pub fn transport_errors(&self) -> usize {
        self.errors
            .iter()
            .filter(|err| is_transport(err))
            .count()
    }

    #[must_use]
    pub fn ending_label(&self) -> String {
        self.summary
            .as_ref()
            .map_or_else(|| "none".to_string(), |summary| summary.ending.to_string())
    }
}

fn is_transport(err: &ExpeditionError) -> bool {
    matches!(err, ExpeditionError::Service(ServiceError::Transport { .. }))
}

/// Run `plan` to the end with the given services.
pub async fn run_expedition<S, B>(services: S, battles: B, plan: &ExpeditionPlan, seed: u64) -> RunSummary
where
    S: ExpeditionService,
    B: BattleService,
{
    let mut controller = ExpeditionController::new(services, battles, plan.cfg.clone());
    let mut policy = plan.strategy.create_policy(seed);
    let mut run = RunSummary {
        seed,
        strategy: Some(plan.strategy),
        ..RunSummary::default()
    };

    let mut started = None;
    for _ in 0..TRANSPORT_ATTEMPTS {
        match controller
            .start_expedition(&plan.island_id, &plan.facility_id, plan.team.clone())
            .await
        {
            Ok(progress) => {
                started = Some(progress);
                break;
            }
            Err(err) if is_transport(&err) => run.errors.push(err),
            Err(err) => {
                run.start_error = Some(err);
                break;
            }
        }
    }
    let Some(progress) = started else {
        if run.start_error.is_none() {
            run.start_error = run.errors.last().cloned();
        }
        run.final_phase = controller.phase();
        return run;
    };
    run.transcript.push(format!(
        "start {} ({} nodes) with {}",
        progress.current_node_id,
        progress.map_data.nodes.len(),
        policy.name()
    ));
    if let Some(session) = controller.session()
        && let Some(goal) = session
            .map()
            .nodes()
            .iter()
            .find(|node| node.node_type == expedition_game::NodeType::Goal)
    {
        let path = find_path(session.map(), session.current_node_id(), &goal.id);
        run.goal_distance = (!path.is_empty()).then(|| step_count(&path));
    }

    let mut stalled = 0;
    // Transport failures leave the phase untouched, so the same step is retried.
    while run.moves < plan.max_moves && stalled < TRANSPORT_ATTEMPTS {
        let Some(session) = controller.session() else {
            break;
        };
        let step = match controller.phase() {
            ExpeditionPhase::Active if session.encounter_due() => {
                controller.advance().await.map(|event| {
                    run.events += 1;
                    run.transcript.push(format!("event: {}", event.description));
                })
            }
            ExpeditionPhase::Active => {
                let Some(target) = policy.pick_target(session) else {
                    break;
                };
                match controller.plan_move(&target) {
                    Ok(route) => controller.commit_move(&route.path).await.map(|outcome| {
                        run.moves += 1;
                        run.transcript.push(format!(
                            "move {} steps to {} ({})",
                            outcome.cost.steps, outcome.node_id, outcome.node_type
                        ));
                    }),
                    Err(err) => Err(err),
                }
            }
            ExpeditionPhase::EventPending => {
                let choice = session
                    .pending_event()
                    .and_then(|event| policy.pick_choice(event))
                    .unwrap_or_default();
                controller.resolve_choice(&choice).await.map(|outcome| {
                    if let ChoiceOutcome::BattleFought { result, .. } = outcome {
                        run.battles += 1;
                        run.battles_won += u32::from(result.player_won());
                        run.transcript
                            .push(format!("battle: {:?} in {} turns", result.winner, result.turns));
                    }
                })
            }
            _ => break,
        };

        match step {
            Ok(()) => stalled = 0,
            Err(err) if is_transport(&err) => {
                stalled += 1;
                run.errors.push(err);
            }
            Err(err) => {
                log::debug!("seed {seed}: giving up after {err}");
                run.transcript.push(format!("stopped: {err}"));
                run.errors.push(err);
                break;
            }
        }
    }

    run.summary = match controller.phase() {
        ExpeditionPhase::Active | ExpeditionPhase::Completed => {
            controller.complete_expedition().ok()
        }
        ExpeditionPhase::EventPending | ExpeditionPhase::BossBattle => {
            controller.abandon_expedition().ok()
        }
        ExpeditionPhase::Inactive => None,
    };
    if controller.phase() == ExpeditionPhase::Completed {
        match controller.acknowledge_completion() {
            Ok(handed) if run.summary.as_ref() == Some(&handed) => {}
            Ok(handed) => {
                log::warn!("seed {seed}: acknowledged summary differs: {}", handed.headline());
                run.transcript.push(format!("acknowledged: {}", handed.headline()));
                run.summary = Some(handed);
            }
            Err(err) => {
                log::warn!("seed {seed}: acknowledge_completion failed: {err}");
                run.errors.push(err);
            }
        }
    }
    run.final_phase = controller.phase();
    run
}
