use anyhow::{Result, anyhow};
use expedition_game::{
    Ending, ExpeditionCfg, ExpeditionError, ExpeditionPhase, Rejection, ServiceError,
    ValidationError,
};

use super::TestScenario;
use crate::logic::{ExpeditionPlan, ExplorerStrategy, FaultPlan, MapSpec, RunSummary};

/// Every scenario the tester knows, keyed by its command-line name.
pub fn catalog_scenarios() -> Vec<(&'static str, TestScenario)> {
    vec![
        (
            "smoke",
            TestScenario::simulation(
                "Smoke Test",
                ExpeditionPlan::new(ExplorerStrategy::GoalSeeker)
                    .with_expectation(finished_cleanly)
                    .with_expectation(ledger_matches_steps),
            ),
        ),
        (
            "goal-run",
            TestScenario::simulation(
                "Goal Run",
                ExpeditionPlan::new(ExplorerStrategy::GoalSeeker)
                    .with_map(MapSpec {
                        width: 12,
                        height: 10,
                        bosses: 0,
                        ..MapSpec::default()
                    })
                    .with_expectation(finished_cleanly)
                    .with_expectation(goal_reached_on_shortest_path),
            ),
        ),
        (
            "event-hunter",
            TestScenario::simulation(
                "Event Hunter",
                ExpeditionPlan::new(ExplorerStrategy::EventHunter)
                    .with_map(MapSpec {
                        event_pct: 25,
                        ..MapSpec::default()
                    })
                    .with_expectation(finished_cleanly)
                    .with_expectation(ledger_matches_steps)
                    .with_expectation(stats_match_observations),
            ),
        ),
        (
            "boss-rush",
            TestScenario::simulation(
                "Boss Rush",
                ExpeditionPlan::new(ExplorerStrategy::BossHunter)
                    .with_map(MapSpec {
                        bosses: 2,
                        ..MapSpec::default()
                    })
                    .with_expectation(finished_cleanly)
                    .with_expectation(stats_match_observations)
                    .with_expectation(boss_outcome_decides_ending),
            ),
        ),
        (
            "wanderer",
            TestScenario::simulation(
                "Wanderer",
                ExpeditionPlan::new(ExplorerStrategy::Wanderer)
                    .with_cfg(ExpeditionCfg {
                        goal_ends_run: false,
                        ..ExpeditionCfg::default()
                    })
                    .with_expectation(finished_cleanly)
                    .with_expectation(ledger_matches_steps)
                    .with_expectation(stats_match_observations),
            ),
        ),
        (
            "flaky-service",
            TestScenario::simulation(
                "Flaky Service",
                ExpeditionPlan::new(ExplorerStrategy::BossHunter)
                    .with_faults(FaultPlan {
                        transport_every: 3,
                        battle_failures: 1,
                        ..FaultPlan::default()
                    })
                    .with_expectation(finished_cleanly)
                    .with_expectation(transport_failures_were_retried),
            ),
        ),
        (
            "unimplemented-move",
            TestScenario::simulation(
                "Unimplemented Move Endpoint",
                ExpeditionPlan::new(ExplorerStrategy::GoalSeeker)
                    .with_faults(FaultPlan {
                        move_unimplemented: true,
                        ..FaultPlan::default()
                    })
                    .with_expectation(unimplemented_move_spends_nothing),
            ),
        ),
        (
            "invalid-team",
            TestScenario::simulation(
                "Invalid Team",
                ExpeditionPlan::new(ExplorerStrategy::GoalSeeker)
                    .with_team(Vec::new())
                    .simulated_only()
                    .with_expectation(rejected_before_any_request),
            ),
        ),
        (
            "insufficient-funds",
            TestScenario::simulation(
                "Insufficient Funds",
                ExpeditionPlan {
                    facility_id: "crystal-caves".to_string(),
                    ..ExpeditionPlan::new(ExplorerStrategy::GoalSeeker)
                }
                .simulated_only()
                .with_expectation(server_refuses_to_start),
            ),
        ),
    ]
}

fn summary_of(run: &RunSummary) -> Result<&expedition_game::ExpeditionSummary> {
    run.summary
        .as_ref()
        .ok_or_else(|| anyhow!("run produced no summary (start error: {:?})", run.start_error))
}

fn finished_cleanly(run: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        run.start_error.is_none(),
        "expedition failed to start: {:?}",
        run.start_error
    );
    let summary = summary_of(run)?;
    anyhow::ensure!(
        summary.ending != Ending::Abandoned,
        "run was abandoned mid-event"
    );
    anyhow::ensure!(
        run.final_phase == ExpeditionPhase::Inactive,
        "controller left in {}",
        run.final_phase
    );
    anyhow::ensure!(
        run.errors.iter().all(ExpeditionError::is_recoverable),
        "fatal error during run: {:?}",
        run.errors
    );
    Ok(())
}

fn ledger_matches_steps(run: &RunSummary) -> Result<()> {
    let summary = summary_of(run)?;
    let spent = summary.resources_spent;
    anyhow::ensure!(
        spent.steps == summary.steps_taken,
        "ledger steps {} != summary steps {}",
        spent.steps,
        summary.steps_taken
    );
    anyhow::ensure!(
        spent.exploration_points == summary.steps_taken,
        "exploration points {} for {} steps",
        spent.exploration_points,
        summary.steps_taken
    );
    anyhow::ensure!(
        summary.moves_committed == run.moves,
        "{} moves committed but {} observed",
        summary.moves_committed,
        run.moves
    );
    // Each move rounds up on its own, so food sits between the two bounds.
    let steps_per_food = ExpeditionCfg::default_steps_per_food();
    let floor = summary.steps_taken.div_ceil(steps_per_food);
    let ceiling = floor + summary.moves_committed;
    anyhow::ensure!(
        (floor..=ceiling).contains(&spent.food),
        "food {} outside {floor}..={ceiling}",
        spent.food
    );
    Ok(())
}

fn goal_reached_on_shortest_path(run: &RunSummary) -> Result<()> {
    let summary = summary_of(run)?;
    anyhow::ensure!(
        summary.ending == Ending::GoalReached,
        "expected the goal, got {}",
        summary.ending
    );
    anyhow::ensure!(run.moves == 1, "goal seeker took {} moves", run.moves);
    anyhow::ensure!(
        Some(summary.steps_taken) == run.goal_distance,
        "walked {} steps but the shortest route is {:?}",
        summary.steps_taken,
        run.goal_distance
    );
    anyhow::ensure!(
        summary.resources_spent.food
            == summary
                .steps_taken
                .div_ceil(ExpeditionCfg::default_steps_per_food()),
        "food {} for a single {}-step move",
        summary.resources_spent.food,
        summary.steps_taken
    );
    Ok(())
}

fn stats_match_observations(run: &RunSummary) -> Result<()> {
    let stats = summary_of(run)?.stats;
    anyhow::ensure!(
        stats.events_encountered == run.events,
        "ledger counted {} events, driver saw {}",
        stats.events_encountered,
        run.events
    );
    anyhow::ensure!(
        stats.bosses_fought == run.battles,
        "ledger counted {} bosses, driver fought {}",
        stats.bosses_fought,
        run.battles
    );
    Ok(())
}

fn boss_outcome_decides_ending(run: &RunSummary) -> Result<()> {
    let summary = summary_of(run)?;
    anyhow::ensure!(run.battles >= 1, "no boss was fought");
    let expected = if run.battles_won < run.battles {
        Ending::TeamDefeated
    } else {
        Ending::GoalReached
    };
    anyhow::ensure!(
        summary.ending == expected,
        "won {}/{} battles but ended with {}",
        run.battles_won,
        run.battles,
        summary.ending
    );
    Ok(())
}

fn transport_failures_were_retried(run: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        run.transport_errors() >= 1,
        "fault schedule injected no transport errors ({:?} requests)",
        run.requests_sent
    );
    anyhow::ensure!(
        run.errors
            .iter()
            .all(|err| matches!(err, ExpeditionError::Service(ServiceError::Transport { .. }))),
        "unexpected non-transport errors: {:?}",
        run.errors
    );
    Ok(())
}

fn unimplemented_move_spends_nothing(run: &RunSummary) -> Result<()> {
    let summary = summary_of(run)?;
    anyhow::ensure!(
        matches!(
            run.errors.last(),
            Some(ExpeditionError::Service(ServiceError::Unimplemented { .. }))
        ),
        "expected an unimplemented endpoint error, got {:?}",
        run.errors
    );
    anyhow::ensure!(run.moves == 0, "{} moves committed", run.moves);
    anyhow::ensure!(
        summary.resources_spent == Default::default(),
        "resources were spent: {:?}",
        summary.resources_spent
    );
    anyhow::ensure!(
        summary.ending == Ending::Completed,
        "expected manual completion, got {}",
        summary.ending
    );
    Ok(())
}

fn rejected_before_any_request(run: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        matches!(
            run.start_error,
            Some(ExpeditionError::Validation(ValidationError::EmptyTeam))
        ),
        "expected an empty team error, got {:?}",
        run.start_error
    );
    anyhow::ensure!(
        run.requests_sent == Some(0),
        "{:?} requests reached the server",
        run.requests_sent
    );
    anyhow::ensure!(run.summary.is_none(), "a rejected run has no summary");
    Ok(())
}

fn server_refuses_to_start(run: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        matches!(
            run.start_error,
            Some(ExpeditionError::Service(ServiceError::Rejected {
                reason: Rejection::InsufficientFunds,
                ..
            }))
        ),
        "expected an insufficient funds rejection, got {:?}",
        run.start_error
    );
    anyhow::ensure!(
        run.final_phase == ExpeditionPhase::Inactive,
        "controller left in {}",
        run.final_phase
    );
    Ok(())
}
