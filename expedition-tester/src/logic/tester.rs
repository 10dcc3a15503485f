use colored::Colorize;
use expedition_game::HttpGameClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::scenario::TestScenario;
use crate::logic::runner::{ExpeditionPlan, RunSummary, run_expedition};
use crate::logic::sim_server::SimulatedServer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub skipped: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

/// Where expeditions are sent.
#[derive(Clone)]
pub enum ServiceMode {
    /// Seeded in-process server and battle engine.
    Simulated,
    /// A live game server.
    Remote(Arc<HttpGameClient>),
}

impl ServiceMode {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::Remote(_) => "remote",
        }
    }
}

pub struct LogicTester {
    mode: ServiceMode,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(mode: ServiceMode, verbose: bool) -> Self {
        Self { mode, verbose }
    }

    pub async fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (mode: {} strategy: {} seed: {})",
                    scenario.name.bright_white(),
                    self.mode.label(),
                    scenario.plan.strategy,
                    seed
                );
            }

            if scenario.plan.simulated_only && matches!(self.mode, ServiceMode::Remote(_)) {
                log::info!("skipping {} against a remote server", scenario.name);
                results.push(ScenarioResult::skipped(&scenario.name, seed));
                continue;
            }

            results.push(self.run_single_scenario(scenario, seed, iterations).await);
        }

        results
    }

    async fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let summary = self.run_plan(&scenario.plan, iteration_seed).await;

            if let Some(err) = evaluate_expectations(&scenario.plan, &summary) {
                failures.push(format!(
                    "Iteration {} (strategy {}, seed {}, moves {}, events {}, battles {}/{}, ending '{}'): {} | {}",
                    i + 1,
                    scenario.plan.strategy,
                    summary.seed,
                    summary.moves,
                    summary.events,
                    summary.battles_won,
                    summary.battles,
                    summary.ending_label(),
                    err,
                    summarize_transcript(&summary)
                ));

                if self.verbose {
                    println!(
                        "  ❌ Iteration {}/{} failed: {}",
                        i + 1,
                        iterations,
                        err.red()
                    );
                }
            } else {
                successes += 1;
                let duration = start_time.elapsed();
                performance_data.push(duration);

                if self.verbose {
                    println!(
                        "  ✅ Iteration {}/{} passed ({duration:?}) moves:{} ending:{}",
                        i + 1,
                        iterations,
                        summary.moves,
                        summary.ending_label()
                    );
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            skipped: false,
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    async fn run_plan(&self, plan: &ExpeditionPlan, seed: u64) -> RunSummary {
        match &self.mode {
            ServiceMode::Simulated => {
                let server = Arc::new(SimulatedServer::new(seed, plan.map, plan.faults));
                let mut summary =
                    run_expedition(Arc::clone(&server), Arc::clone(&server), plan, seed).await;
                summary.requests_sent = Some(server.requests());
                summary
            }
            ServiceMode::Remote(client) => {
                run_expedition(Arc::clone(client), Arc::clone(client), plan, seed).await
            }
        }
    }
}

impl ScenarioResult {
    fn skipped(name: &str, seed: u64) -> Self {
        Self {
            scenario_name: name.to_string(),
            seed,
            passed: true,
            skipped: true,
            iterations_run: 0,
            successful_iterations: 0,
            failures: Vec::new(),
            average_duration: Duration::ZERO,
            performance_data: Vec::new(),
        }
    }
}

fn evaluate_expectations(plan: &ExpeditionPlan, summary: &RunSummary) -> Option<String> {
    plan.expectations
        .iter()
        .find_map(|expectation| expectation.evaluate(summary).err())
        .map(|err| err.to_string())
}

fn summarize_transcript(summary: &RunSummary) -> String {
    if summary.transcript.is_empty() {
        return "no steps recorded".to_string();
    }
    summary
        .transcript
        .iter()
        .rev()
        .take(3)
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join(" | ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::policy::ExplorerStrategy;
    use crate::logic::sim_server::FaultPlan;
    use expedition_game::ServiceConfig;

    fn scenario(plan: ExpeditionPlan) -> TestScenario {
        TestScenario::simulation("Probe", plan)
    }

    #[tokio::test]
    async fn failing_expectation_is_reported_per_iteration() {
        let plan = ExpeditionPlan::new(ExplorerStrategy::GoalSeeker)
            .with_expectation(|_: &RunSummary| -> anyhow::Result<()> { anyhow::bail!("always wrong") });
        let tester = LogicTester::new(ServiceMode::Simulated, false);
        let results = tester.run_scenario(&scenario(plan), &[1, 2], 2).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.passed && r.failures.len() == 2));
        assert!(results[0].failures[0].contains("always wrong"));
    }

    #[tokio::test]
    async fn simulated_runs_count_requests() {
        let plan = ExpeditionPlan::new(ExplorerStrategy::GoalSeeker).with_expectation(
            |summary: &RunSummary| {
                anyhow::ensure!(summary.requests_sent.unwrap_or(0) >= 2, "start and move");
                Ok(())
            },
        );
        let tester = LogicTester::new(ServiceMode::Simulated, false);
        let results = tester.run_scenario(&scenario(plan), &[9], 1).await;
        assert!(results[0].passed, "{:?}", results[0].failures);
    }

    #[tokio::test]
    async fn remote_mode_skips_fault_injection_scenarios() {
        let client = HttpGameClient::new(ServiceConfig::default().with_base_url("http://127.0.0.1:9"))
            .unwrap();
        let plan = ExpeditionPlan::new(ExplorerStrategy::GoalSeeker).with_faults(FaultPlan {
            transport_every: 2,
            ..FaultPlan::default()
        });
        let tester = LogicTester::new(ServiceMode::Remote(Arc::new(client)), false);
        let results = tester.run_scenario(&scenario(plan), &[1], 3).await;
        assert!(results[0].skipped);
        assert!(results[0].passed);
        assert_eq!(results[0].iterations_run, 0);
    }

    #[test]
    fn durations_serialize_as_millis() {
        let result = ScenarioResult {
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(10), Duration::from_millis(14)],
            ..ScenarioResult::skipped("Smoke", 1)
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["average_duration"], 12);
        assert_eq!(value["performance_data"], serde_json::json!([10, 14]));
    }
}
