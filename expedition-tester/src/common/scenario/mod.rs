pub mod catalog;

use crate::logic::ExpeditionPlan;

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: ExpeditionPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: ExpeditionPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = name.to_lowercase();
    let key = match key.as_str() {
        "goal" => "goal-run",
        "events" => "event-hunter",
        "boss" | "bosses" => "boss-rush",
        "wander" => "wanderer",
        "flaky" => "flaky-service",
        "no-move" => "unimplemented-move",
        "team" => "invalid-team",
        "funds" => "insufficient-funds",
        other => other,
    };
    catalog::catalog_scenarios()
        .into_iter()
        .find(|(scenario_key, _)| *scenario_key == key)
        .map(|(_, scenario)| scenario)
}

pub fn list_scenarios() -> Vec<(&'static str, String)> {
    catalog::catalog_scenarios()
        .into_iter()
        .map(|(key, scenario)| (key, scenario.name))
        .collect()
}
