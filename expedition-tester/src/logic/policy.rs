use std::collections::HashSet;
use std::fmt;

use expedition_game::{Event, ExpeditionSession, NodeType, find_path, step_count};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Policy interface for automated exploration.
pub trait ExplorerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Next node to walk to, or `None` when the policy is done exploring.
    fn pick_target(&mut self, session: &ExpeditionSession) -> Option<String>;

    /// Choice to take on the pending event.
    fn pick_choice(&mut self, event: &Event) -> Option<String>;
}

/// Built-in exploration strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExplorerStrategy {
    GoalSeeker,
    EventHunter,
    BossHunter,
    Wanderer,
}

impl ExplorerStrategy {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ExplorerStrategy::GoalSeeker => "Goal Seeker",
            ExplorerStrategy::EventHunter => "Event Hunter",
            ExplorerStrategy::BossHunter => "Boss Hunter",
            ExplorerStrategy::Wanderer => "Wanderer",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn ExplorerPolicy + Send> {
        match self {
            ExplorerStrategy::GoalSeeker => Box::new(GoalSeekerPolicy),
            ExplorerStrategy::EventHunter => Box::new(HunterPolicy::new("Event Hunter", NodeType::Event)),
            ExplorerStrategy::BossHunter => Box::new(HunterPolicy::new("Boss Hunter", NodeType::Boss)),
            ExplorerStrategy::Wanderer => Box::new(WandererPolicy::new(seed)),
        }
    }
}

impl fmt::Display for ExplorerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct GoalSeekerPolicy;

/// Visits every reachable node of one type, nearest first, then heads for
/// the goal.
struct HunterPolicy {
    name: &'static str,
    prey: NodeType,
    visited: HashSet<String>,
}

impl HunterPolicy {
    fn new(name: &'static str, prey: NodeType) -> Self {
        Self {
            name,
            prey,
            visited: HashSet::new(),
        }
    }
}

struct WandererPolicy {
    rng: ChaCha20Rng,
    hops: u32,
}

impl WandererPolicy {
    const MAX_HOPS: u32 = 6;

    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            hops: 0,
        }
    }
}

fn goal_id(session: &ExpeditionSession) -> Option<String> {
    session
        .map()
        .nodes()
        .iter()
        .find(|node| node.node_type == NodeType::Goal)
        .map(|node| node.id.clone())
}

/// Reachable node of the given type closest to the team, ties on id.
fn nearest(session: &ExpeditionSession, node_type: NodeType, skip: &HashSet<String>) -> Option<String> {
    let map = session.map();
    let here = session.current_node_id();
    map.nodes()
        .iter()
        .filter(|node| node.node_type == node_type && node.id != here && !skip.contains(&node.id))
        .filter_map(|node| {
            let path = find_path(map, here, &node.id);
            (!path.is_empty()).then(|| (step_count(&path), node.id.clone()))
        })
        .min()
        .map(|(_, id)| id)
}

fn first_choice(event: &Event) -> Option<String> {
    event.choices.first().map(|choice| choice.choice_id.clone())
}

fn fight_choice(event: &Event) -> Option<String> {
    event
        .choice("fight")
        .map(|choice| choice.choice_id.clone())
        .or_else(|| first_choice(event))
}

impl ExplorerPolicy for GoalSeekerPolicy {
    fn name(&self) -> &'static str {
        "Goal Seeker"
    }

    fn pick_target(&mut self, session: &ExpeditionSession) -> Option<String> {
        goal_id(session).filter(|goal| goal != session.current_node_id())
    }

    fn pick_choice(&mut self, event: &Event) -> Option<String> {
        fight_choice(event)
    }
}

impl ExplorerPolicy for HunterPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn pick_target(&mut self, session: &ExpeditionSession) -> Option<String> {
        self.visited.insert(session.current_node_id().to_string());
        nearest(session, self.prey, &self.visited)
            .or_else(|| goal_id(session).filter(|goal| goal != session.current_node_id()))
    }

    fn pick_choice(&mut self, event: &Event) -> Option<String> {
        fight_choice(event)
    }
}

impl ExplorerPolicy for WandererPolicy {
    fn name(&self) -> &'static str {
        "Wanderer"
    }

    fn pick_target(&mut self, session: &ExpeditionSession) -> Option<String> {
        if self.hops >= Self::MAX_HOPS {
            return goal_id(session).filter(|goal| goal != session.current_node_id());
        }
        self.hops += 1;
        let here = session.current_node_id();
        let candidates: Vec<&str> = session
            .map()
            .nodes()
            .iter()
            .filter(|node| node.is_traversable() && node.id != here)
            .map(|node| node.id.as_str())
            .collect();
        candidates.choose(&mut self.rng).map(ToString::to_string)
    }

    fn pick_choice(&mut self, event: &Event) -> Option<String> {
        if event.is_boss() {
            return fight_choice(event);
        }
        event
            .choices
            .choose(&mut self.rng)
            .map(|choice| choice.choice_id.clone())
    }
}
