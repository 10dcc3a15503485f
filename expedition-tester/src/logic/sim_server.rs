//! In-process stand-in for the game server and battle engine.
//!
//! Everything is derived from a seed so a failing run can be replayed
//! exactly. Faults are injected on a fixed schedule rather than at random.
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use expedition_game::constants::{ENDPOINT_ADVANCE, ENDPOINT_BATTLE, ENDPOINT_MOVE, ENDPOINT_START};
use expedition_game::{
    BattleRequest, BattleResult, BattleService, BattleWinner, CommitMoveRequest, Event,
    EventChoice, EventType, ExpeditionProgress, ExpeditionService, Facility, FacilityCatalog,
    MapData, MapModel, MonsterSnapshot, Node, NodeType, Position, ServiceError,
    StartExpeditionRequest, StatDeltas,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Shape of the generated grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSpec {
    pub width: i32,
    pub height: i32,
    pub obstacle_pct: u32,
    pub event_pct: u32,
    pub bosses: u32,
}

impl Default for MapSpec {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            obstacle_pct: 20,
            event_pct: 12,
            bosses: 1,
        }
    }
}

/// Deterministic failure schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Every n-th request fails with a transport error (0 disables).
    pub transport_every: u32,
    /// The move endpoint answers as if it did not exist.
    pub move_unimplemented: bool,
    /// Number of leading battle requests that fail.
    pub battle_failures: u32,
}

pub const SIM_ISLAND: &str = "isle-of-trials";
pub const SIM_FACILITY: &str = "sunken-ruins";

/// Catalog served by the simulated server.
#[must_use]
pub fn sim_catalog() -> FacilityCatalog {
    FacilityCatalog::from_facilities(vec![
        Facility {
            facility_id: SIM_FACILITY.to_string(),
            island_id: SIM_ISLAND.to_string(),
            name: "Sunken Ruins".to_string(),
            description: "Flooded halls guarded by an old tide spirit".to_string(),
            cost: 100,
            level_range: [1, 40],
        },
        Facility {
            facility_id: "crystal-caves".to_string(),
            island_id: SIM_ISLAND.to_string(),
            name: "Crystal Caves".to_string(),
            description: "Glittering tunnels, pricey to enter".to_string(),
            cost: 5_000,
            level_range: [20, 60],
        },
    ])
}

struct SimState {
    rng: ChaCha20Rng,
    gold: u64,
    progress: Option<ExpeditionProgress>,
    requests: u32,
    battles: u32,
}

pub struct SimulatedServer {
    spec: MapSpec,
    faults: FaultPlan,
    catalog: FacilityCatalog,
    state: Mutex<SimState>,
}

impl SimulatedServer {
    #[must_use]
    pub fn new(seed: u64, spec: MapSpec, faults: FaultPlan) -> Self {
        Self {
            spec,
            faults,
            catalog: sim_catalog(),
            state: Mutex::new(SimState {
                rng: ChaCha20Rng::seed_from_u64(seed),
                gold: 1_000,
                progress: None,
                requests: 0,
                battles: 0,
            }),
        }
    }

    /// Requests received so far, failed ones included.
    #[must_use]
    pub fn requests(&self) -> u32 {
        self.state.lock().map_or(0, |state| state.requests)
    }

    fn lock(&self, endpoint: &'static str) -> Result<MutexGuard<'_, SimState>, ServiceError> {
        self.state.lock().map_err(|_| ServiceError::Transport {
            endpoint,
            message: "simulated server state is poisoned".to_string(),
        })
    }

    /// Count the request and apply the transport fault schedule.
    fn admit(&self, endpoint: &'static str) -> Result<MutexGuard<'_, SimState>, ServiceError> {
        let mut state = self.lock(endpoint)?;
        state.requests += 1;
        let every = self.faults.transport_every;
        if every > 0 && state.requests % every == 0 {
            log::debug!("injecting transport fault on {endpoint} (request {})", state.requests);
            return Err(ServiceError::Transport {
                endpoint,
                message: "simulated connection reset".to_string(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl ExpeditionService for SimulatedServer {
    async fn start_expedition(
        &self,
        request: &StartExpeditionRequest,
    ) -> Result<ExpeditionProgress, ServiceError> {
        let mut state = self.admit(ENDPOINT_START)?;
        let Some(facility) = self.catalog.find(&request.island_id, &request.facility_id) else {
            return Err(ServiceError::rejected(ENDPOINT_START, "Facility not found"));
        };
        if request.team_monster_ids.is_empty() {
            return Err(ServiceError::rejected(ENDPOINT_START, "team must not be empty"));
        }
        if facility.cost > state.gold {
            return Err(ServiceError::rejected(
                ENDPOINT_START,
                "Insufficient gold for this facility",
            ));
        }
        state.gold -= facility.cost;

        let map_data = generate_map(&mut state.rng, self.spec);
        let progress = ExpeditionProgress {
            island_id: request.island_id.clone(),
            facility_id: request.facility_id.clone(),
            is_active: true,
            current_node_id: node_id(map_data.player_start_pos),
            map_data,
            current_step: 0,
            stats: Default::default(),
        };
        state.progress = Some(progress.clone());
        Ok(progress)
    }

    async fn commit_move(
        &self,
        request: &CommitMoveRequest,
    ) -> Result<ExpeditionProgress, ServiceError> {
        let mut state = self.admit(ENDPOINT_MOVE)?;
        if self.faults.move_unimplemented {
            return Err(ServiceError::Unimplemented {
                endpoint: ENDPOINT_MOVE,
            });
        }
        let Some(progress) = state.progress.as_mut() else {
            return Err(ServiceError::rejected(ENDPOINT_MOVE, "no active expedition"));
        };
        validate_path(&progress.map_data, &progress.current_node_id, &request.path)
            .map_err(|reason| ServiceError::rejected(ENDPOINT_MOVE, &reason))?;
        if let Some(last) = request.path.last() {
            progress.current_node_id.clone_from(last);
        }
        Ok(progress.clone())
    }

    async fn advance(&self) -> Result<Event, ServiceError> {
        let mut state = self.admit(ENDPOINT_ADVANCE)?;
        let SimState { rng, progress, .. } = &mut *state;
        let Some(progress) = progress.as_mut() else {
            return Err(ServiceError::rejected(ENDPOINT_ADVANCE, "no active expedition"));
        };
        progress.current_step += 1;
        let node_type = progress
            .map_data
            .nodes
            .iter()
            .find(|node| node.id == progress.current_node_id)
            .map_or(NodeType::Empty, |node| node.node_type);
        Ok(scripted_event(rng, node_type, progress.current_step))
    }
}

#[async_trait]
impl BattleService for SimulatedServer {
    async fn simulate_battle(&self, request: &BattleRequest) -> Result<BattleResult, ServiceError> {
        let mut state = self.admit(ENDPOINT_BATTLE)?;
        state.battles += 1;
        if state.battles <= self.faults.battle_failures {
            return Err(ServiceError::Transport {
                endpoint: ENDPOINT_BATTLE,
                message: "battle engine timed out".to_string(),
            });
        }

        let team_power: u32 = request.player_monster_data.iter().map(|m| m.level).sum();
        let boss_power = request.opponent_monster_data.level.saturating_mul(2);
        let roll = state.rng.gen_range(0..=boss_power.max(1));
        let winner = if team_power + roll > boss_power {
            BattleWinner::Player
        } else {
            BattleWinner::Opponent
        };
        let turns = state.rng.gen_range(3..15);
        let deltas = StatDeltas {
            gold: if winner == BattleWinner::Player {
                u64::from(request.opponent_monster_data.level) * 20
            } else {
                0
            },
            dna_fragments: u64::from(winner == BattleWinner::Player),
            hp_consumed: state.rng.gen_range(20..200),
            hp_healed: state.rng.gen_range(0..40),
            mp_consumed: state.rng.gen_range(5..60),
            mp_healed: 0,
            captain_switches: state.rng.gen_range(0..3),
            buffs: state.rng.gen_range(0..4),
            debuffs: state.rng.gen_range(0..4),
        };
        Ok(BattleResult {
            winner,
            turns,
            deltas,
            log: vec![format!(
                "{} monsters faced {} for {turns} turns",
                request.player_monster_data.len(),
                request.opponent_monster_data.name
            )],
        })
    }
}

fn node_id(position: Position) -> String {
    format!("r{}c{}", position.y, position.x)
}

/// Generate a map with exactly one start and goal where every
/// non-obstacle node is reachable from the start.
fn generate_map(rng: &mut ChaCha20Rng, spec: MapSpec) -> MapData {
    let width = spec.width.max(2);
    let height = spec.height.max(2);
    let start = Position::new(0, 0);
    let goal = Position::new(width - 1, height - 1);

    // Monotone walk from start to goal that is never blocked.
    let mut corridor = vec![start];
    let mut cursor = start;
    while cursor != goal {
        let go_east = cursor.y == goal.y || (cursor.x != goal.x && rng.gen_bool(0.5));
        cursor = if go_east {
            Position::new(cursor.x + 1, cursor.y)
        } else {
            Position::new(cursor.x, cursor.y + 1)
        };
        corridor.push(cursor);
    }
    let protected: HashSet<Position> = corridor.iter().copied().collect();
    let inner = &corridor[1..corridor.len() - 1];
    let bosses: HashSet<Position> = inner
        .choose_multiple(rng, spec.bosses as usize)
        .copied()
        .collect();

    let mut nodes = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let position = Position::new(x, y);
            let node_type = if position == start {
                NodeType::Start
            } else if position == goal {
                NodeType::Goal
            } else if bosses.contains(&position) {
                NodeType::Boss
            } else {
                let roll = rng.gen_range(0..100);
                if !protected.contains(&position) && roll < spec.obstacle_pct {
                    NodeType::Obstacle
                } else if roll >= 100 - spec.event_pct.min(100) {
                    NodeType::Event
                } else {
                    NodeType::Empty
                }
            };
            nodes.push(Node::new(node_id(position), position, node_type).with_display_char(glyph(node_type)));
        }
    }

    let data = MapData {
        nodes,
        player_start_pos: start,
    };
    seal_unreachable(data)
}

/// Turn pockets the start cannot reach into obstacles.
fn seal_unreachable(mut data: MapData) -> MapData {
    let sealed: HashSet<String> = match MapModel::new(data.clone()) {
        Ok(map) => map
            .unreachable_nodes()
            .into_iter()
            .map(|node| node.id.clone())
            .collect(),
        Err(err) => {
            log::warn!("generated map failed validation: {err}");
            return data;
        }
    };
    for node in &mut data.nodes {
        if sealed.contains(&node.id) {
            node.node_type = NodeType::Obstacle;
            node.display_char = glyph(NodeType::Obstacle).to_string();
        }
    }
    data
}

const fn glyph(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Start => "S",
        NodeType::Empty => ".",
        NodeType::Event => "?",
        NodeType::Boss => "B",
        NodeType::Obstacle => "#",
        NodeType::Goal => "G",
    }
}

fn validate_path(map: &MapData, current: &str, path: &[String]) -> Result<(), String> {
    if path.first().map(String::as_str) != Some(current) {
        return Err("path must start at the current node".to_string());
    }
    let mut previous: Option<Position> = None;
    for id in path {
        let Some(node) = map.nodes.iter().find(|node| &node.id == id) else {
            return Err(format!("unknown node {id}"));
        };
        if !node.is_traversable() {
            return Err(format!("node {id} is blocked"));
        }
        if let Some(prev) = previous
            && !prev.is_adjacent(node.position)
        {
            return Err(format!("node {id} is not adjacent to the previous step"));
        }
        previous = Some(node.position);
    }
    Ok(())
}

const BOSS_NAMES: [&str; 4] = ["Tide Spirit", "Ruin Colossus", "Drowned King", "Coral Wyrm"];
const FLAVOUR: [&str; 4] = [
    "A collapsed archway hides a glinting chest",
    "Strange currents swirl around the team",
    "A lost traveller asks for directions",
    "Old murals describe a forgotten ritual",
];

fn scripted_event(rng: &mut ChaCha20Rng, node_type: NodeType, step: u32) -> Event {
    match node_type {
        NodeType::Boss => {
            let name = BOSS_NAMES[rng.gen_range(0..BOSS_NAMES.len())];
            let level = rng.gen_range(8..30);
            let mut boss = MonsterSnapshot::new(format!("boss-{step}"), name, level);
            boss.max_hp = i64::from(level) * 40;
            boss.hp = boss.max_hp;
            boss.max_mp = i64::from(level) * 5;
            boss.mp = boss.max_mp;
            Event {
                description: format!("{name} blocks the way"),
                choices: vec![EventChoice::new("fight", "Fight"), EventChoice::new("taunt", "Taunt")],
                event_type: EventType::BossEncounter,
                boss_data: Some(boss),
            }
        }
        NodeType::Event => Event {
            description: FLAVOUR[rng.gen_range(0..FLAVOUR.len())].to_string(),
            choices: vec![
                EventChoice::new("investigate", "Investigate"),
                EventChoice::new("move-on", "Move on"),
            ],
            event_type: EventType::Generic,
            boss_data: None,
        },
        _ => Event {
            description: "Nothing stirs".to_string(),
            choices: vec![EventChoice::new("continue", "Continue")],
            event_type: EventType::Generic,
            boss_data: None,
        },
    }
}
