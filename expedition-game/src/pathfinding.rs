//! A* path planner for expedition maps
//!
//! Movement is 4-directional with a uniform step cost, so the Manhattan
//! distance is an admissible and consistent heuristic and every returned path
//! is a shortest one. Ties on f-score are broken on the lowest node id, which
//! keeps path selection reproducible when several shortest routes exist.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::constants::STEP_COST;
use crate::map::{MapModel, Node, Position};

/// Find the shortest traversable route between two nodes.
///
/// The result includes both endpoints. An empty vector means there is no
/// route: unknown ids, obstacle endpoints and disconnected cells are all a
/// normal "no path" outcome rather than an error.
#[must_use]
pub fn find_path<'a>(map: &'a MapModel, start_id: &str, goal_id: &str) -> Vec<&'a Node> {
    let (Some(start), Some(goal)) = (map.index_of(start_id), map.index_of(goal_id)) else {
        return Vec::new();
    };
    let start_node = map.node_by_index(start);
    let goal_node = map.node_by_index(goal);
    if !start_node.is_traversable() || !goal_node.is_traversable() {
        return Vec::new();
    }
    if start == goal {
        return vec![start_node];
    }

    let goal_pos = goal_node.position;
    let mut g_scores = vec![u32::MAX; map.len()];
    let mut came_from: Vec<Option<usize>> = vec![None; map.len()];
    let mut closed = vec![false; map.len()];
    // Min-heap on (f, id); the id gives a stable secondary order.
    let mut open_set: BinaryHeap<Reverse<(u32, &'a str, usize)>> = BinaryHeap::new();

    g_scores[start] = 0;
    open_set.push(Reverse((
        heuristic(start_node.position, goal_pos),
        start_node.id.as_str(),
        start,
    )));

    while let Some(Reverse((_, _, current))) = open_set.pop() {
        if current == goal {
            return reconstruct_path(map, &came_from, current);
        }
        if closed[current] {
            continue;
        }
        closed[current] = true;

        let tentative_g = g_scores[current].saturating_add(STEP_COST);
        for neighbor in map.neighbor_indexes(current) {
            if closed[neighbor] || tentative_g >= g_scores[neighbor] {
                continue;
            }
            came_from[neighbor] = Some(current);
            g_scores[neighbor] = tentative_g;
            let node = map.node_by_index(neighbor);
            let f_score = tentative_g.saturating_add(heuristic(node.position, goal_pos));
            open_set.push(Reverse((f_score, node.id.as_str(), neighbor)));
        }
    }

    Vec::new()
}

/// Number of steps along a path of nodes (one less than its length).
#[must_use]
pub fn step_count(path: &[&Node]) -> u32 {
    u32::try_from(path.len().saturating_sub(1)).unwrap_or(u32::MAX)
}

/// Ordered coordinates of a path, for rendering adapters.
#[must_use]
pub fn path_positions(path: &[&Node]) -> Vec<Position> {
    path.iter().map(|node| node.position).collect()
}

const fn heuristic(from: Position, to: Position) -> u32 {
    from.manhattan(to) * STEP_COST
}

fn reconstruct_path<'a>(
    map: &'a MapModel,
    came_from: &[Option<usize>],
    mut current: usize,
) -> Vec<&'a Node> {
    let mut path = vec![map.node_by_index(current)];
    while let Some(prev) = came_from[current] {
        path.push(map.node_by_index(prev));
        current = prev;
    }
    path.reverse();
    path
}
