//! Expedition map model
//!
//! A [`MapModel`] is built once from the server's [`MapData`] snapshot and is
//! immutable for the lifetime of an expedition. Construction validates the
//! snapshot and builds the id and position indexes used by the planner.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;

/// Grid coordinate of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two cells.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The orthogonal neighbours, in E, S, W, N order. Cells past the edge of
    /// the coordinate range are left out.
    pub fn orthogonal(self) -> impl Iterator<Item = Self> {
        [
            self.x.checked_add(1).map(|x| Self::new(x, self.y)),
            self.y.checked_add(1).map(|y| Self::new(self.x, y)),
            self.x.checked_sub(1).map(|x| Self::new(x, self.y)),
            self.y.checked_sub(1).map(|y| Self::new(self.x, y)),
        ]
        .into_iter()
        .flatten()
    }

    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Classification of a map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    Empty,
    Event,
    Boss,
    Obstacle,
    Goal,
}

impl NodeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Empty => "empty",
            Self::Event => "event",
            Self::Boss => "boss",
            Self::Obstacle => "obstacle",
            Self::Goal => "goal",
        }
    }

    #[must_use]
    pub const fn is_traversable(self) -> bool {
        !matches!(self, Self::Obstacle)
    }

    /// Whether arriving on a node of this type makes an encounter due.
    #[must_use]
    pub const fn triggers_encounter(self) -> bool {
        matches!(self, Self::Event | Self::Boss)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell of a generated map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub position: Position,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub display_char: String,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>, position: Position, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            position,
            node_type,
            display_char: String::new(),
        }
    }

    #[must_use]
    pub fn with_display_char(mut self, display_char: impl Into<String>) -> Self {
        self.display_char = display_char.into();
        self
    }

    #[must_use]
    pub const fn is_traversable(&self) -> bool {
        self.node_type.is_traversable()
    }
}

/// Raw map snapshot as delivered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapData {
    pub nodes: Vec<Node>,
    pub player_start_pos: Position,
}

/// Reasons a map snapshot is rejected at load time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapDataError {
    #[error("map has no start node")]
    MissingStart,
    #[error("map has {count} start nodes, expected exactly one")]
    MultipleStarts { count: usize },
    #[error("node id `{id}` appears more than once")]
    DuplicateId { id: String },
    #[error("nodes `{first}` and `{second}` share position {position}")]
    DuplicatePosition {
        first: String,
        second: String,
        position: Position,
    },
    #[error("current node `{id}` is not part of the map")]
    UnknownCurrentNode { id: String },
}

/// Inclusive bounding box of all nodes on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: Position,
    pub max: Position,
}

impl Bounds {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max.x.abs_diff(self.min.x) + 1
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.max.y.abs_diff(self.min.y) + 1
    }
}

/// Validated, indexed view over a [`MapData`] snapshot.
#[derive(Debug, Clone)]
pub struct MapModel {
    data: MapData,
    by_id: HashMap<String, usize>,
    by_position: HashMap<Position, usize>,
    start: usize,
    bounds: Bounds,
}

impl MapModel {
    /// Validate a snapshot and build its lookup indexes.
    ///
    /// # Errors
    ///
    /// Returns [`MapDataError`] when the snapshot has zero or several start
    /// nodes, duplicate node ids, or two nodes on the same cell.
    pub fn new(data: MapData) -> Result<Self, MapDataError> {
        let mut by_id = HashMap::with_capacity(data.nodes.len());
        let mut by_position = HashMap::with_capacity(data.nodes.len());
        let mut starts = Vec::new();

        for (idx, node) in data.nodes.iter().enumerate() {
            if by_id.insert(node.id.clone(), idx).is_some() {
                return Err(MapDataError::DuplicateId {
                    id: node.id.clone(),
                });
            }
            if let Some(existing) = by_position.insert(node.position, idx) {
                return Err(MapDataError::DuplicatePosition {
                    first: data.nodes[existing].id.clone(),
                    second: node.id.clone(),
                    position: node.position,
                });
            }
            if node.node_type == NodeType::Start {
                starts.push(idx);
            }
        }

        let start = match starts.as_slice() {
            [] => return Err(MapDataError::MissingStart),
            [single] => *single,
            many => return Err(MapDataError::MultipleStarts { count: many.len() }),
        };

        let start_pos = data.nodes[start].position;
        if start_pos != data.player_start_pos {
            log::warn!(
                "player_start_pos {} disagrees with start node `{}` at {start_pos}; using the start node",
                data.player_start_pos,
                data.nodes[start].id
            );
        }

        let bounds = compute_bounds(&data.nodes, start_pos);

        Ok(Self {
            data,
            by_id,
            by_position,
            start,
            bounds,
        })
    }

    /// Parse and validate a JSON map snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not parse or the map is invalid.
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let data: MapData = serde_json::from_str(json)?;
        Ok(Self::new(data)?)
    }

    #[must_use]
    pub const fn data(&self) -> &MapData {
        &self.data
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.data.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.nodes.is_empty()
    }

    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// The unique start node.
    #[must_use]
    pub fn start(&self) -> &Node {
        &self.data.nodes[self.start]
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.data.nodes[idx])
    }

    #[must_use]
    pub fn node_at(&self, position: Position) -> Option<&Node> {
        self.by_position
            .get(&position)
            .map(|&idx| &self.data.nodes[idx])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    #[must_use]
    pub fn is_traversable(&self, id: &str) -> bool {
        self.node(id).is_some_and(Node::is_traversable)
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn node_by_index(&self, idx: usize) -> &Node {
        &self.data.nodes[idx]
    }

    /// Indexes of the traversable orthogonal neighbours of a node.
    pub(crate) fn neighbor_indexes(&self, idx: usize) -> SmallVec<[usize; 4]> {
        self.data.nodes[idx]
            .position
            .orthogonal()
            .filter_map(|pos| self.by_position.get(&pos).copied())
            .filter(|&n| self.data.nodes[n].is_traversable())
            .collect()
    }

    /// Traversable orthogonal neighbours of a node, or none for unknown ids.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<&Node> {
        self.index_of(id)
            .map(|idx| {
                self.neighbor_indexes(idx)
                    .into_iter()
                    .map(|n| &self.data.nodes[n])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Non-obstacle nodes that cannot be reached from the start node.
    ///
    /// A well-formed map returns an empty list; anything else is a
    /// data-quality defect of the generator, not a runtime error.
    #[must_use]
    pub fn unreachable_nodes(&self) -> Vec<&Node> {
        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::from([self.start]);
        seen[self.start] = true;
        while let Some(idx) = queue.pop_front() {
            for n in self.neighbor_indexes(idx) {
                if !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            }
        }
        self.data
            .nodes
            .iter()
            .zip(seen)
            .filter(|(node, reached)| node.is_traversable() && !reached)
            .map(|(node, _)| node)
            .collect()
    }
}

fn compute_bounds(nodes: &[Node], seed: Position) -> Bounds {
    nodes.iter().fold(
        Bounds {
            min: seed,
            max: seed,
        },
        |acc, node| Bounds {
            min: Position::new(acc.min.x.min(node.position.x), acc.min.y.min(node.position.y)),
            max: Position::new(acc.max.x.max(node.position.x), acc.max.y.max(node.position.y)),
        },
    )
}

/// Build a rectangular map from rows of characters.
///
/// `S` start, `G` goal, `E` event, `B` boss, `#` obstacle, `.` empty, and a
/// space leaves the cell out of the grid. Node ids are `r{y}c{x}`.
#[must_use]
pub fn map_from_rows(rows: &[&str]) -> MapData {
    let mut nodes = Vec::new();
    let mut start = Position::new(0, 0);
    for (y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            let node_type = match ch {
                'S' => NodeType::Start,
                'G' => NodeType::Goal,
                'E' => NodeType::Event,
                'B' => NodeType::Boss,
                '#' => NodeType::Obstacle,
                '.' => NodeType::Empty,
                _ => continue,
            };
            let x = i32::try_from(x).unwrap_or(i32::MAX);
            let y = i32::try_from(y).unwrap_or(i32::MAX);
            let position = Position::new(x, y);
            if node_type == NodeType::Start {
                start = position;
            }
            nodes.push(
                Node::new(format!("r{y}c{x}"), position, node_type).with_display_char(ch.to_string()),
            );
        }
    }
    MapData {
        nodes,
        player_start_pos: start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_nodes_by_id_and_position() {
        let map = MapModel::new(map_from_rows(&["S.E", ".#.", "B.G"])).unwrap();
        assert_eq!(map.len(), 9);
        assert_eq!(map.start().id, "r0c0");
        assert_eq!(map.node("r2c2").unwrap().node_type, NodeType::Goal);
        assert_eq!(map.node_at(Position::new(0, 2)).unwrap().id, "r2c0");
        assert!(map.node_at(Position::new(5, 5)).is_none());
        assert!(!map.is_traversable("r1c1"));
        assert!(map.is_traversable("r0c2"));
        assert_eq!(map.bounds().width(), 3);
        assert_eq!(map.bounds().height(), 3);
    }

    #[test]
    fn rejects_missing_or_multiple_starts() {
        let err = MapModel::new(map_from_rows(&["..", ".G"])).unwrap_err();
        assert_eq!(err, MapDataError::MissingStart);

        let err = MapModel::new(map_from_rows(&["S.", ".S"])).unwrap_err();
        assert_eq!(err, MapDataError::MultipleStarts { count: 2 });
    }

    #[test]
    fn rejects_duplicate_ids_and_positions() {
        let mut data = map_from_rows(&["S.."]);
        data.nodes[2].id = data.nodes[1].id.clone();
        assert!(matches!(
            MapModel::new(data),
            Err(MapDataError::DuplicateId { .. })
        ));

        let mut data = map_from_rows(&["S.."]);
        data.nodes[2].position = data.nodes[1].position;
        assert!(matches!(
            MapModel::new(data),
            Err(MapDataError::DuplicatePosition { .. })
        ));
    }

    #[test]
    fn neighbors_skip_obstacles_and_holes() {
        let map = MapModel::new(map_from_rows(&["S# ", "..."])).unwrap();
        let ids: Vec<&str> = map
            .neighbors("r0c0")
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["r1c0"]);
        assert!(map.neighbors("missing").is_empty());
    }

    #[test]
    fn neighbors_at_the_coordinate_limit_exclude_the_node_itself() {
        let cell = |id: &str, x: i32, node_type: NodeType| Node {
            id: id.to_string(),
            position: Position::new(x, 0),
            node_type,
            display_char: String::new(),
        };
        let map = MapModel::new(MapData {
            nodes: vec![
                cell("edge", i32::MAX, NodeType::Start),
                cell("inner", i32::MAX - 1, NodeType::Empty),
            ],
            player_start_pos: Position::new(i32::MAX, 0),
        })
        .unwrap();
        let ids: Vec<&str> = map.neighbors("edge").into_iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["inner"]);
        assert_eq!(Position::new(i32::MIN, i32::MIN).orthogonal().count(), 2);
    }

    #[test]
    fn reports_unreachable_pockets() {
        let map = MapModel::new(map_from_rows(&["S#.", "##E"])).unwrap();
        let mut ids: Vec<&str> = map
            .unreachable_nodes()
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["r0c2", "r1c2"]);

        let connected = MapModel::new(map_from_rows(&["S.", ".G"])).unwrap();
        assert!(connected.unreachable_nodes().is_empty());
    }

    #[test]
    fn parses_server_json_snapshot() {
        let json = r#"{
            "nodes": [
                {"id": "a", "position": {"x": 0, "y": 0}, "type": "start", "display_char": "S"},
                {"id": "b", "position": {"x": 1, "y": 0}, "type": "boss", "display_char": "B"}
            ],
            "player_start_pos": {"x": 0, "y": 0}
        }"#;
        let map = MapModel::from_json(json).unwrap();
        assert_eq!(map.node("b").unwrap().node_type, NodeType::Boss);
        assert_eq!(map.neighbors("a").len(), 1);
    }
}
