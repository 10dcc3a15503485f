//! Presentation adapters for expedition maps.
//!
//! The core never draws anything itself; a front end implements
//! [`MapRenderer`] and is handed the map, the team position and an optional
//! planned path.
use std::collections::HashSet;

use crate::map::{MapModel, Node, NodeType, Position};

/// What to overlay on top of the map.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapOverlay<'a> {
    pub current_node_id: Option<&'a str>,
    pub path: &'a [Position],
}

pub trait MapRenderer {
    type Output;

    fn render(&self, map: &MapModel, overlay: MapOverlay<'_>) -> Self::Output;
}

/// Plain character grid, one line per map row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalGrid {
    pub team_glyph: char,
    pub path_glyph: char,
    /// Drawn where the map has no node.
    pub void_glyph: char,
}

impl Default for TerminalGrid {
    fn default() -> Self {
        Self {
            team_glyph: '@',
            path_glyph: '*',
            void_glyph: ' ',
        }
    }
}

impl TerminalGrid {
    fn glyph(node: &Node) -> char {
        if let Some(ch) = node.display_char.chars().next() {
            return ch;
        }
        match node.node_type {
            NodeType::Start => 'S',
            NodeType::Empty => '.',
            NodeType::Event => 'E',
            NodeType::Boss => 'B',
            NodeType::Obstacle => '#',
            NodeType::Goal => 'G',
        }
    }
}

impl MapRenderer for TerminalGrid {
    type Output = String;

    fn render(&self, map: &MapModel, overlay: MapOverlay<'_>) -> String {
        let bounds = map.bounds();
        let team = overlay
            .current_node_id
            .and_then(|id| map.node(id))
            .map(|node| node.position);
        let path: HashSet<Position> = overlay.path.iter().copied().collect();

        let mut lines = Vec::with_capacity(bounds.height() as usize);
        for y in bounds.min.y..=bounds.max.y {
            let line: String = (bounds.min.x..=bounds.max.x)
                .map(|x| {
                    let position = Position::new(x, y);
                    match map.node_at(position) {
                        None => self.void_glyph,
                        Some(_) if team == Some(position) => self.team_glyph,
                        Some(_) if path.contains(&position) => self.path_glyph,
                        Some(node) => Self::glyph(node),
                    }
                })
                .collect();
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }
}
