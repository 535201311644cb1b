//! Colors, outlines, radii and opacity for nodes and edges.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::DisplayParams;
use crate::model::{GraphEdge, GraphNode, NodeId, NodeRole, Rgba};

pub const SELECTED_FILL: Rgba = [255, 215, 0, 255];
pub const ROOT_FILL: Rgba = [214, 69, 65, 255];
pub const SAMPLE_FILL: Rgba = [46, 204, 113, 255];
pub const COMBINED_FILL: Rgba = [155, 89, 182, 255];
pub const DEFAULT_FILL: Rgba = [52, 152, 219, 255];

pub const DEFAULT_OUTLINE: Rgba = [255, 255, 255, 255];
pub const SELECTED_OUTLINE: Rgba = [0, 0, 0, 255];

pub const EDGE_COLOR: Rgba = [170, 170, 170, 255];
/// Connector color for diff movement legs; kept apart from ancestry edges.
pub const MOVEMENT_COLOR: Rgba = [255, 140, 0, 255];
pub const SHAPE_COLOR: Rgba = [120, 120, 120, 255];

/// Opacity multiplier for a node, or an edge with both ends, outside the window.
pub const OUTSIDE_WINDOW_OPACITY: f64 = 0.1;
/// Opacity multiplier for an edge with exactly one end outside the window.
pub const PARTIAL_WINDOW_OPACITY: f64 = 0.35;

const SELECTED_RADIUS_SCALE: f64 = 1.5;

/// What a temporal window does to things outside it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Fade out-of-window geometry and mark each distinct time with a plane.
    #[default]
    Planes,
    /// Drop out-of-window nodes and every edge touching them.
    Hide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalFilter {
    /// Inclusive [min_time, max_time].
    #[serde(default)]
    pub window: Option<[f64; 2]>,
    #[serde(default)]
    pub mode: FilterMode,
}

impl TemporalFilter {
    pub fn contains(&self, time: f64) -> bool {
        match self.window {
            Some([min, max]) => time >= min && time <= max,
            None => true,
        }
    }

    fn fades(&self) -> bool {
        self.window.is_some() && self.mode == FilterMode::Planes
    }

    /// Whether a node at `time` is removed from the scene altogether.
    pub fn hides(&self, time: f64) -> bool {
        self.mode == FilterMode::Hide && !self.contains(time)
    }

    pub fn node_opacity(&self, time: f64) -> f64 {
        if self.fades() && !self.contains(time) {
            OUTSIDE_WINDOW_OPACITY
        } else {
            1.0
        }
    }

    pub fn edge_opacity(&self, source_time: f64, target_time: f64) -> f64 {
        if !self.fades() {
            return 1.0;
        }
        match (self.contains(source_time), self.contains(target_time)) {
            (true, true) => 1.0,
            (false, false) => OUTSIDE_WINDOW_OPACITY,
            _ => PARTIAL_WINDOW_OPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStyle {
    pub role: NodeRole,
    /// Fill with the final opacity folded into alpha.
    pub fill: Rgba,
    pub outline: Rgba,
    pub outline_width: f64,
    pub opacity: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStyle {
    pub color: Rgba,
    pub width: f64,
    pub opacity: f64,
}

/// Resolves styles for one edge set under one set of display parameters.
pub struct StyleResolver<'a> {
    params: &'a DisplayParams,
    roots: FxHashSet<NodeId>,
}

impl<'a> StyleResolver<'a> {
    /// Roots are nodes with children but no incoming ancestry edge in `edges`.
    pub fn new(params: &'a DisplayParams, edges: &[GraphEdge]) -> Self {
        let mut parents: FxHashSet<NodeId> = FxHashSet::default();
        let mut children: FxHashSet<NodeId> = FxHashSet::default();
        for edge in edges {
            parents.insert(edge.source);
            children.insert(edge.target);
        }
        let roots = parents.difference(&children).copied().collect();
        StyleResolver { params, roots }
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.roots.contains(&id)
    }

    pub fn role(&self, node: &GraphNode) -> NodeRole {
        let selected = self
            .params
            .selected_node
            .is_some_and(|sel| sel == node.id || node.combined_nodes.contains(&sel));
        if selected {
            NodeRole::Selected
        } else if self.is_root(node.id) {
            NodeRole::Root
        } else if node.is_sample {
            NodeRole::Sample
        } else if node.is_combined {
            NodeRole::Combined
        } else {
            NodeRole::Default
        }
    }

    pub fn node_style(&self, node: &GraphNode) -> NodeStyle {
        let role = self.role(node);
        let (base, outline, outline_width) = match role {
            NodeRole::Selected => (SELECTED_FILL, SELECTED_OUTLINE, 2.0),
            NodeRole::Root => (ROOT_FILL, DEFAULT_OUTLINE, 1.0),
            NodeRole::Sample => (SAMPLE_FILL, DEFAULT_OUTLINE, 0.5),
            NodeRole::Combined => (COMBINED_FILL, DEFAULT_OUTLINE, 1.0),
            NodeRole::Default => (DEFAULT_FILL, DEFAULT_OUTLINE, 0.5),
        };

        let mut radius = self.params.node_radius;
        if node.is_sample {
            radius *= self.params.sample_radius_scale;
        }
        if role == NodeRole::Selected {
            radius *= SELECTED_RADIUS_SCALE;
        }

        let opacity = if role == NodeRole::Selected {
            self.params.node_opacity
        } else {
            self.params.node_opacity * self.params.temporal_filter.node_opacity(node.time)
        };

        NodeStyle {
            role,
            fill: with_opacity(base, opacity),
            outline: with_opacity(outline, opacity),
            outline_width,
            opacity,
            radius,
        }
    }

    pub fn edge_style(&self, source_time: f64, target_time: f64) -> EdgeStyle {
        let opacity = self.params.edge_opacity
            * self
                .params
                .temporal_filter
                .edge_opacity(source_time, target_time);
        EdgeStyle {
            color: with_opacity(EDGE_COLOR, opacity),
            width: self.params.edge_width,
            opacity,
        }
    }

    /// Style of a diff connector leg.
    pub fn movement_style(&self) -> EdgeStyle {
        EdgeStyle {
            color: with_opacity(MOVEMENT_COLOR, self.params.edge_opacity),
            width: self.params.edge_width,
            opacity: self.params.edge_opacity,
        }
    }
}

pub fn with_opacity(color: Rgba, opacity: f64) -> Rgba {
    let alpha = (color[3] as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
    [color[0], color[1], color[2], alpha]
}
