//! Single-dataset 3D scene: combine, frame, place in depth, style.

use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::DisplayParams;
use crate::dedup;
use crate::geo::{GeographicContext, GeographicMode};
use crate::model::{
    Graph, GraphNode, NodeId, NodeMovement, RenderEdge, RenderNode, RenderPath, TemporalPlane,
};
use crate::normalize::{compute_transform, CoordinateTransform};
use crate::style::{FilterMode, NodeStyle, StyleResolver, SHAPE_COLOR};
use crate::temporal::TimeAxis;

/// Render primitives for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub transform: CoordinateTransform,
    pub geographic_mode: GeographicMode,
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    pub shape: Vec<RenderPath>,
    pub planes: Vec<TemporalPlane>,
}

/// Combine (when enabled) and lay out `graph`.
///
/// `None` means nothing in the graph is located; the caller should fall back to a
/// non-spatial view.
pub fn build_scene(
    graph: &Graph,
    geo: &GeographicContext,
    params: &DisplayParams,
) -> Option<Scene> {
    if params.combine_nodes {
        let combined = dedup::combine(&graph.nodes, &graph.edges);
        layout(&combined, geo, params)
    } else {
        layout(graph, geo, params)
    }
}

/// Lay out an already-combined graph. Everything here is linear in graph size, so
/// it is the part to rerun when only display parameters change.
pub fn layout(graph: &Graph, geo: &GeographicContext, params: &DisplayParams) -> Option<Scene> {
    let transform = compute_transform(&graph.nodes, None, geo.anchor_shape())?;
    let axis = TimeAxis::from_nodes(&graph.nodes);
    let resolver = StyleResolver::new(params, &graph.edges);
    let filter = &params.temporal_filter;

    let mut placed: FxHashMap<NodeId, ([f64; 3], f64)> = FxHashMap::default();
    let mut nodes = Vec::with_capacity(graph.nodes.len());
    let mut unlocated = 0usize;
    let mut hidden = 0usize;

    for node in &graph.nodes {
        if filter.hides(node.time) {
            hidden += 1;
            continue;
        }
        let Some(loc) = node.planar_location() else {
            unlocated += 1;
            continue;
        };
        let [x, y] = transform.normalize_location(loc, params.spatial_spacing);
        let z = axis.node_z(node, params.temporal_spacing, params.spacing_mode, params.jitter);
        let position = [x, y, z];

        placed.insert(node.id, (position, node.time));
        nodes.push(render_node(node, position, resolver.node_style(node), None));
    }

    if unlocated > 0 {
        warn!("{} nodes have no spatial location and were left out", unlocated);
    }

    let mut edges = Vec::with_capacity(graph.edges.len());
    let mut dangling = 0usize;
    for edge in &graph.edges {
        match (placed.get(&edge.source), placed.get(&edge.target)) {
            (Some(&(source, source_time)), Some(&(target, target_time))) => {
                let style = resolver.edge_style(source_time, target_time);
                edges.push(RenderEdge {
                    source_id: edge.source,
                    target_id: edge.target,
                    source,
                    target,
                    color: style.color,
                    width: style.width,
                });
            }
            _ => dangling += 1,
        }
    }

    let shape = geo
        .shape
        .as_ref()
        .map(|s| transform.shape_paths(s, params.spatial_spacing, SHAPE_COLOR))
        .unwrap_or_default();

    let planes = temporal_planes(&axis, params);

    debug!(
        "Scene: {} nodes ({} hidden), {} edges ({} without placed endpoints), {} shape paths, {} planes",
        nodes.len(),
        hidden,
        edges.len(),
        dangling,
        shape.len(),
        planes.len()
    );

    Some(Scene {
        transform,
        geographic_mode: geo.mode,
        nodes,
        edges,
        shape,
        planes,
    })
}

/// One plane per distinct time, only while a window is active in `planes` mode.
pub fn temporal_planes(axis: &TimeAxis, params: &DisplayParams) -> Vec<TemporalPlane> {
    let filter = &params.temporal_filter;
    if filter.mode != FilterMode::Planes || filter.window.is_none() {
        return Vec::new();
    }
    axis.times()
        .iter()
        .map(|&time| TemporalPlane {
            time,
            z: axis.z_of(time, params.temporal_spacing, params.spacing_mode),
            in_window: filter.contains(time),
        })
        .collect()
}

pub(crate) fn render_node(
    node: &GraphNode,
    position: [f64; 3],
    style: NodeStyle,
    movement: Option<NodeMovement>,
) -> RenderNode {
    RenderNode {
        id: node.id,
        time: node.time,
        role: style.role,
        is_sample: node.is_sample,
        combined_nodes: node.combined_nodes.clone(),
        position,
        fill: style.fill,
        outline: style.outline,
        outline_width: style.outline_width,
        radius: style.radius,
        movement,
    }
}
