//! Comparison of two spatial inferences over the same ARG.
//!
//! Both node sets share one [`CoordinateTransform`]. Each ancestor is drawn at the
//! centroid of its two inferred positions, with connector legs running out to the
//! first and second anchors. Samples are ground truth: they stay on their first
//! location while still reporting where the second inference put them.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::config::DisplayParams;
use crate::error::{Dataset, Error, Result};
use crate::geo::{GeographicContext, GeographicMode};
use crate::model::{
    DiffEdge, Graph, GraphNode, MovementLeg, NodeId, NodeMovement, RenderEdge, RenderNode,
    RenderPath, TemporalPlane,
};
use crate::normalize::{compute_transform, CoordinateTransform};
use crate::scene::{render_node, temporal_planes};
use crate::style::{StyleResolver, SHAPE_COLOR};
use crate::temporal::TimeAxis;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffScene {
    pub transform: CoordinateTransform,
    pub geographic_mode: GeographicMode,
    pub nodes: Vec<RenderNode>,
    /// Ancestry edges, drawn between centroids.
    pub edges: Vec<RenderEdge>,
    /// Movement connectors, two per node.
    pub diff_edges: Vec<DiffEdge>,
    pub shape: Vec<RenderPath>,
    pub planes: Vec<TemporalPlane>,
}

/// Build the diff view of `first` against the node locations in `second_nodes`.
///
/// Every non-sample node of `first` needs a same-id counterpart in `second_nodes`,
/// otherwise [`Error::MissingCorrespondingNode`] names the first one missing.
pub fn diff(
    first: &Graph,
    second_nodes: &[GraphNode],
    geo: &GeographicContext,
    params: &DisplayParams,
) -> Result<DiffScene> {
    let second = index_counterparts(first, second_nodes)?;
    let transform = compute_transform(&first.nodes, Some(second_nodes), geo.anchor_shape())
        .ok_or(Error::EmptySpatialDataset)?;
    diff_in_frame(first, &second, &transform, geo, params)
}

/// Same as [`diff`] but in a caller-supplied frame.
pub fn diff_with_transform(
    first: &Graph,
    second_nodes: &[GraphNode],
    transform: &CoordinateTransform,
    geo: &GeographicContext,
    params: &DisplayParams,
) -> Result<DiffScene> {
    let second = index_counterparts(first, second_nodes)?;
    diff_in_frame(first, &second, transform, geo, params)
}

fn index_counterparts<'a>(
    first: &Graph,
    second_nodes: &'a [GraphNode],
) -> Result<FxHashMap<NodeId, &'a GraphNode>> {
    let second: FxHashMap<NodeId, &GraphNode> = second_nodes.iter().map(|n| (n.id, n)).collect();
    if let Some(missing) = first
        .nodes
        .iter()
        .find(|n| !n.is_sample && !second.contains_key(&n.id))
    {
        return Err(Error::MissingCorrespondingNode {
            node_id: missing.id,
        });
    }
    Ok(second)
}

fn diff_in_frame(
    first: &Graph,
    second: &FxHashMap<NodeId, &GraphNode>,
    transform: &CoordinateTransform,
    geo: &GeographicContext,
    params: &DisplayParams,
) -> Result<DiffScene> {
    let axis = TimeAxis::from_nodes(&first.nodes);
    let resolver = StyleResolver::new(params, &first.edges);
    let movement_style = resolver.movement_style();
    let spacing = params.spatial_spacing;

    let mut placed: FxHashMap<NodeId, ([f64; 3], f64)> = FxHashMap::default();
    let mut nodes = Vec::with_capacity(first.nodes.len());
    let mut diff_edges = Vec::with_capacity(2 * first.nodes.len());
    let mut total_distance = 0.0;

    for node in &first.nodes {
        if params.temporal_filter.hides(node.time) {
            continue;
        }
        let z = axis.node_z(node, params.temporal_spacing, params.spacing_mode, params.jitter);

        let [x1, y1] = transform.normalize_node(node, spacing, Dataset::First)?;
        let [x2, y2] = match second.get(&node.id) {
            Some(counterpart) if node.is_sample => counterpart
                .planar_location()
                .map_or([x1, y1], |loc| transform.normalize_location(loc, spacing)),
            Some(counterpart) => transform.normalize_node(counterpart, spacing, Dataset::Second)?,
            None if node.is_sample => [x1, y1],
            None => return Err(Error::MissingCorrespondingNode { node_id: node.id }),
        };

        let first_position = [x1, y1, z];
        let second_position = [x2, y2, z];
        // Samples are pinned to their first-dataset location.
        let position = if node.is_sample {
            first_position
        } else {
            [(x1 + x2) / 2.0, (y1 + y2) / 2.0, z]
        };
        let distance = planar_distance(first_position, position);
        total_distance += distance;

        diff_edges.push(DiffEdge {
            node_id: node.id,
            leg: MovementLeg::FirstToCentroid,
            source: first_position,
            target: position,
            color: movement_style.color,
            width: movement_style.width,
        });
        diff_edges.push(DiffEdge {
            node_id: node.id,
            leg: MovementLeg::CentroidToSecond,
            source: position,
            target: second_position,
            color: movement_style.color,
            width: movement_style.width,
        });

        placed.insert(node.id, (position, node.time));
        let movement = NodeMovement {
            first_position,
            second_position,
            distance,
        };
        nodes.push(render_node(node, position, resolver.node_style(node), Some(movement)));
    }

    let mut seen: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
    let edges: Vec<RenderEdge> = first
        .edges
        .iter()
        .filter(|edge| !edge.is_self_loop() && seen.insert(edge.undirected_key()))
        .filter_map(|edge| {
            let &(source, source_time) = placed.get(&edge.source)?;
            let &(target, target_time) = placed.get(&edge.target)?;
            let style = resolver.edge_style(source_time, target_time);
            Some(RenderEdge {
                source_id: edge.source,
                target_id: edge.target,
                source,
                target,
                color: style.color,
                width: style.width,
            })
        })
        .collect();

    let shape = geo
        .shape
        .as_ref()
        .map(|s| transform.shape_paths(s, spacing, SHAPE_COLOR))
        .unwrap_or_default();

    debug!(
        "Diff: {} nodes, {} edges, {} connectors, mean displacement {:.4}",
        nodes.len(),
        edges.len(),
        diff_edges.len(),
        if nodes.is_empty() {
            0.0
        } else {
            total_distance / nodes.len() as f64
        }
    );

    Ok(DiffScene {
        transform: *transform,
        geographic_mode: geo.mode,
        nodes,
        edges,
        diff_edges,
        shape,
        planes: temporal_planes(&axis, params),
    })
}

fn planar_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphEdge, Location};

    fn at(id: NodeId, time: f64, x: f64, y: f64, sample: bool) -> GraphNode {
        GraphNode::new(id, time, Some(Location::new(x, y)), sample)
    }

    fn params() -> DisplayParams {
        DisplayParams {
            spatial_spacing: 100.0,
            temporal_spacing: 10.0,
            jitter: false,
            ..DisplayParams::default()
        }
    }

    #[test]
    fn missing_counterpart_is_reported() {
        let first = Graph::new(
            vec![at(0, 0.0, 0.0, 0.0, true), at(1, 1.0, 1.0, 1.0, false)],
            vec![GraphEdge::new(1, 0)],
        );
        let second = vec![at(0, 0.0, 0.0, 0.0, true)];
        let err = diff(&first, &second, &GeographicContext::none(), &params()).unwrap_err();
        assert!(matches!(err, Error::MissingCorrespondingNode { node_id: 1 }));
    }

    #[test]
    fn samples_stay_on_first_location_but_report_the_second() {
        let first = Graph::new(
            vec![at(0, 0.0, 0.0, 0.0, true), at(1, 1.0, 10.0, 0.0, false)],
            vec![GraphEdge::new(1, 0)],
        );
        let second = vec![at(1, 1.0, 10.0, 10.0, false), at(0, 0.0, 10.0, 10.0, true)];
        let scene = diff(&first, &second, &GeographicContext::none(), &params()).unwrap();
        assert_eq!(scene.transform.data_bounds, [0.0, 0.0, 10.0, 10.0]);

        let sample = &scene.nodes[0];
        let movement = sample.movement.unwrap();
        assert_eq!(movement.distance, 0.0);
        assert_eq!(sample.position, movement.first_position);
        assert_eq!(movement.first_position, [-50.0, -50.0, 0.0]);
        assert_eq!(movement.second_position, [50.0, 50.0, 0.0]);
    }

    #[test]
    fn samples_need_no_counterpart() {
        let first = Graph::new(
            vec![at(0, 0.0, 2.0, 2.0, true), at(1, 1.0, 10.0, 0.0, false)],
            vec![GraphEdge::new(1, 0)],
        );
        let second = vec![at(1, 1.0, 10.0, 10.0, false)];
        let scene = diff(&first, &second, &GeographicContext::none(), &params()).unwrap();

        let movement = scene.nodes[0].movement.unwrap();
        assert_eq!(movement.distance, 0.0);
        assert_eq!(movement.second_position, movement.first_position);
    }

    #[test]
    fn ancestry_edges_skip_self_loops_and_reversed_duplicates() {
        let first = Graph::new(
            vec![at(0, 0.0, 0.0, 0.0, true), at(1, 1.0, 4.0, 4.0, false)],
            vec![GraphEdge::new(1, 0), GraphEdge::new(0, 1), GraphEdge::new(1, 1)],
        );
        let second = vec![at(1, 1.0, 2.0, 2.0, false)];
        let scene = diff(&first, &second, &GeographicContext::none(), &params()).unwrap();

        assert_eq!(scene.edges.len(), 1);
        assert!(scene.edges.iter().all(|e| e.source_id != e.target_id));
        assert_eq!((scene.edges[0].source_id, scene.edges[0].target_id), (1, 0));
    }

    #[test]
    fn unlocated_counterpart_is_reported() {
        let first = Graph::new(vec![at(1, 1.0, 0.0, 0.0, false)], Vec::new());
        let second = vec![GraphNode::new(1, 1.0, None, false)];
        let err = diff(&first, &second, &GeographicContext::none(), &params()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingLocationData {
                node_id: 1,
                dataset: Dataset::Second
            }
        ));
    }

    #[test]
    fn nothing_located_is_an_empty_spatial_dataset() {
        let first = Graph::new(vec![GraphNode::new(1, 0.0, None, true)], Vec::new());
        let err = diff(&first, &[], &GeographicContext::none(), &params()).unwrap_err();
        assert!(matches!(err, Error::EmptySpatialDataset));
    }

    #[test]
    fn ancestry_edges_join_centroids() {
        let first = Graph::new(
            vec![at(0, 0.0, 0.0, 0.0, true), at(1, 1.0, 0.0, 10.0, false)],
            vec![GraphEdge::new(1, 0)],
        );
        let second = vec![at(1, 1.0, 10.0, 10.0, false)];
        let scene = diff(&first, &second, &GeographicContext::none(), &params()).unwrap();

        let ancestor = scene.nodes.iter().find(|n| n.id == 1).unwrap();
        assert_eq!(scene.edges.len(), 1);
        assert_eq!(scene.edges[0].source, ancestor.position);
        assert_ne!(scene.edges[0].source, ancestor.movement.unwrap().first_position);

        let legs: Vec<&DiffEdge> = scene.diff_edges.iter().filter(|e| e.node_id == 1).collect();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].target, legs[1].source);
        assert_eq!(legs[0].color[..3], crate::style::MOVEMENT_COLOR[..3]);
    }
}
