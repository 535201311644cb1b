//! Folding of graph-locally indistinguishable ancestor nodes.
//!
//! Two non-sample nodes collapse when they share time, planar location and the set of
//! neighbouring node ids. Sample nodes never take part on either side of a comparison.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Graph, GraphEdge, GraphNode, NodeId};

/// Merge structurally identical non-sample nodes and rewrite edges through the merge.
///
/// The scan is quadratic in the number of nodes; upstream sampling keeps rendered
/// subsets small enough for that.
pub fn combine(nodes: &[GraphNode], edges: &[GraphEdge]) -> Graph {
    let adjacency = build_adjacency(edges);
    let empty = FxHashSet::default();

    let mut merged_into: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut processed = vec![false; nodes.len()];
    let mut out_nodes = Vec::with_capacity(nodes.len());
    let mut merge_groups = 0usize;

    for i in 0..nodes.len() {
        if processed[i] {
            continue;
        }
        processed[i] = true;
        let node = &nodes[i];

        if node.is_sample {
            out_nodes.push(node.clone());
            continue;
        }

        let own_neighbors = resolved_neighbors(
            node.id,
            adjacency.get(&node.id).unwrap_or(&empty),
            &merged_into,
        );

        let mut group = vec![i];
        for j in (i + 1)..nodes.len() {
            if processed[j] || nodes[j].is_sample {
                continue;
            }
            let candidate = &nodes[j];
            if !same_time_and_place(node, candidate) {
                continue;
            }
            let candidate_neighbors = resolved_neighbors(
                candidate.id,
                adjacency.get(&candidate.id).unwrap_or(&empty),
                &merged_into,
            );
            if candidate_neighbors == own_neighbors {
                group.push(j);
            }
        }

        if group.len() == 1 {
            out_nodes.push(node.clone());
            continue;
        }

        let mut members: Vec<NodeId> = Vec::new();
        for &k in &group {
            processed[k] = true;
            let other = &nodes[k];
            merged_into.insert(other.id, node.id);
            if other.combined_nodes.is_empty() {
                members.push(other.id);
            } else {
                members.extend_from_slice(&other.combined_nodes);
            }
        }
        members.sort_unstable();
        members.dedup();

        let mut combined = node.clone();
        combined.is_combined = true;
        combined.combined_nodes = members;
        out_nodes.push(combined);
        merge_groups += 1;
    }

    let out_edges = rewrite_edges(edges, &merged_into);

    debug!(
        "Combined {} nodes into {} ({} merge groups), {} edges into {}",
        nodes.len(),
        out_nodes.len(),
        merge_groups,
        edges.len(),
        out_edges.len()
    );

    Graph::new(out_nodes, out_edges)
}

fn build_adjacency(edges: &[GraphEdge]) -> FxHashMap<NodeId, FxHashSet<NodeId>> {
    let mut adjacency: FxHashMap<NodeId, FxHashSet<NodeId>> = FxHashMap::default();
    for edge in edges {
        if edge.is_self_loop() {
            continue;
        }
        adjacency.entry(edge.source).or_default().insert(edge.target);
        adjacency.entry(edge.target).or_default().insert(edge.source);
    }
    adjacency
}

/// Neighbour ids as seen through the merges made so far.
fn resolved_neighbors(
    id: NodeId,
    raw: &FxHashSet<NodeId>,
    merged_into: &FxHashMap<NodeId, NodeId>,
) -> FxHashSet<NodeId> {
    raw.iter()
        .map(|n| merged_into.get(n).copied().unwrap_or(*n))
        .filter(|&n| n != id)
        .collect()
}

/// Equal time and equal planar location; a missing location never matches.
fn same_time_and_place(a: &GraphNode, b: &GraphNode) -> bool {
    if a.time != b.time {
        return false;
    }
    match (&a.location, &b.location) {
        (Some(la), Some(lb)) => la.same_xy(lb),
        _ => false,
    }
}

fn rewrite_edges(edges: &[GraphEdge], merged_into: &FxHashMap<NodeId, NodeId>) -> Vec<GraphEdge> {
    let resolve = |id: NodeId| merged_into.get(&id).copied().unwrap_or(id);

    let mut seen: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
    let mut out = Vec::with_capacity(edges.len());
    for edge in edges {
        let rewritten = GraphEdge::new(resolve(edge.source), resolve(edge.target));
        if rewritten.is_self_loop() {
            continue;
        }
        if seen.insert(rewritten.undirected_key()) {
            out.push(rewritten);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Location;

    fn ancestor(id: NodeId, time: f64, x: f64, y: f64) -> GraphNode {
        GraphNode::new(id, time, Some(Location::new(x, y)), false)
    }

    fn sample(id: NodeId, x: f64, y: f64) -> GraphNode {
        GraphNode::new(id, 0.0, Some(Location::new(x, y)), true)
    }

    #[test]
    fn identical_ancestors_collapse_onto_first_id() {
        let nodes = vec![
            ancestor(1, 0.0, 0.0, 0.0),
            ancestor(2, 0.0, 0.0, 0.0),
            sample(3, 5.0, 5.0),
        ];
        let edges = vec![GraphEdge::new(1, 3), GraphEdge::new(2, 3)];

        let out = combine(&nodes, &edges);
        assert_eq!(out.nodes.len(), 2);
        let merged = &out.nodes[0];
        assert_eq!(merged.id, 1);
        assert!(merged.is_combined);
        assert_eq!(merged.combined_nodes, vec![1, 2]);
        assert_eq!(out.edges, vec![GraphEdge::new(1, 3)]);
    }

    #[test]
    fn samples_are_never_merged() {
        let nodes = vec![sample(1, 0.0, 0.0), sample(2, 0.0, 0.0), ancestor(3, 1.0, 0.0, 0.0)];
        let edges = vec![GraphEdge::new(3, 1), GraphEdge::new(3, 2)];

        let out = combine(&nodes, &edges);
        assert_eq!(out.nodes.len(), 3);
        assert!(out.nodes.iter().all(|n| !n.is_combined));
        assert_eq!(out.edges.len(), 2);
    }

    #[test]
    fn any_differing_attribute_keeps_nodes_apart() {
        let edges = vec![GraphEdge::new(1, 9), GraphEdge::new(2, 9)];
        let sink = sample(9, 0.0, 0.0);

        let by_time = vec![ancestor(1, 1.0, 0.0, 0.0), ancestor(2, 2.0, 0.0, 0.0), sink.clone()];
        assert_eq!(combine(&by_time, &edges).nodes.len(), 3);

        let by_place = vec![ancestor(1, 1.0, 0.0, 0.0), ancestor(2, 1.0, 0.0, 1.0), sink.clone()];
        assert_eq!(combine(&by_place, &edges).nodes.len(), 3);

        let by_neighbors = vec![
            ancestor(1, 1.0, 0.0, 0.0),
            ancestor(2, 1.0, 0.0, 0.0),
            sink,
            sample(8, 1.0, 1.0),
        ];
        let split_edges = vec![GraphEdge::new(1, 9), GraphEdge::new(2, 8)];
        assert_eq!(combine(&by_neighbors, &split_edges).nodes.len(), 4);
    }

    #[test]
    fn missing_location_never_matches() {
        let nodes = vec![
            GraphNode::new(1, 1.0, None, false),
            GraphNode::new(2, 1.0, None, false),
            ancestor(3, 1.0, 0.0, 0.0),
        ];
        let out = combine(&nodes, &[]);
        assert_eq!(out.nodes.len(), 3);
    }

    #[test]
    fn diamond_collapses_to_a_chain() {
        // 4 -> {2, 3} -> 1 with 2 and 3 indistinguishable.
        let nodes = vec![
            sample(1, 0.0, 0.0),
            ancestor(2, 1.0, 0.5, 0.5),
            ancestor(3, 1.0, 0.5, 0.5),
            ancestor(4, 2.0, 1.0, 1.0),
        ];
        let edges = vec![
            GraphEdge::new(2, 1),
            GraphEdge::new(3, 1),
            GraphEdge::new(4, 2),
            GraphEdge::new(4, 3),
        ];

        let out = combine(&nodes, &edges);
        let ids: Vec<NodeId> = out.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
        assert_eq!(out.nodes[1].combined_nodes, vec![2, 3]);
        assert_eq!(out.edges, vec![GraphEdge::new(2, 1), GraphEdge::new(4, 2)]);
    }

    #[test]
    fn recombining_keeps_full_closure() {
        let mut already = ancestor(1, 1.0, 0.0, 0.0);
        already.is_combined = true;
        already.combined_nodes = vec![1, 7];
        let nodes = vec![already, ancestor(2, 1.0, 0.0, 0.0)];

        let out = combine(&nodes, &[]);
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].combined_nodes, vec![1, 2, 7]);
    }

    #[test]
    fn self_loops_and_reversed_duplicates_are_dropped() {
        let nodes = vec![ancestor(1, 1.0, 0.0, 0.0), sample(2, 0.0, 0.0)];
        let edges = vec![
            GraphEdge::new(1, 2),
            GraphEdge::new(2, 1),
            GraphEdge::new(1, 1),
        ];
        let out = combine(&nodes, &edges);
        assert_eq!(out.edges, vec![GraphEdge::new(1, 2)]);
    }
}
