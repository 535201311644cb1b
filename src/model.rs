//! Value types shared by every stage of the pipeline.
//!
//! Input types mirror the tree-sequence payload produced by the inference backend.
//! Edge endpoints arrive either as bare ids or as embedded node objects; they are
//! canonicalized to ids in [`TreeSequencePayload::split`] so that nothing past the
//! boundary has to care.

use serde::{Deserialize, Serialize};

pub type NodeId = u64;

/// RGBA color, 0-255 per channel.
pub type Rgba = [u8; 4];

/// Planar location of a node. `z` is carried through from the payload but never
/// used by the planar math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Location { x, y, z: None }
    }

    /// Exact equality on both planar coordinates.
    pub fn same_xy(&self, other: &Location) -> bool {
        self.x == other.x && self.y == other.y
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub is_sample: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_combined: bool,
    /// Original ids folded into this node, sorted, self included. Only set when
    /// `is_combined`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combined_nodes: Vec<NodeId>,
}

impl GraphNode {
    pub fn new(id: NodeId, time: f64, location: Option<Location>, is_sample: bool) -> Self {
        GraphNode {
            id,
            time,
            location,
            is_sample,
            is_combined: false,
            combined_nodes: Vec::new(),
        }
    }

    /// Location with both coordinates finite, if any.
    pub fn planar_location(&self) -> Option<&Location> {
        self.location.as_ref().filter(|loc| loc.is_finite())
    }
}

/// Ancestry edge: `source` is the ancestor, `target` the descendant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
}

impl GraphEdge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        GraphEdge { source, target }
    }

    /// Canonical key for undirected deduplication.
    pub fn undirected_key(&self) -> (NodeId, NodeId) {
        (self.source.min(self.target), self.source.max(self.target))
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Graph { nodes, edges }
    }
}

/// An edge endpoint as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EdgeEndpoint {
    Id(NodeId),
    Node(NodeRef),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeRef {
    pub id: NodeId,
}

impl EdgeEndpoint {
    pub fn id(&self) -> NodeId {
        match self {
            EdgeEndpoint::Id(id) => *id,
            EdgeEndpoint::Node(node) => node.id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEdge {
    pub source: EdgeEndpoint,
    pub target: EdgeEndpoint,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoordinateSystemDetection {
    #[serde(default)]
    pub likely_crs: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub bounds: Option<[f64; 4]>,
    #[serde(default)]
    pub suggested_geographic_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadMetadata {
    #[serde(default)]
    pub coordinate_system_detection: Option<CoordinateSystemDetection>,
    #[serde(default)]
    pub suggested_geographic_mode: Option<String>,
}

/// One tree sequence as served by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSequencePayload {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
    #[serde(default)]
    pub metadata: PayloadMetadata,
}

impl TreeSequencePayload {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Canonicalize edge endpoints to ids and hand back the graph and its metadata.
    pub fn split(self) -> (Graph, PayloadMetadata) {
        let edges = self
            .edges
            .iter()
            .map(|e| GraphEdge::new(e.source.id(), e.target.id()))
            .collect();
        (Graph::new(self.nodes, edges), self.metadata)
    }
}

/// Display role of a node, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Selected,
    Root,
    Sample,
    Combined,
    Default,
}

/// Where a node sat in each of two compared datasets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMovement {
    pub first_position: [f64; 3],
    pub second_position: [f64; 3],
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: NodeId,
    pub time: f64,
    pub role: NodeRole,
    pub is_sample: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub combined_nodes: Vec<NodeId>,
    pub position: [f64; 3],
    pub fill: Rgba,
    pub outline: Rgba,
    pub outline_width: f64,
    pub radius: f64,
    #[serde(flatten)]
    pub movement: Option<NodeMovement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEdge {
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub source: [f64; 3],
    pub target: [f64; 3],
    pub color: Rgba,
    pub width: f64,
}

/// Which half of a decomposed movement vector a connector draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementLeg {
    /// First-dataset anchor to centroid.
    FirstToCentroid,
    /// Centroid to second-dataset anchor.
    CentroidToSecond,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEdge {
    pub node_id: NodeId,
    pub leg: MovementLeg,
    pub source: [f64; 3],
    pub target: [f64; 3],
    pub color: Rgba,
    pub width: f64,
}

/// A normalized outline polyline of the active geographic shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPath {
    pub path: Vec<[f64; 3]>,
    pub color: Rgba,
}

/// A horizontal plane marking one distinct node time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalPlane {
    pub time: f64,
    pub z: f64,
    pub in_window: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_endpoints_accept_ids_and_embedded_nodes() {
        let payload = TreeSequencePayload::from_json_str(
            r#"{
                "nodes": [
                    {"id": 0, "time": 0.0, "is_sample": true, "location": {"x": 1.0, "y": 2.0}},
                    {"id": 1, "time": 3.5, "is_sample": false, "log_time": 1.25, "individual": -1}
                ],
                "edges": [
                    {"source": 1, "target": 0, "left": 0.0, "right": 100.0},
                    {"source": {"id": 1, "time": 3.5}, "target": {"id": 0}}
                ]
            }"#,
        )
        .unwrap();

        let (graph, metadata) = payload.split();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges, vec![GraphEdge::new(1, 0), GraphEdge::new(1, 0)]);
        assert!(metadata.coordinate_system_detection.is_none());
        assert_eq!(graph.nodes[0].location, Some(Location::new(1.0, 2.0)));
        assert!(graph.nodes[1].location.is_none());
        assert!(!graph.nodes[1].is_combined);
    }

    #[test]
    fn metadata_detection_is_parsed() {
        let payload = TreeSequencePayload::from_json_str(
            r#"{
                "nodes": [],
                "edges": [],
                "metadata": {
                    "num_nodes": 0,
                    "coordinate_system_detection": {
                        "likely_crs": "EPSG:4326",
                        "confidence": 0.95,
                        "reasoning": "fits",
                        "bounds": [10.0, 20.0, 30.0, 40.0],
                        "suggested_geographic_mode": "eastern_hemisphere"
                    }
                }
            }"#,
        )
        .unwrap();

        let detection = payload.metadata.coordinate_system_detection.unwrap();
        assert_eq!(detection.likely_crs, "EPSG:4326");
        assert_eq!(detection.bounds, Some([10.0, 20.0, 30.0, 40.0]));
        assert_eq!(
            detection.suggested_geographic_mode.as_deref(),
            Some("eastern_hemisphere")
        );
    }

    #[test]
    fn undirected_key_ignores_direction() {
        assert_eq!(GraphEdge::new(7, 3).undirected_key(), (3, 7));
        assert_eq!(GraphEdge::new(3, 7).undirected_key(), (3, 7));
        assert!(GraphEdge::new(4, 4).is_self_loop());
    }
}
