//! Turn ancestral recombination graph payloads into 3D render primitives.
//!
//! The pipeline folds indistinguishable ancestors together ([`dedup`]), frames node
//! locations in a shared planar space ([`normalize`]), places nodes in depth by time
//! ([`temporal`]) and styles them by role ([`style`]). [`scene`] strings this together
//! for one dataset and [`diff`] for two spatial inferences over the same graph.
//! Everything is a pure function of its inputs; [`memo`] offers caller-side caching.

pub mod config;
pub mod dedup;
pub mod diff;
pub mod error;
pub mod geo;
pub mod memo;
pub mod model;
pub mod normalize;
pub mod scene;
pub mod style;
pub mod temporal;

pub use config::DisplayParams;
pub use dedup::combine;
pub use diff::{diff, diff_with_transform, DiffScene};
pub use error::{Dataset, Error, Result};
pub use geo::{GeographicContext, GeographicMode, GeographicShape};
pub use memo::{DatasetKey, ParamsKey, SceneCache};
pub use model::{
    DiffEdge, Graph, GraphEdge, GraphNode, Location, NodeId, NodeRole, RenderEdge, RenderNode,
    TreeSequencePayload,
};
pub use normalize::{compute_transform, CoordinateTransform};
pub use scene::{build_scene, Scene};
pub use style::{FilterMode, StyleResolver, TemporalFilter};
pub use temporal::{z_of, SpacingMode, TimeAxis};
