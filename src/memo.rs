//! Content-hash keys and a cache that keeps the quadratic combine step out of
//! parameter-only changes.

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::DisplayParams;
use crate::dedup;
use crate::error::Result;
use crate::geo::{GeographicContext, GeographicMode, GeographicShape};
use crate::model::Graph;
use crate::scene::{self, Scene};

/// SHA-256 over everything in a graph that layout depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatasetKey([u8; 32]);

impl DatasetKey {
    pub fn of(graph: &Graph) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((graph.nodes.len() as u64).to_le_bytes());
        for node in &graph.nodes {
            hasher.update(node.id.to_le_bytes());
            hasher.update(node.time.to_bits().to_le_bytes());
            match &node.location {
                Some(loc) => {
                    hasher.update([1u8]);
                    hasher.update(loc.x.to_bits().to_le_bytes());
                    hasher.update(loc.y.to_bits().to_le_bytes());
                }
                None => hasher.update([0u8]),
            }
            hasher.update([node.is_sample as u8, node.is_combined as u8]);
            hasher.update((node.combined_nodes.len() as u64).to_le_bytes());
            for id in &node.combined_nodes {
                hasher.update(id.to_le_bytes());
            }
        }
        hasher.update((graph.edges.len() as u64).to_le_bytes());
        for edge in &graph.edges {
            hasher.update(edge.source.to_le_bytes());
            hasher.update(edge.target.to_le_bytes());
        }
        DatasetKey(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// SHA-256 over the display parameters and the geographic overlay in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamsKey([u8; 32]);

#[derive(Serialize)]
struct ParamsTuple<'a> {
    params: &'a DisplayParams,
    mode: GeographicMode,
    anchor: bool,
    shape: Option<&'a GeographicShape>,
}

impl ParamsKey {
    pub fn of(params: &DisplayParams, geo: &GeographicContext) -> Result<Self> {
        let tuple = ParamsTuple {
            params,
            mode: geo.mode,
            anchor: geo.anchor,
            shape: geo.shape.as_ref(),
        };
        let bytes = serde_json::to_vec(&tuple)?;
        Ok(ParamsKey(Sha256::digest(&bytes).into()))
    }
}

/// Caches combined graphs per dataset and scenes per (dataset, parameters).
#[derive(Default)]
pub struct SceneCache {
    combined: FxHashMap<DatasetKey, Arc<Graph>>,
    scenes: FxHashMap<(DatasetKey, ParamsKey), Option<Arc<Scene>>>,
    combine_runs: usize,
}

impl SceneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The combined form of `graph`, computed at most once per dataset.
    pub fn combined(&mut self, graph: &Graph) -> Arc<Graph> {
        let key = DatasetKey::of(graph);
        self.combined_for(key, graph)
    }

    fn combined_for(&mut self, key: DatasetKey, graph: &Graph) -> Arc<Graph> {
        if let Some(hit) = self.combined.get(&key) {
            return Arc::clone(hit);
        }
        self.combine_runs += 1;
        let combined = Arc::new(dedup::combine(&graph.nodes, &graph.edges));
        self.combined.insert(key, Arc::clone(&combined));
        combined
    }

    /// Scene for `graph` under `params`, reusing earlier work where the keys match.
    pub fn scene(
        &mut self,
        graph: &Graph,
        geo: &GeographicContext,
        params: &DisplayParams,
    ) -> Result<Option<Arc<Scene>>> {
        let dataset = DatasetKey::of(graph);
        let key = (dataset, ParamsKey::of(params, geo)?);
        if let Some(hit) = self.scenes.get(&key) {
            debug!("Scene cache hit for dataset {}", &dataset.to_hex()[..12]);
            return Ok(hit.clone());
        }

        let built = if params.combine_nodes {
            let combined = self.combined_for(dataset, graph);
            scene::layout(&combined, geo, params)
        } else {
            scene::layout(graph, geo, params)
        }
        .map(Arc::new);

        self.scenes.insert(key, built.clone());
        Ok(built)
    }

    /// How many times the combine step actually ran.
    pub fn combine_runs(&self) -> usize {
        self.combine_runs
    }

    pub fn clear(&mut self) {
        self.combined.clear();
        self.scenes.clear();
    }
}
