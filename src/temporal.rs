//! Depth (Z) placement from node time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{GraphNode, NodeId};

/// Floor applied before taking logs so that time zero stays finite.
pub const LOG_EPSILON: f64 = 1e-4;

/// Largest jitter offset, as a fraction of one temporal spacing unit.
pub const JITTER_FRACTION: f64 = 0.05;

/// How distinct times are spread along the depth axis.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SpacingMode {
    /// One spacing unit per distinct time, whatever the numeric gap.
    #[default]
    Equal,
    /// Proportional to elapsed time.
    Linear,
    /// Proportional to log time: recent generations spread out, deep time compressed.
    Log,
}

/// Depth of `time` given the sorted, deduplicated list of all times.
///
/// Every mode returns 0 when fewer than two distinct times exist.
pub fn z_of(time: f64, sorted_unique_times: &[f64], temporal_spacing: f64, mode: SpacingMode) -> f64 {
    let n = sorted_unique_times.len();
    if n <= 1 {
        return 0.0;
    }
    let steps = (n - 1) as f64;
    let min = sorted_unique_times[0];
    let max = sorted_unique_times[n - 1];

    match mode {
        SpacingMode::Equal => {
            let index = sorted_unique_times.partition_point(|&t| t < time);
            index as f64 * temporal_spacing
        }
        SpacingMode::Linear => {
            let range = max - min;
            if range <= 0.0 {
                return 0.0;
            }
            (time - min) / range * steps * temporal_spacing
        }
        SpacingMode::Log => {
            let log_min = log_time(min);
            let range = log_time(max) - log_min;
            if range <= 0.0 {
                return 0.0;
            }
            (log_time(time) - log_min) / range * steps * temporal_spacing
        }
    }
}

fn log_time(time: f64) -> f64 {
    time.max(LOG_EPSILON).ln()
}

/// Deterministic depth offset for a node, within `±JITTER_FRACTION` of one spacing
/// unit. The same id always yields the same offset.
pub fn jitter(id: NodeId, temporal_spacing: f64) -> f64 {
    let digest = Sha256::digest(id.to_le_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let unit = u64::from_le_bytes(bytes) as f64 / u64::MAX as f64;
    (unit * 2.0 - 1.0) * JITTER_FRACTION * temporal_spacing
}

/// The distinct times of one dataset, ready to place nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    times: Vec<f64>,
}

impl TimeAxis {
    pub fn new(times: impl IntoIterator<Item = f64>) -> Self {
        let mut times: Vec<f64> = times.into_iter().filter(|t| t.is_finite()).collect();
        times.sort_by(f64::total_cmp);
        times.dedup();
        TimeAxis { times }
    }

    pub fn from_nodes(nodes: &[GraphNode]) -> Self {
        Self::new(nodes.iter().map(|n| n.time))
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn z_of(&self, time: f64, temporal_spacing: f64, mode: SpacingMode) -> f64 {
        z_of(time, &self.times, temporal_spacing, mode)
    }

    /// Depth of a node, jitter included when asked for. Samples never jitter.
    pub fn node_z(
        &self,
        node: &GraphNode,
        temporal_spacing: f64,
        mode: SpacingMode,
        with_jitter: bool,
    ) -> f64 {
        let z = self.z_of(node.time, temporal_spacing, mode);
        if with_jitter && !node.is_sample && self.times.len() > 1 {
            z + jitter(node.id, temporal_spacing)
        } else {
            z
        }
    }
}
