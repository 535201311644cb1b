use crate::model::NodeId;

/// Which side of a two-dataset comparison a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    First,
    Second,
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dataset::First => f.write_str("first"),
            Dataset::Second => f.write_str("second"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node {node_id} in the {dataset} dataset has no spatial location")]
    MissingLocationData { node_id: NodeId, dataset: Dataset },

    #[error("node {node_id} has no corresponding node in the second dataset")]
    MissingCorrespondingNode { node_id: NodeId },

    #[error("no node carries both spatial coordinates")]
    EmptySpatialDataset,

    #[error("invalid geographic shape: {0}")]
    InvalidShape(String),

    #[error("invalid display parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
