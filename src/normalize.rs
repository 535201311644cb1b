//! Shared planar frame for one or two node sets.

use log::debug;
use serde::Serialize;

use crate::error::{Dataset, Error, Result};
use crate::geo::GeographicShape;
use crate::model::{GraphNode, Location, RenderPath, Rgba};

/// Center and scale mapping raw planar coordinates into render space.
///
/// `max_scale` is never zero: degenerate extents fall back to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateTransform {
    pub center_x: f64,
    pub center_y: f64,
    pub max_scale: f64,
    /// Extent of the collected node coordinates, [min_x, min_y, max_x, max_y].
    pub data_bounds: [f64; 4],
}

impl CoordinateTransform {
    /// Frame centered on `bounds` and scaled by their larger side.
    pub fn from_bounds(bounds: [f64; 4], data_bounds: [f64; 4]) -> Self {
        let [min_x, min_y, max_x, max_y] = bounds;
        let extent = (max_x - min_x).max(max_y - min_y);
        let max_scale = if extent.is_finite() && extent > 0.0 {
            extent
        } else {
            1.0
        };
        CoordinateTransform {
            center_x: (min_x + max_x) / 2.0,
            center_y: (min_y + max_y) / 2.0,
            max_scale,
            data_bounds,
        }
    }

    pub fn normalize(&self, x: f64, y: f64, spatial_spacing: f64) -> [f64; 2] {
        [
            (x - self.center_x) / self.max_scale * spatial_spacing,
            (y - self.center_y) / self.max_scale * spatial_spacing,
        ]
    }

    pub fn normalize_location(&self, location: &Location, spatial_spacing: f64) -> [f64; 2] {
        self.normalize(location.x, location.y, spatial_spacing)
    }

    /// Normalized planar position of a node that must be located.
    pub fn normalize_node(
        &self,
        node: &GraphNode,
        spatial_spacing: f64,
        dataset: Dataset,
    ) -> Result<[f64; 2]> {
        node.planar_location()
            .map(|loc| self.normalize_location(loc, spatial_spacing))
            .ok_or(Error::MissingLocationData {
                node_id: node.id,
                dataset,
            })
    }

    /// Outline polylines of `shape` in render space, laid on the z = 0 plane.
    pub fn shape_paths(
        &self,
        shape: &GeographicShape,
        spatial_spacing: f64,
        color: Rgba,
    ) -> Vec<RenderPath> {
        shape
            .geometries
            .iter()
            .flat_map(|g| g.lines())
            .filter(|line| line.len() >= 2)
            .map(|line| RenderPath {
                path: line
                    .iter()
                    .map(|&[x, y]| {
                        let [nx, ny] = self.normalize(x, y, spatial_spacing);
                        [nx, ny, 0.0]
                    })
                    .collect(),
                color,
            })
            .collect()
    }
}

/// Compute the frame shared by `primary` and, for diffs, `secondary`.
///
/// Returns `None` when no primary node has both coordinates, which tells the caller
/// there is nothing spatial to draw. When `anchor` is given its bounds decide center
/// and scale so the overlay and the data stay aligned.
pub fn compute_transform(
    primary: &[GraphNode],
    secondary: Option<&[GraphNode]>,
    anchor: Option<&GeographicShape>,
) -> Option<CoordinateTransform> {
    let mut bounds = extend_bounds(None, primary)?;
    if let Some(secondary) = secondary {
        bounds = extend_bounds(Some(bounds), secondary).unwrap_or(bounds);
    }

    let transform = match anchor {
        Some(shape) => CoordinateTransform::from_bounds(shape.bounds, bounds),
        None => CoordinateTransform::from_bounds(bounds, bounds),
    };
    debug!(
        "Coordinate transform: center ({:.4}, {:.4}), scale {:.4}, data bounds {:?}, anchored: {}",
        transform.center_x,
        transform.center_y,
        transform.max_scale,
        transform.data_bounds,
        anchor.is_some()
    );
    Some(transform)
}

fn extend_bounds(start: Option<[f64; 4]>, nodes: &[GraphNode]) -> Option<[f64; 4]> {
    let mut bounds = start;
    for loc in nodes.iter().filter_map(GraphNode::planar_location) {
        let b = bounds.get_or_insert([loc.x, loc.y, loc.x, loc.y]);
        b[0] = b[0].min(loc.x);
        b[1] = b[1].min(loc.y);
        b[2] = b[2].max(loc.x);
        b[3] = b[3].max(loc.y);
    }
    bounds
}
