//! Caller-selected display parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::GeographicMode;
use crate::model::NodeId;
use crate::style::TemporalFilter;
use crate::temporal::SpacingMode;

/// Everything a render cycle may vary without the input data changing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayParams {
    /// Rendered footprint of the planar frame, in render units.
    pub spatial_spacing: f64,
    /// Depth distance of one spacing step.
    pub temporal_spacing: f64,
    pub spacing_mode: SpacingMode,
    pub node_radius: f64,
    pub sample_radius_scale: f64,
    pub node_opacity: f64,
    pub edge_width: f64,
    pub edge_opacity: f64,
    /// Add the per-id depth jitter.
    pub jitter: bool,
    /// `None` picks the mode suggested by payload metadata.
    pub geographic_mode: Option<GeographicMode>,
    /// `None` keeps the mode's default anchoring.
    pub anchor_to_shape: Option<bool>,
    pub temporal_filter: TemporalFilter,
    pub selected_node: Option<NodeId>,
    /// Fold indistinguishable ancestors before layout (single-dataset scenes).
    pub combine_nodes: bool,
}

impl Default for DisplayParams {
    fn default() -> Self {
        DisplayParams {
            spatial_spacing: 160.0,
            temporal_spacing: 12.0,
            spacing_mode: SpacingMode::Equal,
            node_radius: 1.5,
            sample_radius_scale: 1.2,
            node_opacity: 1.0,
            edge_width: 0.5,
            edge_opacity: 0.8,
            jitter: true,
            geographic_mode: None,
            anchor_to_shape: None,
            temporal_filter: TemporalFilter::default(),
            selected_node: None,
            combine_nodes: true,
        }
    }
}

impl DisplayParams {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let params: DisplayParams = serde_json::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("spatial_spacing", self.spatial_spacing),
            ("temporal_spacing", self.temporal_spacing),
            ("node_radius", self.node_radius),
            ("sample_radius_scale", self.sample_radius_scale),
            ("edge_width", self.edge_width),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParams(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("node_opacity", self.node_opacity),
            ("edge_opacity", self.edge_opacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidParams(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if let Some([min, max]) = self.temporal_filter.window {
            if min.is_nan() || max.is_nan() || min > max {
                return Err(Error::InvalidParams(format!(
                    "temporal window [{}, {}] is empty",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FilterMode;

    #[test]
    fn partial_json_keeps_defaults() {
        let params = DisplayParams::from_json_str(
            r#"{
                "spacing_mode": "log",
                "temporal_filter": {"window": [10, 20], "mode": "hide"},
                "geographic_mode": "eastern_hemisphere"
            }"#,
        )
        .unwrap();
        assert_eq!(params.spacing_mode, SpacingMode::Log);
        assert_eq!(params.temporal_filter.window, Some([10.0, 20.0]));
        assert_eq!(params.temporal_filter.mode, FilterMode::Hide);
        assert_eq!(params.geographic_mode, Some(GeographicMode::EasternHemisphere));
        assert_eq!(params.spatial_spacing, DisplayParams::default().spatial_spacing);
        assert!(params.combine_nodes);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = DisplayParams::from_json_str(r#"{"node_opacity": 1.5}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));

        let err = DisplayParams::from_json_str(r#"{"temporal_spacing": -1}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));

        let err = DisplayParams::from_json_str(r#"{"temporal_filter": {"window": [5, 1]}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn defaults_validate() {
        assert!(DisplayParams::default().validate().is_ok());
    }
}
