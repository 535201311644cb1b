//! Geographic overlays and the choice of whether they anchor the spatial frame.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::PayloadMetadata;

/// Extended eastern hemisphere box, Antarctica excluded: [min_x, min_y, max_x, max_y].
pub const EASTERN_HEMISPHERE_BOUNDS: [f64; 4] = [-15.0, -60.0, 180.0, 75.0];

pub const UNIT_GRID_BOUNDS: [f64; 4] = [0.0, 0.0, 1.0, 1.0];

/// Simplified eastern hemisphere outline (lon, lat).
const EASTERN_HEMISPHERE_OUTLINE: [[f64; 2]; 22] = [
    [-15.0, -60.0],
    [-10.0, -60.0],
    [0.0, -60.0],
    [30.0, -60.0],
    [45.0, -35.0],
    [60.0, -25.0],
    [80.0, -10.0],
    [100.0, 10.0],
    [120.0, 25.0],
    [140.0, 35.0],
    [160.0, 50.0],
    [180.0, 60.0],
    [180.0, 75.0],
    [150.0, 75.0],
    [120.0, 70.0],
    [90.0, 65.0],
    [60.0, 55.0],
    [30.0, 60.0],
    [0.0, 70.0],
    [-10.0, 65.0],
    [-15.0, 60.0],
    [-15.0, -60.0],
];

const UNIT_GRID_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
    MultiLineString { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    /// Every polyline or ring of the geometry.
    pub fn lines(&self) -> Vec<&[[f64; 2]]> {
        match self {
            Geometry::LineString { coordinates } => vec![coordinates.as_slice()],
            Geometry::Polygon { coordinates } | Geometry::MultiLineString { coordinates } => {
                coordinates.iter().map(Vec::as_slice).collect()
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flat_map(|polygon| polygon.iter().map(Vec::as_slice))
                .collect(),
        }
    }
}

/// An overlay outline with its real-world extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicShape {
    #[serde(default)]
    pub name: Option<String>,
    /// [min_x, min_y, max_x, max_y]
    pub bounds: [f64; 4],
    #[serde(default)]
    pub geometries: Vec<Geometry>,
}

impl GeographicShape {
    /// Parse a shape document. Accepts a bare geometry, a `GeometryCollection`, a
    /// `FeatureCollection`, or a `{bounds, geometries}` object. Bounds are computed
    /// from the geometry when the document does not carry them.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(s)?;
        Self::from_value(&doc)
    }

    pub fn from_value(doc: &Value) -> Result<Self> {
        let name = doc.get("name").and_then(Value::as_str).map(str::to_string);

        let mut geometries = Vec::new();
        collect_geometries(doc, &mut geometries);

        let bounds = match doc.get("bounds") {
            Some(b) if !b.is_null() => serde_json::from_value::<[f64; 4]>(b.clone())?,
            _ => geometry_bounds(&geometries)
                .ok_or_else(|| Error::InvalidShape("no bounds and no coordinates".into()))?,
        };
        let [min_x, min_y, max_x, max_y] = bounds;
        if !bounds.iter().all(|v| v.is_finite()) || min_x > max_x || min_y > max_y {
            return Err(Error::InvalidShape(format!("malformed bounds {:?}", bounds)));
        }

        debug!(
            "Loaded shape {:?} with {} geometries, bounds {:?}",
            name,
            geometries.len(),
            bounds
        );
        Ok(GeographicShape {
            name,
            bounds,
            geometries,
        })
    }

    /// Square grid outline over the unit square.
    pub fn unit_grid(size: usize) -> Self {
        let size = size.max(1);
        let mut geometries = Vec::with_capacity(2 * (size + 1));
        for i in 0..=size {
            let t = i as f64 / size as f64;
            geometries.push(Geometry::LineString {
                coordinates: vec![[t, 0.0], [t, 1.0]],
            });
        }
        for i in 0..=size {
            let t = i as f64 / size as f64;
            geometries.push(Geometry::LineString {
                coordinates: vec![[0.0, t], [1.0, t]],
            });
        }
        GeographicShape {
            name: Some(format!("{}x{} Unit Grid", size, size)),
            bounds: UNIT_GRID_BOUNDS,
            geometries,
        }
    }

    pub fn eastern_hemisphere() -> Self {
        GeographicShape {
            name: Some("Eastern Hemisphere".to_string()),
            bounds: EASTERN_HEMISPHERE_BOUNDS,
            geometries: vec![Geometry::Polygon {
                coordinates: vec![EASTERN_HEMISPHERE_OUTLINE.to_vec()],
            }],
        }
    }
}

fn collect_geometries(doc: &Value, out: &mut Vec<Geometry>) {
    match doc.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            for feature in doc.get("features").and_then(Value::as_array).into_iter().flatten() {
                collect_geometries(feature, out);
            }
        }
        Some("Feature") => {
            if let Some(geometry) = doc.get("geometry") {
                collect_geometries(geometry, out);
            }
        }
        Some("LineString" | "Polygon" | "MultiPolygon" | "MultiLineString") => {
            match serde_json::from_value::<Geometry>(doc.clone()) {
                Ok(geometry) => out.push(geometry),
                Err(e) => warn!("Skipping malformed geometry: {}", e),
            }
        }
        _ => {
            for geometry in doc.get("geometries").and_then(Value::as_array).into_iter().flatten() {
                collect_geometries(geometry, out);
            }
        }
    }
}

fn geometry_bounds(geometries: &[Geometry]) -> Option<[f64; 4]> {
    let mut bounds: Option<[f64; 4]> = None;
    for geometry in geometries {
        for line in geometry.lines() {
            for &[x, y] in line {
                let b = bounds.get_or_insert([x, y, x, y]);
                b[0] = b[0].min(x);
                b[1] = b[1].min(y);
                b[2] = b[2].max(x);
                b[3] = b[3].max(y);
            }
        }
    }
    bounds
}

/// How the planar frame relates to real-world geography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GeographicMode {
    /// No overlay; the frame follows the data.
    None,
    UnitGrid,
    EasternHemisphere,
    /// A caller-supplied shape.
    Custom,
}

impl GeographicMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(GeographicMode::None),
            "unit_grid" => Some(GeographicMode::UnitGrid),
            "eastern_hemisphere" => Some(GeographicMode::EasternHemisphere),
            "custom" => Some(GeographicMode::Custom),
            _ => None,
        }
    }

    /// Default mode for a payload, read from its coordinate-system detection.
    pub fn suggested(metadata: &PayloadMetadata) -> Self {
        let detection = metadata.coordinate_system_detection.as_ref();
        let named = detection
            .and_then(|d| d.suggested_geographic_mode.as_deref())
            .or(metadata.suggested_geographic_mode.as_deref())
            .and_then(Self::from_name);
        if let Some(mode) = named {
            return mode;
        }
        match detection {
            Some(d) => Self::for_crs(&d.likely_crs, d.bounds),
            None => GeographicMode::None,
        }
    }

    fn for_crs(crs: &str, bounds: Option<[f64; 4]>) -> Self {
        match (crs, bounds) {
            ("none", _) => GeographicMode::None,
            ("EPSG:4326", Some([min_x, min_y, _, _]))
                if (-15.0..=180.0).contains(&min_x) && (-60.0..=75.0).contains(&min_y) =>
            {
                GeographicMode::EasternHemisphere
            }
            _ => GeographicMode::UnitGrid,
        }
    }
}

/// The overlay in effect for one render and whether it anchors the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicContext {
    pub mode: GeographicMode,
    pub shape: Option<GeographicShape>,
    pub anchor: bool,
}

impl GeographicContext {
    pub fn none() -> Self {
        GeographicContext {
            mode: GeographicMode::None,
            shape: None,
            anchor: false,
        }
    }

    /// Settle mode, shape and anchoring from caller choices and payload metadata.
    ///
    /// Anchoring defaults on for real geography and custom shapes. A unit grid only
    /// anchors when the data was detected as lying in the unit square; planar data
    /// in other units keeps a data-derived frame.
    pub fn resolve(
        requested: Option<GeographicMode>,
        anchor_override: Option<bool>,
        custom: Option<&GeographicShape>,
        metadata: &PayloadMetadata,
    ) -> Self {
        let mode = requested.unwrap_or_else(|| {
            if custom.is_some() {
                GeographicMode::Custom
            } else {
                GeographicMode::suggested(metadata)
            }
        });

        let shape = match mode {
            GeographicMode::None => None,
            GeographicMode::UnitGrid => Some(GeographicShape::unit_grid(UNIT_GRID_SIZE)),
            GeographicMode::EasternHemisphere => Some(GeographicShape::eastern_hemisphere()),
            GeographicMode::Custom => {
                if custom.is_none() {
                    warn!("Custom geographic mode requested without a shape; ignoring");
                }
                custom.cloned()
            }
        };
        let Some(shape) = shape else {
            return GeographicContext::none();
        };

        let detected_unit_grid = metadata
            .coordinate_system_detection
            .as_ref()
            .is_some_and(|d| d.likely_crs == "unit_grid");
        let default_anchor = match mode {
            GeographicMode::EasternHemisphere | GeographicMode::Custom => true,
            GeographicMode::UnitGrid => detected_unit_grid,
            GeographicMode::None => false,
        };

        GeographicContext {
            mode,
            shape: Some(shape),
            anchor: anchor_override.unwrap_or(default_anchor),
        }
    }

    /// Shape whose bounds anchor the frame, if anchoring is on.
    pub fn anchor_shape(&self) -> Option<&GeographicShape> {
        if self.anchor {
            self.shape.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoordinateSystemDetection;

    fn detected(crs: &str, bounds: Option<[f64; 4]>, suggested: Option<&str>) -> PayloadMetadata {
        PayloadMetadata {
            coordinate_system_detection: Some(CoordinateSystemDetection {
                likely_crs: crs.to_string(),
                confidence: 0.9,
                bounds,
                suggested_geographic_mode: suggested.map(str::to_string),
            }),
            suggested_geographic_mode: None,
        }
    }

    #[test]
    fn suggested_mode_prefers_explicit_suggestion() {
        let md = detected("EPSG:4326", Some([0.0, 0.0, 1.0, 1.0]), Some("unit_grid"));
        assert_eq!(GeographicMode::suggested(&md), GeographicMode::UnitGrid);
    }

    #[test]
    fn suggested_mode_falls_back_to_crs() {
        let eastern = detected("EPSG:4326", Some([10.0, 20.0, 40.0, 50.0]), None);
        assert_eq!(GeographicMode::suggested(&eastern), GeographicMode::EasternHemisphere);

        let western = detected("EPSG:4326", Some([-120.0, 20.0, -70.0, 50.0]), None);
        assert_eq!(GeographicMode::suggested(&western), GeographicMode::UnitGrid);

        let planar = detected("planar", Some([0.0, 0.0, 20.0, 20.0]), None);
        assert_eq!(GeographicMode::suggested(&planar), GeographicMode::UnitGrid);

        assert_eq!(
            GeographicMode::suggested(&PayloadMetadata::default()),
            GeographicMode::None
        );
    }

    #[test]
    fn unit_grid_anchors_only_for_unit_data() {
        let unit = detected("unit_grid", Some([0.1, 0.1, 0.9, 0.9]), Some("unit_grid"));
        let ctx = GeographicContext::resolve(None, None, None, &unit);
        assert_eq!(ctx.mode, GeographicMode::UnitGrid);
        assert!(ctx.anchor);

        let planar = detected("planar", Some([0.0, 0.0, 20.0, 20.0]), Some("unit_grid"));
        let ctx = GeographicContext::resolve(None, None, None, &planar);
        assert!(!ctx.anchor);
        assert!(ctx.anchor_shape().is_none());
        assert!(ctx.shape.is_some());
    }

    #[test]
    fn custom_shape_is_used_when_supplied() {
        let shape = GeographicShape::from_json_str(
            r#"{"type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 2], [0, 0]]]}"#,
        )
        .unwrap();
        assert_eq!(shape.bounds, [0.0, 0.0, 4.0, 2.0]);

        let ctx = GeographicContext::resolve(None, None, Some(&shape), &PayloadMetadata::default());
        assert_eq!(ctx.mode, GeographicMode::Custom);
        assert_eq!(ctx.anchor_shape().map(|s| s.bounds), Some([0.0, 0.0, 4.0, 2.0]));

        let ctx = GeographicContext::resolve(
            Some(GeographicMode::Custom),
            None,
            None,
            &PayloadMetadata::default(),
        );
        assert_eq!(ctx, GeographicContext::none());
    }

    #[test]
    fn feature_collections_and_explicit_bounds_parse() {
        let shape = GeographicShape::from_json_str(
            r#"{
                "type": "FeatureCollection",
                "name": "islands",
                "bounds": [-1.0, -1.0, 1.0, 1.0],
                "features": [
                    {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
                    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(shape.name.as_deref(), Some("islands"));
        assert_eq!(shape.bounds, [-1.0, -1.0, 1.0, 1.0]);
        assert_eq!(shape.geometries.len(), 1);
    }

    #[test]
    fn shape_without_coordinates_or_bounds_is_rejected() {
        let err = GeographicShape::from_json_str(r#"{"type": "GeometryCollection", "geometries": []}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn builtin_shapes_have_expected_extent() {
        let grid = GeographicShape::unit_grid(10);
        assert_eq!(grid.bounds, UNIT_GRID_BOUNDS);
        assert_eq!(grid.geometries.len(), 22);

        let eastern = GeographicShape::eastern_hemisphere();
        assert_eq!(eastern.bounds, EASTERN_HEMISPHERE_BOUNDS);
        assert_eq!(eastern.geometries[0].lines()[0].len(), 22);
    }
}
