//! Boundary feature collections (GeoJSON) as delivered by the boundary
//! geometry service, plus bounding-box computation for viewport fitting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BoundaryError;

/// A GeoJSON position: `[lon, lat]` with an optional trailing elevation.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum CollectionTag {
    #[default]
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum FeatureTag {
    #[default]
    Feature,
}

/// GeoJSON geometry. Only the coordinate structure is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    fn extend_bounds(&self, acc: &mut Option<Bounds>) {
        let mut add = |p: &Position| {
            if let [lon, lat, ..] = p.as_slice() {
                Bounds::include(acc, *lon, *lat);
            }
        };
        match self {
            Geometry::Point { coordinates } => add(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().for_each(add)
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().for_each(add)
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().for_each(add)
            }
            Geometry::GeometryCollection { geometries } => {
                for g in geometries {
                    g.extend_bounds(acc);
                }
            }
        }
    }
}

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    fn include(acc: &mut Option<Bounds>, lon: f64, lat: f64) {
        if !lon.is_finite() || !lat.is_finite() {
            return;
        }
        match acc {
            Some(b) => {
                b.min_lon = b.min_lon.min(lon);
                b.min_lat = b.min_lat.min(lat);
                b.max_lon = b.max_lon.max(lon);
                b.max_lat = b.max_lat.max(lat);
            }
            None => {
                *acc = Some(Bounds { min_lon: lon, min_lat: lat, max_lon: lon, max_lat: lat });
            }
        }
    }
}

/// One administrative unit's outline and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryFeature {
    #[serde(rename = "type", default)]
    tag: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// `null` geometry is legal GeoJSON; such features have no extent.
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
}

fn null_as_empty<'de, D>(de: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(de)?.unwrap_or_default())
}

impl BoundaryFeature {
    pub fn new(geometry: Option<Geometry>, properties: Map<String, Value>) -> Self {
        Self { tag: FeatureTag::Feature, id: None, geometry, properties }
    }

    /// Property value as a join/display key. Numbers compare by their
    /// decimal form; other JSON types have no key.
    pub fn property_key(&self, field: &str) -> Option<String> {
        match self.properties.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut acc = None;
        if let Some(g) = &self.geometry {
            g.extend_bounds(&mut acc);
        }
        acc
    }
}

/// A GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    tag: CollectionTag,
    pub features: Vec<BoundaryFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<BoundaryFeature>) -> Self {
        Self { tag: CollectionTag::FeatureCollection, features }
    }

    pub fn from_geojson_str(json: &str) -> Result<Self, BoundaryError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self, BoundaryError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Union of all feature extents; `None` when nothing has coordinates.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut acc = None;
        for f in &self.features {
            if let Some(g) = &f.geometry {
                g.extend_bounds(&mut acc);
            }
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_UNITS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"NAM_1": "North", "HASC_1": "XX.NO", "ADM1_CODE": 17},
             "geometry": {"type": "Polygon", "coordinates": [[[10.0, 1.0], [12.0, 1.0], [12.0, 3.0], [10.0, 1.0]]]}},
            {"type": "Feature",
             "properties": {"NAM_1": "South"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[9.5, -2.0], [11.0, -2.0], [11.0, 0.0], [9.5, -2.0]]]]}}
        ]
    }"#;

    #[test]
    fn parses_and_computes_union_bounds() {
        let fc = FeatureCollection::from_geojson_str(TWO_UNITS).unwrap();
        assert_eq!(fc.features.len(), 2);
        let b = fc.bounds().unwrap();
        assert_eq!((b.min_lon, b.min_lat, b.max_lon, b.max_lat), (9.5, -2.0, 12.0, 3.0));
    }

    #[test]
    fn numeric_properties_become_keys() {
        let fc = FeatureCollection::from_geojson_str(TWO_UNITS).unwrap();
        assert_eq!(fc.features[0].property_key("ADM1_CODE").as_deref(), Some("17"));
        assert_eq!(fc.features[0].property_key("HASC_1").as_deref(), Some("XX.NO"));
        assert_eq!(fc.features[1].property_key("HASC_1"), None);
    }

    #[test]
    fn null_geometry_and_properties_are_accepted() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":null}]}"#;
        let fc = FeatureCollection::from_geojson_str(json).unwrap();
        assert!(fc.features[0].properties.is_empty());
        assert!(fc.bounds().is_none());
    }

    #[test]
    fn wrong_collection_type_is_malformed() {
        let json = r#"{"type":"Topology","features":[]}"#;
        assert!(matches!(
            FeatureCollection::from_geojson_str(json),
            Err(BoundaryError::Malformed(_))
        ));
    }

    #[test]
    fn serializes_back_to_geojson() {
        let fc = FeatureCollection::from_geojson_str(TWO_UNITS).unwrap();
        let v = serde_json::to_value(&fc).unwrap();
        assert_eq!(v["type"], "FeatureCollection");
        assert_eq!(v["features"][0]["type"], "Feature");
        assert_eq!(v["features"][1]["geometry"]["type"], "MultiPolygon");
    }
}
