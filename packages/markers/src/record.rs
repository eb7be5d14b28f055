//! Strict parsing of clicked record features.
//!
//! Tile and query data are loosely typed, so every clicked feature is
//! validated before it can become the selected record. A feature that
//! fails validation is rejected with a [`MarkerError`] and the caller is
//! expected to ignore the click.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::MarkerError;

/// A validated record point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFeature {
    /// Record id as a string. Integer ids are stringified.
    pub id: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub postcode: Option<String>,
    /// Original imported row.
    pub json: Option<Value>,
}

impl RecordFeature {
    /// Validates a `GeoJSON` feature.
    ///
    /// # Errors
    ///
    /// * If the geometry is missing, not a point or not finite
    /// * If the `id` property is missing or not a string or integer
    /// * If an optional property is present with the wrong type
    pub fn from_feature(feature: &geojson::Feature) -> Result<Self, MarkerError> {
        let geometry = feature.geometry.as_ref().ok_or(MarkerError::MissingGeometry)?;
        let geojson::Value::Point(position) = &geometry.value else {
            return Err(MarkerError::NotAPoint);
        };
        let coordinates = match position.as_slice() {
            [lng, lat, ..] if lng.is_finite() && lat.is_finite() => [*lng, *lat],
            _ => return Err(MarkerError::InvalidCoordinates),
        };

        let empty = Map::new();
        let properties = feature.properties.as_ref().unwrap_or(&empty);

        let id = match properties.get("id") {
            None | Some(Value::Null) => return Err(MarkerError::MissingId),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            Some(_) => return Err(MarkerError::InvalidId),
        };

        Ok(Self {
            id,
            coordinates,
            name: optional_string(properties, "name")?,
            phone: optional_string(properties, "phone")?,
            email: optional_string(properties, "email")?,
            postcode: postcode(properties)?,
            json: properties.get("json").filter(|v| !v.is_null()).cloned(),
        })
    }
}

fn optional_string(properties: &Map<String, Value>, name: &str) -> Result<Option<String>, MarkerError> {
    match properties.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(MarkerError::InvalidProperty {
            name: name.to_string(),
        }),
    }
}

/// Reads `postcodeData.postcode`.
///
/// Vector tiles flatten nested properties into JSON strings, so the
/// object may arrive encoded.
fn postcode(properties: &Map<String, Value>) -> Result<Option<String>, MarkerError> {
    let invalid = || MarkerError::InvalidProperty {
        name: "postcodeData".to_string(),
    };

    let decoded;
    let data = match properties.get("postcodeData") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => {
            decoded = serde_json::from_str::<Value>(s).map_err(|_| invalid())?;
            &decoded
        }
        Some(other) => other,
    };

    match data {
        Value::Null => Ok(None),
        Value::Object(fields) => optional_string(fields, "postcode"),
        _ => Err(invalid()),
    }
}

/// The record picked by the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedRecord {
    /// External data source the record came from.
    pub source_id: String,
    /// Record id.
    pub record_id: String,
    pub feature: RecordFeature,
}

impl SelectedRecord {
    /// Validates a clicked feature from `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError`] if the feature fails validation.
    pub fn from_click(source_id: &str, feature: &geojson::Feature) -> Result<Self, MarkerError> {
        let feature = RecordFeature::from_feature(feature)?;
        Ok(Self {
            source_id: source_id.to_string(),
            record_id: feature.id.clone(),
            feature,
        })
    }

    /// Point feature used to draw the selected marker.
    #[must_use]
    pub fn to_point_feature(&self) -> geojson::Feature {
        let mut properties = Map::new();
        properties.insert("id".to_string(), Value::String(self.record_id.clone()));
        properties.insert("sourceId".to_string(), Value::String(self.source_id.clone()));

        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(
                self.feature.coordinates.to_vec(),
            ))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}
