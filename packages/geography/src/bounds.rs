//! Bounding boxes and anchor points for `GeoJSON` geometries.

use geo::{BoundingRect, Centroid};
use report_map_geography_models::BoundingBox;

/// Converts a `GeoJSON` geometry into a [`geo::Geometry`].
fn to_geo(geometry: &geojson::Geometry) -> Option<geo::Geometry<f64>> {
    geometry.clone().try_into().ok()
}

/// Compute the bounding box of a `GeoJSON` geometry.
///
/// Returns `None` for empty geometries and for geometries that do not
/// convert cleanly (e.g. polygons clipped to nothing at a tile edge).
#[must_use]
pub fn bounding_box(geometry: &geojson::Geometry) -> Option<BoundingBox> {
    let rect = to_geo(geometry)?.bounding_rect()?;
    let bbox = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);

    [bbox.west, bbox.south, bbox.east, bbox.north]
        .iter()
        .all(|v| v.is_finite())
        .then_some(bbox)
}

/// Returns the `(longitude, latitude)` used to anchor a label for the
/// geometry: the point itself for points, the centroid otherwise.
#[must_use]
pub fn anchor_point(geometry: &geojson::Geometry) -> Option<(f64, f64)> {
    let point = match to_geo(geometry)? {
        geo::Geometry::Point(p) => p,
        other => other.centroid()?,
    };

    (point.x().is_finite() && point.y().is_finite()).then(|| (point.x(), point.y()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(value: serde_json::Value) -> geojson::Geometry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn polygon_bounds() {
        let polygon = geometry(serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[-0.1, 51.5], [0.1, 51.5], [0.1, 51.7], [-0.1, 51.7], [-0.1, 51.5]]]
        }));

        let bbox = bounding_box(&polygon).unwrap();
        assert!((bbox.west - -0.1).abs() < 1e-12);
        assert!((bbox.south - 51.5).abs() < 1e-12);
        assert!((bbox.east - 0.1).abs() < 1e-12);
        assert!((bbox.north - 51.7).abs() < 1e-12);
    }

    #[test]
    fn point_anchor_is_the_point() {
        let point = geometry(serde_json::json!({ "type": "Point", "coordinates": [-1.5, 53.8] }));
        assert_eq!(anchor_point(&point), Some((-1.5, 53.8)));
    }

    #[test]
    fn polygon_anchor_is_centroid() {
        let square = geometry(serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
        }));

        let (x, y) = anchor_point(&square).unwrap();
        assert!((x - 1.0).abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_multipolygon_has_no_bounds() {
        let empty = geometry(serde_json::json!({ "type": "MultiPolygon", "coordinates": [] }));
        assert!(bounding_box(&empty).is_none());
    }
}
