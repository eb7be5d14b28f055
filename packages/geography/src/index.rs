//! Lookup from GSS code to aggregate count and anchor location.

use std::collections::BTreeMap;

use report_map_geography_models::{AreaAggregate, BoundingBox, gss};

use crate::bounds;

/// One indexed area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaEntry {
    /// Human-readable area name.
    pub label: String,
    /// Record count.
    pub count: u64,
    /// Label anchor as `(longitude, latitude)`.
    pub point: Option<(f64, f64)>,
    /// Camera bounds for the area.
    pub bounds: Option<BoundingBox>,
}

/// Maps GSS codes to aggregate counts and representative points.
///
/// Built from one analytics response and replaced, never patched, when
/// a new response arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaCodeIndex {
    entries: BTreeMap<String, AreaEntry>,
}

impl AreaCodeIndex {
    /// Builds an index from aggregate rows.
    ///
    /// Rows with an empty code are skipped. If a code appears more than
    /// once the last row wins.
    #[must_use]
    pub fn from_aggregates(aggregates: &[AreaAggregate]) -> Self {
        let mut entries = BTreeMap::new();

        for aggregate in aggregates {
            if aggregate.code.is_empty() {
                log::debug!("Skipping aggregate with empty code ({})", aggregate.label);
                continue;
            }
            if !gss::is_gss_code(&aggregate.code) {
                log::debug!("Aggregate code '{}' is not a GSS code", aggregate.code);
            }

            let point = aggregate
                .representative_point
                .as_ref()
                .and_then(bounds::anchor_point);
            let area_bounds = aggregate.fit_bounds.or_else(|| {
                aggregate
                    .representative_point
                    .as_ref()
                    .and_then(bounds::bounding_box)
            });

            entries.insert(
                aggregate.code.clone(),
                AreaEntry {
                    label: aggregate.label.clone(),
                    count: aggregate.count,
                    point,
                    bounds: area_bounds,
                },
            );
        }

        Self { entries }
    }

    /// Returns the entry for a code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&AreaEntry> {
        self.entries.get(code)
    }

    /// Returns the count for a code.
    #[must_use]
    pub fn count(&self, code: &str) -> Option<u64> {
        self.entries.get(code).map(|e| e.count)
    }

    /// Returns the label anchor for a code.
    #[must_use]
    pub fn point(&self, code: &str) -> Option<(f64, f64)> {
        self.entries.get(code).and_then(|e| e.point)
    }

    /// Returns the camera bounds for a code.
    #[must_use]
    pub fn bounds(&self, code: &str) -> Option<BoundingBox> {
        self.entries.get(code).and_then(|e| e.bounds)
    }

    /// Returns `true` if the code is present.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// Iterates `(code, entry)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AreaEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates the counts in code order.
    pub fn counts(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.values().map(|e| e.count)
    }

    /// Number of indexed areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no areas are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
