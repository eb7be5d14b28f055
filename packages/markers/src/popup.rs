//! Popup content for the selected record.

use serde::Serialize;

use crate::SelectedRecord;

/// Placeholder in record URL templates.
pub const RECORD_ID_PLACEHOLDER: &str = "{record_id}";

/// A labelled popup line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupField {
    pub label: String,
    pub value: String,
}

/// What the record popup shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPopup {
    pub source_id: String,
    pub record_id: String,
    /// Popup anchor as `[longitude, latitude]`.
    pub coordinates: [f64; 2],
    pub title: String,
    pub fields: Vec<PopupField>,
    /// Link to the record in its source system.
    pub url: Option<String>,
}

/// Substitutes the record id into a URL template.
///
/// Templates without the placeholder are ignored.
#[must_use]
pub fn record_url(template: &str, record_id: &str) -> Option<String> {
    if !template.contains(RECORD_ID_PLACEHOLDER) {
        log::debug!("Record URL template has no {RECORD_ID_PLACEHOLDER}: {template}");
        return None;
    }
    Some(template.replace(RECORD_ID_PLACEHOLDER, record_id))
}

impl RecordPopup {
    /// Builds the popup for a selected record.
    #[must_use]
    pub fn new(selected: &SelectedRecord, record_url_template: Option<&str>) -> Self {
        let feature = &selected.feature;
        let fields = [
            ("Phone", &feature.phone),
            ("Email", &feature.email),
            ("Postcode", &feature.postcode),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value.as_ref().map(|value| PopupField {
                label: label.to_string(),
                value: value.clone(),
            })
        })
        .collect();

        Self {
            source_id: selected.source_id.clone(),
            record_id: selected.record_id.clone(),
            coordinates: feature.coordinates,
            title: feature
                .name
                .clone()
                .unwrap_or_else(|| selected.record_id.clone()),
            fields,
            url: record_url_template.and_then(|t| record_url(t, &selected.record_id)),
        }
    }
}
