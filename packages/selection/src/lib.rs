#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Selection state for the report map.
//!
//! Two independent pieces of state: the selected area (a GSS code kept
//! in the URL fragment) and the selected record (session only). Both may
//! be set at once. Every transition returns the [`SelectionEffect`]s the
//! host must carry out; the machine itself never touches the map.

pub mod cell;
pub mod fragment;

use report_map_geography_models::BoundingBox;
use report_map_markers::SelectedRecord;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::cell::StateCell;

/// Tabs of the area detail panel.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PanelTab {
    /// Report-wide summary.
    #[default]
    Summary,
    /// Details of the selected area.
    Selected,
}

/// Area detail panel visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelState {
    pub open: bool,
    pub tab: PanelTab,
}

/// Snapshot of the selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub selected_area_code: Option<String>,
    pub selected_record: Option<SelectedRecord>,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SelectionEffect {
    /// Move the camera to `bounds`, zooming in no further than `max_zoom`.
    #[serde(rename_all = "camelCase")]
    FitBounds { bounds: BoundingBox, max_zoom: f64 },
    OpenAreaPanel,
    CloseAreaPanel,
    SetPanelTab { tab: PanelTab },
    /// Replace the URL fragment.
    UpdateFragment { fragment: String },
    /// The selected area changed; restyle the selected outline.
    AreaChanged,
    /// The selected record changed; restyle markers and the popup.
    RecordChanged,
}

/// Selection state machine.
#[derive(Debug, Clone)]
pub struct SelectionStateMachine {
    area: StateCell<Option<String>>,
    record: StateCell<Option<SelectedRecord>>,
    panel: StateCell<PanelState>,
    fragment: String,
    fit_max_zoom: f64,
}

impl SelectionStateMachine {
    /// Idle machine. `fit_max_zoom` caps the camera when an area is
    /// selected.
    #[must_use]
    pub fn new(fit_max_zoom: f64) -> Self {
        Self {
            area: StateCell::default(),
            record: StateCell::default(),
            panel: StateCell::default(),
            fragment: String::new(),
            fit_max_zoom,
        }
    }

    /// Machine restored from the page's URL fragment. An area code in the
    /// fragment starts the machine with that area selected and its panel
    /// open.
    #[must_use]
    pub fn from_fragment(fragment: &str, fit_max_zoom: f64) -> Self {
        let mut machine = Self::new(fit_max_zoom);
        machine.fragment = fragment.to_string();

        if let Some(code) = fragment::area_code(fragment) {
            log::debug!("Restoring selected area {code} from fragment");
            machine.area = StateCell::new(Some(code));
            machine.panel = StateCell::new(PanelState {
                open: true,
                tab: PanelTab::Selected,
            });
        }

        machine
    }

    /// Selects an area by GSS code.
    ///
    /// Requests a camera fit when `bounds` are known, opens the area panel
    /// on its `selected` tab and writes the code to the fragment.
    pub fn select_constituency(
        &mut self,
        code: &str,
        bounds: Option<BoundingBox>,
    ) -> Vec<SelectionEffect> {
        if code.is_empty() {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.area.set(Some(code.to_string())) {
            effects.push(SelectionEffect::AreaChanged);
        }
        if let Some(bounds) = bounds {
            effects.push(SelectionEffect::FitBounds {
                bounds,
                max_zoom: self.fit_max_zoom,
            });
        } else {
            log::debug!("No bounds for {code}, leaving camera in place");
        }

        self.panel.set(PanelState {
            open: true,
            tab: PanelTab::Selected,
        });
        effects.push(SelectionEffect::OpenAreaPanel);
        effects.push(SelectionEffect::SetPanelTab {
            tab: PanelTab::Selected,
        });

        self.fragment = fragment::with_area_code(&self.fragment, Some(code));
        effects.push(SelectionEffect::UpdateFragment {
            fragment: self.fragment.clone(),
        });

        effects
    }

    /// Deselects the area and closes its panel.
    pub fn clear_area(&mut self) -> Vec<SelectionEffect> {
        if self.area.get().is_none() {
            return Vec::new();
        }

        self.area.set(None);
        self.panel.set(PanelState::default());
        self.fragment = fragment::with_area_code(&self.fragment, None);

        vec![
            SelectionEffect::AreaChanged,
            SelectionEffect::CloseAreaPanel,
            SelectionEffect::UpdateFragment {
                fragment: self.fragment.clone(),
            },
        ]
    }

    /// Selects a clicked record from `source_id`.
    ///
    /// A feature that fails validation leaves the state unchanged.
    pub fn select_record(
        &mut self,
        source_id: &str,
        feature: &geojson::Feature,
    ) -> Vec<SelectionEffect> {
        match SelectedRecord::from_click(source_id, feature) {
            Ok(record) => {
                if self.record.set(Some(record)) {
                    vec![SelectionEffect::RecordChanged]
                } else {
                    Vec::new()
                }
            }
            Err(e) => {
                log::debug!("Ignoring click on invalid record from {source_id}: {e}");
                Vec::new()
            }
        }
    }

    /// Deselects the record. The area is untouched.
    pub fn clear_record(&mut self) -> Vec<SelectionEffect> {
        if self.record.set(None) {
            vec![SelectionEffect::RecordChanged]
        } else {
            Vec::new()
        }
    }

    /// Switches the area panel tab.
    pub fn set_panel_tab(&mut self, tab: PanelTab) -> Vec<SelectionEffect> {
        let panel = *self.panel.get();
        if self.panel.set(PanelState { tab, ..panel }) {
            vec![SelectionEffect::SetPanelTab { tab }]
        } else {
            Vec::new()
        }
    }

    #[must_use]
    pub fn area_code(&self) -> Option<&str> {
        self.area.get().as_deref()
    }

    #[must_use]
    pub const fn record(&self) -> Option<&SelectedRecord> {
        self.record.get().as_ref()
    }

    #[must_use]
    pub const fn panel(&self) -> PanelState {
        *self.panel.get()
    }

    /// Current URL fragment.
    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Versions of the area and record cells.
    #[must_use]
    pub const fn versions(&self) -> (u64, u64) {
        (self.area.version(), self.record.version())
    }

    #[must_use]
    pub fn state(&self) -> SelectionState {
        SelectionState {
            selected_area_code: self.area.get().clone(),
            selected_record: self.record.get().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIT_MAX_ZOOM: f64 = 9.9;

    fn bounds() -> BoundingBox {
        BoundingBox::new(-0.08, 51.51, -0.02, 51.54)
    }

    fn record(id: Option<&str>) -> geojson::Feature {
        let properties = id.map_or_else(|| json!({ "name": "x" }), |id| json!({ "id": id }));
        serde_json::from_value(json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-0.05, 51.52] },
            "properties": properties
        }))
        .unwrap()
    }

    #[test]
    fn selecting_constituency_fits_bounds_and_opens_panel() {
        let mut machine = SelectionStateMachine::new(FIT_MAX_ZOOM);
        let effects = machine.select_constituency("E14000530", Some(bounds()));

        assert_eq!(machine.area_code(), Some("E14000530"));
        assert!(effects.contains(&SelectionEffect::FitBounds {
            bounds: bounds(),
            max_zoom: FIT_MAX_ZOOM
        }));
        assert!(effects.contains(&SelectionEffect::OpenAreaPanel));
        assert_eq!(
            machine.panel(),
            PanelState {
                open: true,
                tab: PanelTab::Selected
            }
        );
        assert_eq!(machine.fragment(), "#constituency=E14000530");
    }

    #[test]
    fn fragment_restores_area_without_click() {
        let machine = SelectionStateMachine::from_fragment("#constituency=E14000530", FIT_MAX_ZOOM);
        assert_eq!(
            machine.state(),
            SelectionState {
                selected_area_code: Some("E14000530".to_string()),
                selected_record: None
            }
        );
        assert!(machine.panel().open);

        let idle = SelectionStateMachine::from_fragment("", FIT_MAX_ZOOM);
        assert_eq!(idle.state(), SelectionState::default());
    }

    #[test]
    fn background_click_clears_only_the_record() {
        let mut machine = SelectionStateMachine::from_fragment("#constituency=E14000530", FIT_MAX_ZOOM);
        machine.select_record("members", &record(Some("rec-1")));
        assert_eq!(machine.record().map(|r| r.record_id.as_str()), Some("rec-1"));

        assert_eq!(machine.clear_record(), vec![SelectionEffect::RecordChanged]);
        assert!(machine.record().is_none());
        assert_eq!(machine.area_code(), Some("E14000530"));

        assert!(machine.clear_record().is_empty());
    }

    #[test]
    fn invalid_record_leaves_state_unchanged() {
        let mut machine = SelectionStateMachine::new(FIT_MAX_ZOOM);
        machine.select_record("members", &record(Some("rec-1")));
        let before = machine.state();
        let versions = machine.versions();

        assert!(machine.select_record("members", &record(None)).is_empty());
        assert_eq!(machine.state(), before);
        assert_eq!(machine.versions(), versions);
    }

    #[test]
    fn clicking_another_record_replaces_selection() {
        let mut machine = SelectionStateMachine::new(FIT_MAX_ZOOM);
        machine.select_record("members", &record(Some("rec-1")));
        let effects = machine.select_record("events", &record(Some("rec-2")));

        assert_eq!(effects, vec![SelectionEffect::RecordChanged]);
        let selected = machine.record().unwrap();
        assert_eq!(selected.source_id, "events");
        assert_eq!(selected.record_id, "rec-2");
    }

    #[test]
    fn clearing_area_preserves_other_fragment_keys() {
        let mut machine = SelectionStateMachine::from_fragment("#view=table", FIT_MAX_ZOOM);
        machine.select_constituency("E14000530", None);
        assert_eq!(machine.fragment(), "#view=table&constituency=E14000530");

        let effects = machine.clear_area();
        assert!(effects.contains(&SelectionEffect::CloseAreaPanel));
        assert_eq!(machine.fragment(), "#view=table");
        assert_eq!(machine.area_code(), None);
        assert!(machine.clear_area().is_empty());
    }

    #[test]
    fn missing_bounds_skip_the_camera() {
        let mut machine = SelectionStateMachine::new(FIT_MAX_ZOOM);
        let effects = machine.select_constituency("E14000530", None);
        assert!(
            !effects
                .iter()
                .any(|e| matches!(e, SelectionEffect::FitBounds { .. }))
        );
        assert!(machine.select_constituency("", None).is_empty());
    }

    #[test]
    fn panel_tab_switches() {
        let mut machine = SelectionStateMachine::new(FIT_MAX_ZOOM);
        assert_eq!(
            machine.set_panel_tab(PanelTab::Selected),
            vec![SelectionEffect::SetPanelTab {
                tab: PanelTab::Selected
            }]
        );
        assert!(machine.set_panel_tab(PanelTab::Selected).is_empty());
        assert_eq!("summary".parse::<PanelTab>().unwrap(), PanelTab::Summary);
    }
}
