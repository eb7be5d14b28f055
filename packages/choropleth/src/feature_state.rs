//! Per-feature `count` state with deferred application.
//!
//! A write against a tileset whose source is missing or still loading is
//! parked as a [`PendingApplication`]. The next readiness signal for that
//! source moves it from [`ApplicationStatus::Pending`] to
//! [`ApplicationStatus::Applied`], and each record is written at most
//! once.

use std::collections::{BTreeMap, BTreeSet};

use report_map_geography::index::AreaCodeIndex;
use report_map_geography_models::Tileset;
use report_map_surface::{FeatureState, FeatureTarget, RenderSurface, SurfaceError};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Feature-state key holding the aggregate count.
pub const COUNT_STATE_KEY: &str = "count";

/// What to do with state left on features whose code disappeared from a
/// refreshed aggregate set.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StaleStatePolicy {
    /// Leave the old count in place.
    #[default]
    Retain,
    /// Remove the feature's state.
    Clear,
}

/// Lifecycle of a parked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ApplicationStatus {
    /// Waiting for the source to load.
    Pending,
    /// Written to the surface.
    Applied,
}

/// A feature-state write that could not be applied immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingApplication {
    /// Feature the state belongs to.
    pub target: FeatureTarget,
    /// State to write.
    pub state: FeatureState,
    /// Whether the write has reached the surface yet.
    pub status: ApplicationStatus,
}

/// Result of a single write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Written now.
    Applied,
    /// Parked until the source is ready.
    Deferred,
}

/// Summary of [`FeatureStateSynchronizer::apply_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Writes that reached the surface.
    pub applied: usize,
    /// Writes parked until their source loads.
    pub deferred: usize,
    /// Stale features whose state was removed.
    pub cleared: usize,
    /// Stale features whose state was left in place.
    pub retained: usize,
}

/// Target for a code on a tileset's boundary layer.
#[must_use]
pub fn feature_target(tileset: &Tileset, code: &str) -> FeatureTarget {
    FeatureTarget {
        source: tileset.source_id.clone(),
        source_layer: Some(tileset.boundary_layer_id.clone()),
        id: code.to_string(),
    }
}

/// Keeps boundary feature state in step with the latest aggregates.
#[derive(Debug, Clone, Default)]
pub struct FeatureStateSynchronizer {
    policy: StaleStatePolicy,
    records: Vec<PendingApplication>,
    /// Codes written (or parked) per source during the last refresh.
    known: BTreeMap<String, BTreeSet<String>>,
}

impl FeatureStateSynchronizer {
    #[must_use]
    pub fn new(policy: StaleStatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn policy(&self) -> StaleStatePolicy {
        self.policy
    }

    /// Sets `{ count }` on the feature keyed by `code`.
    ///
    /// If the source is not ready the write is parked. Parking the same
    /// target twice keeps only the latest state.
    ///
    /// # Errors
    ///
    /// Returns non-transient [`SurfaceError`]s from the surface.
    pub fn apply_aggregate<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        tileset: &Tileset,
        code: &str,
        count: u64,
    ) -> Result<ApplyOutcome, SurfaceError> {
        let target = feature_target(tileset, code);
        #[allow(clippy::cast_precision_loss)]
        let state = FeatureState::from([(COUNT_STATE_KEY.to_string(), count as f64)]);

        self.known
            .entry(tileset.source_id.clone())
            .or_default()
            .insert(code.to_string());

        match surface.set_feature_state(&target, &state) {
            Ok(()) => {
                self.records
                    .retain(|r| !(r.status == ApplicationStatus::Pending && r.target == target));
                Ok(ApplyOutcome::Applied)
            }
            Err(e) if e.is_transient() => {
                log::debug!("Deferring feature state for {code}: {e}");
                self.park(target, state);
                Ok(ApplyOutcome::Deferred)
            }
            Err(e) => Err(e),
        }
    }

    fn park(&mut self, target: FeatureTarget, state: FeatureState) {
        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.status == ApplicationStatus::Pending && r.target == target)
        {
            existing.state = state;
        } else {
            self.records.push(PendingApplication {
                target,
                state,
                status: ApplicationStatus::Pending,
            });
        }
    }

    /// Applies every aggregate in `index` to `tileset`, then handles codes
    /// that were present in the previous refresh but not in this one
    /// according to the [`StaleStatePolicy`].
    ///
    /// # Errors
    ///
    /// Returns non-transient [`SurfaceError`]s from the surface.
    pub fn apply_all<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        tileset: &Tileset,
        index: &AreaCodeIndex,
    ) -> Result<SyncReport, SurfaceError> {
        let previous = self.known.remove(&tileset.source_id).unwrap_or_default();
        self.records.retain(|r| r.status == ApplicationStatus::Pending);

        let mut report = SyncReport::default();
        for (code, entry) in index.iter() {
            match self.apply_aggregate(surface, tileset, code, entry.count)? {
                ApplyOutcome::Applied => report.applied += 1,
                ApplyOutcome::Deferred => report.deferred += 1,
            }
        }

        for code in previous.iter().filter(|code| !index.contains(code)) {
            match self.policy {
                StaleStatePolicy::Retain => report.retained += 1,
                StaleStatePolicy::Clear => {
                    let target = feature_target(tileset, code);
                    self.records.retain(|r| r.target != target);
                    match surface.remove_feature_state(&target) {
                        Ok(()) => report.cleared += 1,
                        Err(e) if e.is_transient() => {
                            log::debug!("No state to clear for {code}: {e}");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        if report.retained > 0 {
            log::debug!(
                "Retaining stale feature state for {} codes on {}",
                report.retained,
                tileset.source_id
            );
        }
        log::debug!("Feature state sync for {}: {report:?}", tileset.source_id);

        Ok(report)
    }

    /// Retries parked writes after a readiness signal.
    ///
    /// `source_id` limits the retry to one source; `None` retries every
    /// source (the surface-wide load event). Returns the number of
    /// records that moved to [`ApplicationStatus::Applied`].
    ///
    /// # Errors
    ///
    /// Returns non-transient [`SurfaceError`]s from the surface.
    pub fn on_ready<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        source_id: Option<&str>,
    ) -> Result<usize, SurfaceError> {
        let mut applied = 0;

        for record in self.records.iter_mut().filter(|r| {
            r.status == ApplicationStatus::Pending
                && source_id.is_none_or(|id| r.target.source == id)
        }) {
            match surface.set_feature_state(&record.target, &record.state) {
                Ok(()) => {
                    record.status = ApplicationStatus::Applied;
                    applied += 1;
                }
                Err(e) if e.is_transient() => {
                    log::debug!("Source still not ready for {}: {e}", record.target.id);
                }
                Err(e) => return Err(e),
            }
        }

        if applied > 0 {
            log::info!("Applied {applied} deferred feature states");
        }

        Ok(applied)
    }

    /// Writes still waiting for their source.
    pub fn pending(&self) -> impl Iterator<Item = &PendingApplication> {
        self.records
            .iter()
            .filter(|r| r.status == ApplicationStatus::Pending)
    }

    /// Number of writes still waiting for their source.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending().count()
    }

    /// Every parked write since the last refresh, pending or applied.
    #[must_use]
    pub fn records(&self) -> &[PendingApplication] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_map_geography::tilesets::TilesetRegistry;
    use report_map_geography_models::{AreaAggregate, TilesetKind};
    use report_map_style_models::SourceSpec;
    use report_map_surface::scene::SceneSurface;

    fn constituencies() -> Tileset {
        TilesetRegistry::embedded()
            .get(TilesetKind::Constituency)
            .cloned()
            .unwrap()
    }

    fn surface_with(tileset: &Tileset) -> SceneSurface {
        let mut surface = SceneSurface::new();
        surface
            .add_source(
                &tileset.source_id,
                SourceSpec::vector(
                    tileset.source_url.clone(),
                    &tileset.boundary_layer_id,
                    &tileset.promotion_key,
                ),
            )
            .unwrap();
        surface
    }

    fn count_of(surface: &SceneSurface, tileset: &Tileset, code: &str) -> Option<f64> {
        surface
            .feature_state(&feature_target(tileset, code))
            .and_then(|s| s.get(COUNT_STATE_KEY).copied())
    }

    #[test]
    fn deferred_write_is_applied_exactly_once() {
        let tileset = constituencies();
        let mut surface = surface_with(&tileset);
        let mut sync = FeatureStateSynchronizer::default();

        let outcome = sync
            .apply_aggregate(&mut surface, &tileset, "E14000530", 12)
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Deferred);
        assert_eq!(surface.feature_state_writes(), 0);
        assert_eq!(sync.pending_len(), 1);

        surface.mark_source_loaded(&tileset.source_id);
        assert_eq!(sync.on_ready(&mut surface, Some("constituencies")).unwrap(), 1);
        assert_eq!(surface.feature_state_writes(), 1);
        assert_eq!(count_of(&surface, &tileset, "E14000530"), Some(12.0));

        assert_eq!(sync.on_ready(&mut surface, None).unwrap(), 0);
        assert_eq!(surface.feature_state_writes(), 1);
        assert_eq!(sync.records()[0].status, ApplicationStatus::Applied);
    }

    #[test]
    fn readiness_for_other_sources_does_not_flush() {
        let tileset = constituencies();
        let mut surface = surface_with(&tileset);
        let mut sync = FeatureStateSynchronizer::default();

        sync.apply_aggregate(&mut surface, &tileset, "E14000530", 1)
            .unwrap();
        surface.mark_source_loaded(&tileset.source_id);

        assert_eq!(sync.on_ready(&mut surface, Some("wards")).unwrap(), 0);
        assert_eq!(sync.pending_len(), 1);
    }

    #[test]
    fn still_unloaded_source_keeps_record_pending() {
        let tileset = constituencies();
        let mut surface = SceneSurface::new();
        let mut sync = FeatureStateSynchronizer::default();

        sync.apply_aggregate(&mut surface, &tileset, "E14000530", 1)
            .unwrap();
        assert_eq!(sync.on_ready(&mut surface, None).unwrap(), 0);
        assert_eq!(sync.pending_len(), 1);
    }

    #[test]
    fn reparking_a_target_keeps_the_latest_state() {
        let tileset = constituencies();
        let mut surface = surface_with(&tileset);
        let mut sync = FeatureStateSynchronizer::default();

        sync.apply_aggregate(&mut surface, &tileset, "E14000530", 1)
            .unwrap();
        sync.apply_aggregate(&mut surface, &tileset, "E14000530", 7)
            .unwrap();
        assert_eq!(sync.pending_len(), 1);

        surface.mark_source_loaded(&tileset.source_id);
        sync.on_ready(&mut surface, None).unwrap();
        assert_eq!(surface.feature_state_writes(), 1);
        assert_eq!(count_of(&surface, &tileset, "E14000530"), Some(7.0));
    }

    #[test]
    fn immediate_write_supersedes_parked_one() {
        let tileset = constituencies();
        let mut surface = surface_with(&tileset);
        let mut sync = FeatureStateSynchronizer::default();

        sync.apply_aggregate(&mut surface, &tileset, "E14000530", 1)
            .unwrap();
        surface.mark_source_loaded(&tileset.source_id);
        sync.apply_aggregate(&mut surface, &tileset, "E14000530", 5)
            .unwrap();

        assert_eq!(sync.pending_len(), 0);
        assert_eq!(sync.on_ready(&mut surface, None).unwrap(), 0);
        assert_eq!(count_of(&surface, &tileset, "E14000530"), Some(5.0));
    }

    fn refresh(
        sync: &mut FeatureStateSynchronizer,
        surface: &mut SceneSurface,
        tileset: &Tileset,
        rows: &[(&str, u64)],
    ) -> SyncReport {
        let aggregates: Vec<_> = rows
            .iter()
            .map(|(code, count)| AreaAggregate::new(*code, *code, *count))
            .collect();
        sync.apply_all(surface, tileset, &AreaCodeIndex::from_aggregates(&aggregates))
            .unwrap()
    }

    #[test]
    fn stale_state_is_retained_by_default() {
        let tileset = constituencies();
        let mut surface = surface_with(&tileset);
        surface.mark_all_loaded();
        let mut sync = FeatureStateSynchronizer::default();

        refresh(&mut sync, &mut surface, &tileset, &[("A", 1), ("B", 2)]);
        let report = refresh(&mut sync, &mut surface, &tileset, &[("A", 3)]);

        assert_eq!(report.applied, 1);
        assert_eq!(report.retained, 1);
        assert_eq!(count_of(&surface, &tileset, "B"), Some(2.0));
        assert_eq!(count_of(&surface, &tileset, "A"), Some(3.0));
    }

    #[test]
    fn stale_state_can_be_cleared() {
        let tileset = constituencies();
        let mut surface = surface_with(&tileset);
        surface.mark_all_loaded();
        let mut sync = FeatureStateSynchronizer::new(StaleStatePolicy::Clear);

        refresh(&mut sync, &mut surface, &tileset, &[("A", 1), ("B", 2)]);
        let report = refresh(&mut sync, &mut surface, &tileset, &[("A", 3)]);

        assert_eq!(report.cleared, 1);
        assert_eq!(count_of(&surface, &tileset, "B"), None);
        assert_eq!("clear".parse::<StaleStatePolicy>().unwrap(), StaleStatePolicy::Clear);
    }

    #[test]
    fn cleared_codes_drop_their_pending_writes() {
        let tileset = constituencies();
        let mut surface = surface_with(&tileset);
        let mut sync = FeatureStateSynchronizer::new(StaleStatePolicy::Clear);

        refresh(&mut sync, &mut surface, &tileset, &[("A", 1), ("B", 2)]);
        assert_eq!(sync.pending_len(), 2);
        refresh(&mut sync, &mut surface, &tileset, &[("A", 3)]);
        assert_eq!(sync.pending_len(), 1);

        surface.mark_all_loaded();
        assert_eq!(sync.on_ready(&mut surface, None).unwrap(), 1);
        assert_eq!(count_of(&surface, &tileset, "A"), Some(3.0));
        assert_eq!(count_of(&surface, &tileset, "B"), None);
    }
}
