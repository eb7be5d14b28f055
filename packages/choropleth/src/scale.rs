//! Color and text scales derived from aggregate counts.
//!
//! The fill paint is a `step` expression, so the continuous color scale
//! is sampled into at most [`MAX_STEPS`] stops. Above that the ramp loses
//! resolution, which keeps the expression small no matter how large
//! counts get.

use report_map_geography::index::AreaCodeIndex;
use serde::Serialize;

use crate::color::{Rgb, inferno};

/// Upper bound on the number of color stops.
pub const MAX_STEPS: f64 = 30.0;

/// Label size multiplier range, smallest count to largest count.
pub const TEXT_SCALE_RANGE: [f64; 2] = [1.0, 1.5];

/// Maps `[0, 1]` onto `range` after normalizing `x` within `domain`.
///
/// A degenerate domain (`min == max`) maps every input to the middle of
/// the range.
fn normalize(domain: [f64; 2], x: f64) -> f64 {
    let span = domain[1] - domain[0];
    if span == 0.0 || !span.is_finite() {
        0.5
    } else {
        (x - domain[0]) / span
    }
}

/// A linear scale from `domain` to `range`. Not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: [f64; 2],
    range: [f64; 2],
}

impl LinearScale {
    /// Creates a linear scale.
    #[must_use]
    pub const fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        Self { domain, range }
    }

    /// Applies the scale.
    #[must_use]
    pub fn apply(&self, x: f64) -> f64 {
        let t = normalize(self.domain, x);
        (self.range[1] - self.range[0]).mul_add(t, self.range[0])
    }
}

/// A sequential color scale over `domain` using the Inferno ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequentialScale {
    domain: [f64; 2],
}

impl SequentialScale {
    /// Creates a sequential scale.
    #[must_use]
    pub const fn new(domain: [f64; 2]) -> Self {
        Self { domain }
    }

    /// Color for `x`. Inputs outside the domain clamp to the ends.
    #[must_use]
    pub fn apply(&self, x: f64) -> Rgb {
        inferno(normalize(self.domain, x))
    }
}

/// One `(value, color)` stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorStop {
    /// Lower bound of the bucket.
    pub value: f64,
    /// Bucket color.
    pub color: Rgb,
}

/// Discretized color scale for a step paint expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorScale {
    /// Smallest count.
    pub domain_min: f64,
    /// Largest count.
    pub domain_max: f64,
    /// Stops, non-decreasing in `value`.
    pub stops: Vec<ColorStop>,
}

/// The full set of scales computed from one tileset's counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoroplethScales {
    /// Discretized stops for the fill expression.
    pub color_scale: ColorScale,
    legend: LinearScale,
    color: SequentialScale,
    text: LinearScale,
}

impl ChoroplethScales {
    /// Computes scales from counts.
    ///
    /// An empty input produces the domain `[0, 1]`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn compute(counts: impl IntoIterator<Item = u64>) -> Self {
        let (min, max) = counts
            .into_iter()
            .map(|c| c as f64)
            .fold(None, |acc: Option<(f64, f64)>, c| {
                Some(acc.map_or((c, c), |(lo, hi)| (lo.min(c), hi.max(c))))
            })
            .unwrap_or((0.0, 1.0));
        let domain = [min, max];

        let legend = LinearScale::new([0.0, 1.0], domain);
        let color = SequentialScale::new(domain);
        let text = LinearScale::new(domain, TEXT_SCALE_RANGE);

        let steps = max.min(MAX_STEPS).floor().max(0.0) as usize;
        let stops = (0..steps)
            .map(|i| {
                let value = legend.apply(i as f64 / steps as f64);
                ColorStop {
                    value,
                    color: color.apply(value),
                }
            })
            .collect();

        Self {
            color_scale: ColorScale {
                domain_min: min,
                domain_max: max,
                stops,
            },
            legend,
            color,
            text,
        }
    }

    /// Computes scales from an area index.
    #[must_use]
    pub fn from_index(index: &AreaCodeIndex) -> Self {
        Self::compute(index.counts())
    }

    /// Count at position `t` (`0..=1`) of the legend.
    #[must_use]
    pub fn legend_value(&self, t: f64) -> f64 {
        self.legend.apply(t)
    }

    /// Fill color for a count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn color_for(&self, count: u64) -> Rgb {
        self.color.apply(count as f64)
    }

    /// Label size multiplier for a count, in [`TEXT_SCALE_RANGE`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn text_scale_for(&self, count: u64) -> f64 {
        self.text.apply(count as f64)
    }

    /// Stops with strictly increasing values, as the step expression
    /// requires. Repeated values keep their first color.
    #[must_use]
    pub fn distinct_stops(&self) -> Vec<ColorStop> {
        let mut out: Vec<ColorStop> = Vec::with_capacity(self.color_scale.stops.len());
        for stop in &self.color_scale.stops {
            if out.last().is_none_or(|last| stop.value > last.value) {
                out.push(*stop);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_defaults_to_unit_domain() {
        let scales = ChoroplethScales::compute(Vec::new());
        assert!((scales.color_scale.domain_min - 0.0).abs() < f64::EPSILON);
        assert!((scales.color_scale.domain_max - 1.0).abs() < f64::EPSILON);
        assert_eq!(scales.color_scale.stops.len(), 1);
    }

    #[test]
    fn domain_bounds_every_count_and_stops_are_monotone() {
        let counts = vec![3, 17, 8, 250, 42, 3];
        let scales = ChoroplethScales::compute(counts.clone());
        let ColorScale {
            domain_min,
            domain_max,
            stops,
        } = &scales.color_scale;

        for c in counts {
            #[allow(clippy::cast_precision_loss)]
            let c = c as f64;
            assert!(*domain_min <= c && c <= *domain_max);
        }
        assert!(stops.windows(2).all(|w| w[0].value <= w[1].value));
    }

    #[test]
    fn step_count_is_capped() {
        assert_eq!(ChoroplethScales::compute([0, 5]).color_scale.stops.len(), 5);
        assert_eq!(ChoroplethScales::compute([1, 30]).color_scale.stops.len(), 30);
        assert_eq!(
            ChoroplethScales::compute([1, 10_000]).color_scale.stops.len(),
            30
        );
        assert!(ChoroplethScales::compute([0, 0]).color_scale.stops.is_empty());
    }

    #[test]
    fn stops_follow_the_legend_scale() {
        let scales = ChoroplethScales::compute([10, 20]);
        let stops = &scales.color_scale.stops;
        assert_eq!(stops.len(), 20);
        assert!((stops[0].value - 10.0).abs() < 1e-9);
        assert!((stops[10].value - 15.0).abs() < 1e-9);
        assert_eq!(stops[0].color, inferno(0.0));
        assert_eq!(stops[10].color, inferno(0.5));
    }

    #[test]
    fn text_scale_spans_configured_range() {
        let scales = ChoroplethScales::compute([2, 12]);
        assert!((scales.text_scale_for(2) - 1.0).abs() < 1e-9);
        assert!((scales.text_scale_for(12) - 1.5).abs() < 1e-9);
        assert!((scales.text_scale_for(7) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn degenerate_domain_uses_midpoint_and_deduplicates() {
        let scales = ChoroplethScales::compute([5, 5, 5]);
        assert_eq!(scales.color_scale.stops.len(), 5);
        assert!(scales.color_scale.stops.iter().all(|s| (s.value - 5.0).abs() < 1e-9));
        assert_eq!(scales.distinct_stops().len(), 1);
        assert_eq!(scales.color_for(5), inferno(0.5));
        assert!((scales.text_scale_for(5) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn legend_maps_unit_interval_onto_domain() {
        let scales = ChoroplethScales::compute([4, 8]);
        assert!((scales.legend_value(0.0) - 4.0).abs() < 1e-9);
        assert!((scales.legend_value(1.0) - 8.0).abs() < 1e-9);
    }
}
