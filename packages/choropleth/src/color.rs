//! Color types and the sequential ramp used for choropleth fills.

use std::fmt;

use serde::{Serialize, Serializer};

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Creates a color from channel values.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear interpolation between two colors, `t` in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f64::from(b) - f64::from(a)).mul_add(t, f64::from(a)).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl fmt::Display for Rgb {
    /// Format as CSS hex: `#rrggbb`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// HSL color: h in degrees, s and l in [0.0, 1.0].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    /// Hue in degrees.
    pub h: f64,
    /// Saturation.
    pub s: f64,
    /// Lightness.
    pub l: f64,
}

impl fmt::Display for Hsl {
    /// Format as CSS HSL: `hsl(h, s%, l%)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.h.rem_euclid(360.0);
        let s = (self.s * 100.0).clamp(0.0, 100.0);
        let l = (self.l * 100.0).clamp(0.0, 100.0);
        write!(f, "hsl({h:.1}, {s:.0}%, {l:.0}%)")
    }
}

/// Inferno control points sampled at `t = 0.0, 0.1, ..., 1.0`.
const INFERNO: [Rgb; 11] = [
    Rgb::new(0, 0, 4),
    Rgb::new(22, 11, 57),
    Rgb::new(66, 10, 104),
    Rgb::new(106, 23, 110),
    Rgb::new(147, 38, 103),
    Rgb::new(188, 55, 84),
    Rgb::new(221, 81, 58),
    Rgb::new(243, 118, 27),
    Rgb::new(252, 165, 10),
    Rgb::new(246, 215, 70),
    Rgb::new(252, 255, 164),
];

/// Perceptually uniform dark-to-light ramp, `t` clamped to `[0, 1]`.
///
/// NaN maps to the darkest color.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn inferno(t: f64) -> Rgb {
    if t.is_nan() {
        return INFERNO[0];
    }

    let segments = (INFERNO.len() - 1) as f64;
    let scaled = t.clamp(0.0, 1.0) * segments;
    let i = (scaled.floor() as usize).min(INFERNO.len() - 2);

    INFERNO[i].lerp(INFERNO[i + 1], scaled - i as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferno_endpoints() {
        assert_eq!(inferno(0.0).to_string(), "#000004");
        assert_eq!(inferno(1.0).to_string(), "#fcffa4");
        assert_eq!(inferno(-3.0), inferno(0.0));
        assert_eq!(inferno(7.0), inferno(1.0));
        assert_eq!(inferno(f64::NAN), inferno(0.0));
    }

    #[test]
    fn inferno_hits_control_points() {
        assert_eq!(inferno(0.5), Rgb::new(188, 55, 84));
        assert_eq!(inferno(0.8), Rgb::new(252, 165, 10));
    }

    #[test]
    fn inferno_brightens_overall() {
        let luminance = |c: Rgb| u32::from(c.r) + u32::from(c.g) + u32::from(c.b);
        assert!(luminance(inferno(0.25)) < luminance(inferno(0.75)));
    }

    #[test]
    fn hsl_normalizes_hue() {
        let color = Hsl {
            h: 400.0,
            s: 0.7,
            l: 0.55,
        };
        assert_eq!(color.to_string(), "hsl(40.0, 70%, 55%)");
    }

    #[test]
    fn rgb_serializes_as_hex_string() {
        let value = serde_json::to_value(Rgb::new(255, 0, 16)).unwrap();
        assert_eq!(value, serde_json::json!("#ff0010"));
    }
}
