//! GSS (Government Statistical Service) area code helpers.
//!
//! A GSS code is nine characters: a nation letter, a two-digit entity
//! code and a six-digit instance number (e.g. `E14000530`). The first
//! three characters identify the kind of area, which is how boundary
//! features and aggregate rows are matched to a tileset.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Length of a well-formed GSS code.
pub const GSS_CODE_LEN: usize = 9;

/// UK nation encoded by the first character of a GSS code.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Nation {
    /// `E` prefix
    England,
    /// `W` prefix
    Wales,
    /// `S` prefix
    Scotland,
    /// `N` prefix
    NorthernIreland,
    /// `K` prefix (cross-nation areas)
    UnitedKingdom,
}

/// Returns `true` if `code` has the shape of a GSS code.
///
/// Only the shape is checked: one known nation letter followed by eight
/// ASCII digits.
#[must_use]
pub fn is_gss_code(code: &str) -> bool {
    code.len() == GSS_CODE_LEN
        && nation(code).is_some()
        && code[1..].bytes().all(|b| b.is_ascii_digit())
}

/// Returns the nation encoded by the first character of a GSS code.
#[must_use]
pub fn nation(code: &str) -> Option<Nation> {
    match code.as_bytes().first()?.to_ascii_uppercase() {
        b'E' => Some(Nation::England),
        b'W' => Some(Nation::Wales),
        b'S' => Some(Nation::Scotland),
        b'N' => Some(Nation::NorthernIreland),
        b'K' => Some(Nation::UnitedKingdom),
        _ => None,
    }
}
