//! URL fragment encoding of the selected area.
//!
//! The fragment is a `form-urlencoded` list such as
//! `#constituency=E14000530&view=table`. Only the `constituency` key is
//! owned here; other keys are kept in their original order.

use url::form_urlencoded;

/// Fragment key holding the selected area's GSS code.
pub const AREA_KEY: &str = "constituency";

/// Decodes a fragment, with or without the leading `#`.
#[must_use]
pub fn parse(fragment: &str) -> Vec<(String, String)> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect()
}

/// Selected area code in a fragment. Empty values count as absent.
#[must_use]
pub fn area_code(fragment: &str) -> Option<String> {
    parse(fragment)
        .into_iter()
        .find(|(key, value)| key == AREA_KEY && !value.is_empty())
        .map(|(_, value)| value)
}

/// Rewrites `fragment` with `code` as the selected area, or without the
/// area key when `code` is `None`. Returns `""` for an empty fragment and
/// `#...` otherwise.
#[must_use]
pub fn with_area_code(fragment: &str, code: Option<&str>) -> String {
    let mut pairs: Vec<(String, String)> = parse(fragment)
        .into_iter()
        .filter(|(key, _)| key != AREA_KEY)
        .collect();
    if let Some(code) = code {
        pairs.push((AREA_KEY.to_string(), code.to_string()));
    }
    if pairs.is_empty() {
        return String::new();
    }

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("#{encoded}")
}
