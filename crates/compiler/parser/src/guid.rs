//! GUID shapes shared by the lexer and the GUID-string analyzer.

use once_cell::sync::Lazy;
use regex::Regex;

/// Length of a canonical `8-4-4-4-12` GUID.
pub const GUID_LEN: usize = 36;

static GUID_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("GUID prefix pattern is valid")
});

static GUID_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[A-Za-z0-9_]*_)?[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .expect("GUID string pattern is valid")
});

/// Length of the GUID at the start of `text`, if one is there and is not
/// immediately followed by more identifier characters.
pub fn guid_prefix_len(text: &str) -> Option<usize> {
    let found = GUID_PREFIX.find(text)?;
    let trailing = text[found.end()..].chars().next();
    match trailing {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => None,
        _ => Some(found.end()),
    }
}

/// Whether `text` is a bare GUID or a `Name_GUID` string.
pub fn is_guid_string(text: &str) -> bool {
    GUID_STRING.is_match(text)
}

/// Splits a `Name_GUID` string into its name part and its GUID.
///
/// A bare GUID yields an empty name.
pub fn split_guid_string(text: &str) -> Option<(&str, &str)> {
    if !is_guid_string(text) {
        return None;
    }
    let (name, guid) = text.split_at(text.len() - GUID_LEN);
    Some((name.strip_suffix('_').unwrap_or(name), guid))
}
