//! Field transforms applied between the spreadsheet and the feature service.
//!
//! Three families of transforms live here:
//!
//! - header sanitization: sheet headers rewritten into feature-service
//!   safe field names (alphanumerics and underscores, 31 characters max),
//!   with per-job rename overrides and dropped columns layered on top;
//! - the county → Local Health District lookup used to partition survey
//!   responses;
//! - survey question alias numbering: bare `Comments` aliases inherit the
//!   number of the question they follow so exported headers stay readable.

use std::collections::{BTreeMap, BTreeSet};

/// Maximum length of a feature-service field name.
const MAX_FIELD_NAME_LEN: usize = 31;

/// Rewrite a sheet header into a feature-service safe field name.
///
/// Every run of non-alphanumeric characters becomes a single underscore
/// (leading and trailing runs included), and the result is truncated to
/// 31 characters. `"Gallons of Used Oil Collected for Recycling Last
/// Year"` becomes `"Gallons_of_Used_Oil_Collected_f"`.
pub fn sanitize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    if pending_sep {
        out.push('_');
    }
    out.truncate(MAX_FIELD_NAME_LEN);
    out
}

/// Map a row of sheet headers to feature-service field names.
///
/// Each header is sanitized, then looked up in `renames` (keyed by the
/// sanitized form), then checked against `drops`. A `None` entry means
/// the column is dropped.
pub fn map_headers(
    headers: &[String],
    renames: &BTreeMap<String, String>,
    drops: &BTreeSet<String>,
) -> Vec<Option<String>> {
    headers
        .iter()
        .map(|h| {
            let sanitized = sanitize_field_name(h);
            let renamed = renames.get(&sanitized).cloned().unwrap_or(sanitized);
            if drops.contains(&renamed) {
                None
            } else {
                Some(renamed)
            }
        })
        .collect()
}

/// County → Local Health District abbreviations.
///
/// Keys are trimmed, case-sensitive county names as they appear in the
/// source sheet.
const COUNTY_TO_LHD: &[(&str, &str)] = &[
    ("Box Elder", "BRHD"),
    ("Cache", "BRHD"),
    ("Rich", "BRHD"),
    ("Weber", "WMHD"),
    ("Morgan", "WMHD"),
    ("Davis", "DCHD"),
    ("Salt Lake", "SLCoHD"),
    ("Utah", "UCHD"),
    ("Wasatch", "WCHD"),
    ("Summit", "SCHD"),
    ("Juab", "CUHD"),
    ("Millard", "CUHD"),
    ("Piute", "CUHD"),
    ("Sanpete", "CUHD"),
    ("Sevier", "CUHD"),
    ("Wayne", "CUHD"),
    ("Tooele", "TCHD"),
    ("Beaver", "SWUHD"),
    ("Iron", "SWUHD"),
    ("Kane", "SWUHD"),
    ("Washington", "SWUHD"),
    ("Garfield", "SWUHD"),
    ("San Juan", "SJHD"),
    ("Grand", "SEUHD"),
    ("Emery", "SEUHD"),
    ("Carbon", "SEUHD"),
    ("Duchesne", "TCHD"),
    ("Daggett", "TCHD"),
    ("Uintah", "TCHD"),
];

/// Resolve the Local Health District for a county name.
///
/// Whitespace is trimmed before lookup. Unknown counties return `None`;
/// callers decide whether to log or pass the raw value through.
pub fn lhd_for_county(county: &str) -> Option<&'static str> {
    let trimmed = county.trim();
    COUNTY_TO_LHD
        .iter()
        .find(|(name, _)| *name == trimmed)
        .map(|(_, lhd)| *lhd)
}

/// Parse a leading question marker from an alias.
///
/// `"3. Hours of operation"` → `Numbered(3)`; `"3a. Weekend hours"` →
/// `SubQuestion`; anything else → `Plain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasKind {
    Numbered(u32),
    SubQuestion,
    Plain,
}

fn classify_alias(alias: &str) -> AliasKind {
    let digits: String = alias.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return AliasKind::Plain;
    }
    let rest = &alias[digits.len()..];
    if rest.starts_with('.') {
        return digits
            .parse()
            .map(AliasKind::Numbered)
            .unwrap_or(AliasKind::Plain);
    }
    let letters: String = rest
        .chars()
        .take_while(|c| c.is_ascii_lowercase())
        .collect();
    if !letters.is_empty() && rest[letters.len()..].starts_with('.') {
        return AliasKind::SubQuestion;
    }
    AliasKind::Plain
}

/// Number bare `Comments` aliases after the question they follow.
///
/// Survey layers alias each comment column as plain `Comments`; in the
/// exported tab those headers are ambiguous, so each one is prefixed with
/// the number of the closest preceding `N.` question. Sub-question
/// aliases (`3a. …`) pass through without changing the current number.
/// The first alias after the questions begin that is neither numbered nor
/// a `Comments` field (the certification text) ends numbering for the
/// rest of the mapping.
///
/// Input order is significant; the result preserves it.
pub fn number_comment_aliases(fields: &[(String, String)]) -> Vec<(String, String)> {
    let mut current: Option<u32> = None;
    let mut done = false;
    let mut out = Vec::with_capacity(fields.len());

    for (name, alias) in fields {
        if done {
            out.push((name.clone(), alias.clone()));
            continue;
        }
        match classify_alias(alias) {
            AliasKind::Numbered(n) => {
                current = Some(n);
                out.push((name.clone(), alias.clone()));
            }
            AliasKind::SubQuestion => {
                out.push((name.clone(), alias.clone()));
            }
            AliasKind::Plain => match (alias == "Comments", current) {
                (true, Some(n)) => {
                    out.push((name.clone(), format!("{n}. {alias}")));
                }
                (_, Some(_)) => {
                    // Past the question block (certification etc.), stop.
                    done = true;
                    out.push((name.clone(), alias.clone()));
                }
                (_, None) => {
                    // Pre-question field, leave untouched.
                    out.push((name.clone(), alias.clone()));
                }
            },
        }
    }
    out
}
