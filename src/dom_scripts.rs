//! Embedded page-context helper scripts.
//!
//! Scripts live in their own `.js` files under `scripts/` so editors can
//! offer proper syntax highlighting, and are bundled as strings at compile
//! time. Dynamic one-liners (selector-parameterised reads) are formatted
//! here with JSON-escaped arguments.

/// Collects every plausible answer container with the metadata the scorer
/// needs: text, length, identifier/class/structural attributes, fan-out.
///
/// Transported `text` is capped at [`crate::scorer::SNAPSHOT_TEXT_CAP`]
/// characters while `textLength` reports the full in-page size; the script
/// literal must stay in sync with that constant and with
/// [`crate::scorer::CANDIDATE_TEXT_FLOOR`].
pub const SNAPSHOT_SCRIPT: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/scripts/snapshot.js"));

/// Best-effort cookie-consent dismissal; returns whether a button was
/// clicked.
pub const CONSENT_SCRIPT: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/scripts/consent.js"));

/// Init script removing the most obvious automation fingerprints.
pub const STEALTH_SCRIPT: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/scripts/stealth.js"));

/// Expression returning the trimmed text of the first element matching
/// `css`, or `null` when nothing matches.
pub fn query_text_script(css: &str) -> String {
    let escaped = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{ const el = document.querySelector({escaped}); \
         return el ? (el.textContent || '').trim() : null; }})()"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_scripts_are_non_empty() {
        assert!(SNAPSHOT_SCRIPT.contains("textLength"));
        assert!(CONSENT_SCRIPT.contains("Accept all"));
        assert!(STEALTH_SCRIPT.contains("webdriver"));
    }

    #[test]
    fn snapshot_script_bounds_match_scorer_constants() {
        use crate::scorer::{CANDIDATE_TEXT_FLOOR, SNAPSHOT_TEXT_CAP};
        assert!(SNAPSHOT_SCRIPT.contains(&format!("slice(0, {SNAPSHOT_TEXT_CAP})")));
        assert!(SNAPSHOT_SCRIPT.contains(&format!("text.length < {CANDIDATE_TEXT_FLOOR}")));
    }

    #[test]
    fn query_text_script_escapes_quotes() {
        let script = query_text_script(r#"div[jsname="htVhGf"]"#);
        assert!(script.contains(r#""div[jsname=\"htVhGf\"]""#));
        assert!(script.contains("querySelector"));
    }
}
