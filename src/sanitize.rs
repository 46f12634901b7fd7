//! Removal of known UI boilerplate from extracted answer text.
//!
//! Sanitization is purely subtractive: each rule is a bounded regional
//! removal anchored to a literal phrase pair, applied only when the region
//! trails the text. That keeps behavior predictable and auditable, and makes
//! the whole pass idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

/// A trailing boilerplate block delimited by a literal start phrase and end
/// marker.
struct TrailingRule {
    start: &'static str,
    end: &'static str,
}

/// The feedback/disclaimer blocks the host platform appends below the
/// answer; text extraction flattens them straight onto the content.
const TRAILING_RULES: &[TrailingRule] = &[
    TrailingRule {
        start: "AI responses may include mistakes.",
        end: "Close",
    },
    TrailingRule {
        start: "Learn more",
        end: "Close",
    },
    TrailingRule {
        start: "Thank you",
        end: "Close",
    },
    TrailingRule {
        start: "Your feedback helps Google improve.",
        end: "Close",
    },
    TrailingRule {
        start: "See our Privacy Policy.",
        end: "Close",
    },
    TrailingRule {
        start: "Share more feedback",
        end: "Close",
    },
    TrailingRule {
        start: "Report a problem",
        end: "Close",
    },
];

/// Script fragments that leak into `textContent` when inline scripts sit
/// inside the extracted container.
static SCRIPT_REMNANTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\(function\s*\([^)]*\)\s*\{[^{}]*\}\s*\)\s*\([^)]*\)\s*;?").expect("iife"),
        Regex::new(r"window\.[A-Za-z_$][0-9A-Za-z_$]*\s*=\s*[^;\n]{0,200};").expect("assign"),
    ]
});

/// Strip known trailing boilerplate and script remnants. Purely subtractive
/// and idempotent; never errors.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    for regex in SCRIPT_REMNANTS.iter() {
        text = regex.replace_all(&text, "").into_owned();
    }

    // Removing one trailing block can expose another; iterate to a fixpoint
    // (bounded, since every pass strictly shrinks the text).
    loop {
        let before = text.len();
        for rule in TRAILING_RULES {
            text = strip_trailing_block(&text, rule);
        }
        if text.len() == before {
            break;
        }
    }

    text.trim().to_string()
}

/// Sanitize, but never let stripping push the text under `floor`: prefer
/// slightly noisy text over a false failure caused by over-aggressive
/// removal.
pub fn sanitize_with_floor(raw: &str, floor: usize) -> String {
    let cleaned = sanitize(raw);
    if cleaned.len() < floor && raw.trim().len() >= floor {
        raw.trim().to_string()
    } else {
        cleaned
    }
}

fn strip_trailing_block(text: &str, rule: &TrailingRule) -> String {
    let Some(start_idx) = text.rfind(rule.start) else {
        return text.to_string();
    };
    let after_start = start_idx + rule.start.len();
    let Some(end_offset) = text[after_start..].find(rule.end) else {
        return text.to_string();
    };
    let block_end = after_start + end_offset + rule.end.len();

    // Only trailing blocks are boilerplate; the same phrases mid-answer are
    // legitimate content.
    if text[block_end..].trim().is_empty() {
        text[..start_idx].trim_end().to_string()
    } else {
        text.to_string()
    }
}
