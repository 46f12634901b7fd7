//! Content-based scoring of answer-container candidates.
//!
//! A [`DomSnapshot`] is gathered by a single page evaluate call and scored
//! here as a pure fold of an ordered rule list, so the rule set is unit
//! testable without a browser and trivially extensible. Each rule contributes
//! a fixed weight (reward or penalty) plus a reason tag recorded on the
//! candidate.

use serde::Deserialize;

use crate::selector::{synthesize_locator, Locator};

/// Elements with less text than this are trivial UI fragments, never scored.
/// The snapshot collector applies the same floor in-page.
pub const CANDIDATE_TEXT_FLOOR: usize = 500;
/// The snapshot collector caps transported `text` at this many characters;
/// phrase rules only see this prefix, while length thresholds compare
/// against `text_length`, the true in-page size.
pub const SNAPSHOT_TEXT_CAP: usize = 6000;
/// Containers with more direct element children than this are page-section
/// wrappers, not leaf-like answer blocks.
pub const MAX_WRAPPER_CHILDREN: u32 = 12;
/// Length above which a verbatim query match counts as substantial.
pub const SUBSTANTIAL_TEXT_LEN: usize = 1000;
/// Length above which dense sentence punctuation counts as structured prose.
pub const COMPREHENSIVE_TEXT_LEN: usize = 2000;
/// Net score a candidate must exceed to be returned at all.
pub const ACCEPTANCE_THRESHOLD: i32 = 50;
/// Maximum length of the content preview carried on a candidate.
pub const PREVIEW_LEN: usize = 200;

/// One element observed in the live DOM, as serialized by the snapshot
/// collector script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    /// Text content, possibly truncated by the collector for transport.
    pub text: String,
    /// Full text length as measured in the page.
    pub text_length: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    /// Platform-assigned structural attribute, the most durable locator
    /// signal available.
    #[serde(default)]
    pub jsname: Option<String>,
    #[serde(default)]
    pub data_ved: Option<String>,
    #[serde(default)]
    pub child_count: u32,
}

/// All container elements captured from one DOM state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DomSnapshot {
    pub elements: Vec<ElementSnapshot>,
}

/// A scored, provisional identification of the answer container.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub locator: Locator,
    pub text_length: usize,
    pub confidence: i32,
    pub reasons: Vec<&'static str>,
    pub preview: String,
}

/// Inputs visible to every scoring rule.
pub struct RuleContext {
    pub text_lower: String,
    pub query_lower: String,
    pub text_length: usize,
    pub sentence_marks: usize,
}

/// One independent scoring signal.
pub struct ScoreRule {
    pub weight: i32,
    pub reason: &'static str,
    pub applies: fn(&RuleContext) -> bool,
}

const ATTRIBUTION_PHRASES: &[&str] = &[
    "according to",
    "based on",
    "research shows",
    "studies indicate",
];

const GENERATION_STATUS_PHRASES: &[&str] = &["thinking", "looking at", "putting it all together"];

/// The ordered, additive rule set. Weights follow the tuning that proved out
/// against live result pages; see DESIGN.md for provenance.
pub const SCORE_RULES: &[ScoreRule] = &[
    ScoreRule {
        weight: 40,
        reason: "query-match",
        applies: |ctx| {
            ctx.text_length > SUBSTANTIAL_TEXT_LEN && ctx.text_lower.contains(&ctx.query_lower)
        },
    },
    ScoreRule {
        weight: 30,
        reason: "topic-keywords",
        applies: |ctx| {
            ctx.query_lower
                .split_whitespace()
                .filter(|word| word.len() > 2 && ctx.text_lower.contains(word))
                .count()
                >= 2
        },
    },
    ScoreRule {
        weight: 20,
        reason: "attribution-phrasing",
        applies: |ctx| {
            ATTRIBUTION_PHRASES
                .iter()
                .any(|phrase| ctx.text_lower.contains(phrase))
        },
    },
    ScoreRule {
        weight: 25,
        reason: "prose-structure",
        applies: |ctx| ctx.text_length > COMPREHENSIVE_TEXT_LEN && ctx.sentence_marks > 10,
    },
    ScoreRule {
        weight: 15,
        reason: "generation-status",
        applies: |ctx| {
            GENERATION_STATUS_PHRASES
                .iter()
                .any(|phrase| ctx.text_lower.contains(phrase))
        },
    },
    ScoreRule {
        weight: -40,
        reason: "chrome-vocabulary",
        applies: |ctx| {
            let nav = ctx.text_lower.contains("search")
                && ctx.text_lower.contains("images")
                && ctx.text_lower.contains("videos");
            nav || ctx.text_lower.contains("cookie")
                || ctx.text_lower.contains("privacy policy")
                || ctx.text_lower.contains("sign in")
        },
    },
];

/// Score every plausible container in the snapshot against the query.
///
/// Returns accepted candidates ordered by descending confidence, ties broken
/// by greater text length. An empty list is the normal "no container found"
/// outcome, never an error.
pub fn score(snapshot: &DomSnapshot, query: &str) -> Vec<Candidate> {
    let query_lower = query.to_lowercase();
    let mut candidates: Vec<Candidate> = snapshot
        .elements
        .iter()
        .filter(|element| element.text_length >= CANDIDATE_TEXT_FLOOR)
        .filter(|element| element.child_count <= MAX_WRAPPER_CHILDREN)
        .filter_map(|element| score_element(element, snapshot, &query_lower))
        .collect();

    candidates.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then(b.text_length.cmp(&a.text_length))
    });
    candidates
}

fn score_element(
    element: &ElementSnapshot,
    snapshot: &DomSnapshot,
    query_lower: &str,
) -> Option<Candidate> {
    let ctx = RuleContext {
        text_lower: element.text.to_lowercase(),
        query_lower: query_lower.to_string(),
        text_length: element.text_length,
        sentence_marks: count_sentence_marks(&element.text),
    };

    let (confidence, mut reasons) = SCORE_RULES.iter().fold(
        (0i32, Vec::new()),
        |(total, mut reasons), rule| {
            if (rule.applies)(&ctx) {
                reasons.push(rule.reason);
                (total + rule.weight, reasons)
            } else {
                (total, reasons)
            }
        },
    );

    // The acceptance gate applies to the content signals alone; locator
    // bonuses only refine ordering among already-accepted candidates.
    if confidence <= ACCEPTANCE_THRESHOLD {
        return None;
    }

    let synthesized = synthesize_locator(element, snapshot);
    reasons.extend(synthesized.reasons);

    Some(Candidate {
        locator: synthesized.locator,
        text_length: element.text_length,
        confidence: confidence + synthesized.bonus,
        reasons,
        preview: preview_of(&element.text),
    })
}

fn count_sentence_marks(text: &str) -> usize {
    text.chars()
        .filter(|ch| matches!(ch, '.' | '!' | '?'))
        .count()
}

fn preview_of(text: &str) -> String {
    let trimmed = text.trim();
    let mut end = PREVIEW_LEN.min(trimmed.len());
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(text: &str) -> ElementSnapshot {
        ElementSnapshot {
            text: text.to_string(),
            text_length: text.len(),
            ..Default::default()
        }
    }

    fn snapshot(elements: Vec<ElementSnapshot>) -> DomSnapshot {
        DomSnapshot { elements }
    }

    fn answer_text(query: &str, chars: usize) -> String {
        let mut text = format!("{query}. According to recent measurements, ");
        while text.len() < chars {
            text.push_str("the effect is well documented in the literature. ");
        }
        text.truncate(chars);
        text
    }

    #[test]
    fn empty_snapshot_yields_no_candidates() {
        assert!(score(&snapshot(vec![]), "why is the sky blue").is_empty());
    }

    #[test]
    fn sub_floor_elements_are_never_scored() {
        let snap = snapshot(vec![element("short label")]);
        assert!(score(&snap, "why is the sky blue").is_empty());
    }

    #[test]
    fn substantial_answer_with_query_and_attribution_wins() {
        let query = "why is the sky blue";
        let snap = snapshot(vec![element(&answer_text(query, 3000))]);
        let candidates = score(&snap, query);
        assert_eq!(candidates.len(), 1);
        let top = &candidates[0];
        assert!(top.confidence > ACCEPTANCE_THRESHOLD);
        assert!(top.reasons.contains(&"query-match"));
        assert!(top.reasons.contains(&"attribution-phrasing"));
        assert!(top.reasons.contains(&"prose-structure"));
        assert!(top.preview.len() <= PREVIEW_LEN);
    }

    #[test]
    fn navigation_spam_is_rejected_by_penalty() {
        // One element below the floor, one large element of pure chrome
        // vocabulary: both must be filtered out.
        let spam = "search images videos ".repeat(200);
        assert!(spam.len() >= 4000);
        let snap = snapshot(vec![element("tiny fragment under the floor"), element(&spam)]);
        assert!(score(&snap, "climate change effects").is_empty());
    }

    #[test]
    fn wrapper_with_excessive_fanout_is_discarded() {
        let query = "why is the sky blue";
        let mut wrapper = element(&answer_text(query, 3000));
        wrapper.child_count = MAX_WRAPPER_CHILDREN + 1;
        assert!(score(&snapshot(vec![wrapper]), query).is_empty());
    }

    #[test]
    fn scoring_is_deterministic_and_additive() {
        let query = "rust borrow checker";
        let text = answer_text(query, 2500);
        let snap = snapshot(vec![element(&text)]);

        let first = score(&snap, query);
        let second = score(&snap, query);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].confidence, second[0].confidence);
        assert_eq!(first[0].reasons, second[0].reasons);

        // query-match 40 + topic-keywords 30 + attribution 20 + prose 25
        assert_eq!(first[0].confidence, 115);
    }

    #[test]
    fn ties_break_toward_richer_candidate() {
        let query = "ocean currents";
        let shorter = answer_text(query, 2600);
        let longer = answer_text(query, 3200);
        let snap = snapshot(vec![element(&shorter), element(&longer)]);
        let candidates = score(&snap, query);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].confidence, candidates[1].confidence);
        assert!(candidates[0].text_length > candidates[1].text_length);
    }

    #[test]
    fn generation_status_counts_even_mid_stream() {
        let query = "quantum entanglement basics";
        let mut text = String::from("Thinking about quantum entanglement basics right now. ");
        while text.len() < 1200 {
            text.push_str("Gathering details. ");
        }
        let snap = snapshot(vec![element(&text)]);
        let candidates = score(&snap, query);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].reasons.contains(&"generation-status"));
    }
}
