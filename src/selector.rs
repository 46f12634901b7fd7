//! Locator resolution: known-stable selectors first, scored fallback second.
//!
//! Platform-assigned locators are cheap to check and historically reliable,
//! but not guaranteed present on every render; the content-scored fallback
//! provides resilience without being the default path, since it is slower
//! and has a nonzero false-positive rate against result listings that share
//! vocabulary with answers.

use serde_json::json;

use crate::dom_scripts::SNAPSHOT_SCRIPT;
use crate::logging::SearchLogger;
use crate::page::{PageDriver, PageError};
use crate::scorer::{score, DomSnapshot, ElementSnapshot};

/// Region the stability monitor watches while the answer streams in. The
/// platform assigns this container id itself, which makes it the single most
/// durable hook on the page.
pub const ANSWER_REGION: &str = r#"[data-container-id="main-col"] > :first-child"#;

/// Previously observed platform-assigned selectors for the answer panel,
/// in historical reliability order. Each is re-validated live before use.
pub const KNOWN_STABLE_LOCATORS: &[&str] = &[
    r#"div[jsname="htVhGf"]"#,
    r#"div[jsname="RH7zg"]"#,
    ".qJYHHd.maIobf",
    ".tonYlb",
];

/// Literal phrases characteristic of a search-results listing rather than a
/// generated answer; any match disqualifies a container.
pub const LISTING_FINGERPRINTS: &[&str] = &["sites15 sites", "people also ask"];

/// Text shorter than this never validates a resolved locator.
pub const VALIDATION_TEXT_FLOOR: usize = 1000;

/// How a locator was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// Pre-registered, believed durable across page versions.
    KnownStable,
    /// Derived at runtime from a winning scored candidate.
    Inferred,
}

/// A reusable descriptor that can re-find an element in the live DOM.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    css: String,
    kind: LocatorKind,
}

impl Locator {
    pub fn known_stable(css: impl Into<String>) -> Self {
        Locator {
            css: css.into(),
            kind: LocatorKind::KnownStable,
        }
    }

    pub fn inferred(css: impl Into<String>) -> Self {
        Locator {
            css: css.into(),
            kind: LocatorKind::Inferred,
        }
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }
}

/// Ordered resolution ladder; strategies are tried left to right and the
/// first validated success wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    KnownStable,
    ScoredFallback,
}

pub const RESOLVE_LADDER: &[ResolveStrategy] =
    &[ResolveStrategy::KnownStable, ResolveStrategy::ScoredFallback];

/// Resolve a locator for the answer container, or `None` when the ladder is
/// exhausted. Absence is the normal negative outcome; transient page errors
/// are logged and treated as a failed strategy step.
pub async fn resolve(
    page: &dyn PageDriver,
    query: &str,
    logger: &SearchLogger,
) -> Option<Locator> {
    for strategy in RESOLVE_LADDER {
        let resolved = match strategy {
            ResolveStrategy::KnownStable => try_known_stable(page, query, logger).await,
            ResolveStrategy::ScoredFallback => try_scored_fallback(page, query, logger).await,
        };
        if resolved.is_some() {
            return resolved;
        }
    }
    None
}

async fn try_known_stable(
    page: &dyn PageDriver,
    query: &str,
    logger: &SearchLogger,
) -> Option<Locator> {
    for css in KNOWN_STABLE_LOCATORS {
        match page.query_text(css).await {
            Ok(Some(text)) if validates_as_answer(&text, query) => {
                logger.info(
                    format!("validated known-stable locator {css}"),
                    Some("resolver"),
                    None,
                );
                return Some(Locator::known_stable(*css));
            }
            Ok(_) => {}
            Err(err) => {
                logger.debug(
                    format!("known-stable probe failed for {css}: {err}"),
                    Some("resolver"),
                    None,
                );
            }
        }
    }
    None
}

async fn try_scored_fallback(
    page: &dyn PageDriver,
    query: &str,
    logger: &SearchLogger,
) -> Option<Locator> {
    let snapshot = match fetch_snapshot(page).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            logger.debug(
                format!("snapshot collection failed: {err}"),
                Some("resolver"),
                None,
            );
            return None;
        }
    };

    let candidates = score(&snapshot, query);
    let top = candidates.first()?;
    logger.debug(
        format!("scored {} candidate(s)", candidates.len()),
        Some("resolver"),
        Some(json!({
            "top": top.locator.css(),
            "confidence": top.confidence,
            "reasons": top.reasons,
        })),
    );

    // Re-validate the winner against the live DOM: the scored text travelled
    // through the snapshot, but the locator must also re-find real answer
    // content, not a listing that shares vocabulary.
    match page.query_text(top.locator.css()).await {
        Ok(Some(text)) if validates_as_answer(&text, query) => Some(top.locator.clone()),
        Ok(_) => {
            logger.debug(
                "top candidate failed live validation",
                Some("resolver"),
                None,
            );
            None
        }
        Err(err) => {
            logger.debug(
                format!("candidate validation read failed: {err}"),
                Some("resolver"),
                None,
            );
            None
        }
    }
}

/// Gather the scorer's input from the live DOM in one evaluate round trip.
pub async fn fetch_snapshot(page: &dyn PageDriver) -> Result<DomSnapshot, PageError> {
    let value = page.evaluate(SNAPSHOT_SCRIPT).await?;
    serde_json::from_value(value).map_err(|err| PageError::Evaluate(err.to_string()))
}

/// Shared validation applied to every resolved locator: enough text to be an
/// answer, no listing fingerprint, and at least the leading significant query
/// word present.
pub fn validates_as_answer(text: &str, query: &str) -> bool {
    if text.len() <= VALIDATION_TEXT_FLOOR {
        return false;
    }
    let lower = text.to_lowercase();
    if LISTING_FINGERPRINTS
        .iter()
        .any(|fingerprint| lower.contains(fingerprint))
    {
        return false;
    }
    match first_significant_word(query) {
        Some(word) => lower.contains(&word),
        None => true,
    }
}

fn first_significant_word(query: &str) -> Option<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .find(|word| word.len() > 2)
        .map(|word| word.to_string())
}

/// An inferred locator plus the confidence refinement it contributes.
pub struct SynthesizedLocator {
    pub locator: Locator,
    pub bonus: i32,
    pub reasons: Vec<&'static str>,
}

/// Build the most durable selector the element supports: a unique identifier
/// beats everything; otherwise a non-generated class name combined with a
/// platform structural attribute maximises both specificity and durability.
pub fn synthesize_locator(
    element: &ElementSnapshot,
    snapshot: &DomSnapshot,
) -> SynthesizedLocator {
    if let Some(id) = element.id.as_deref().filter(|id| !id.is_empty()) {
        if id_is_unique(id, snapshot) {
            return SynthesizedLocator {
                locator: Locator::inferred(format!("div#{id}")),
                bonus: 5,
                reasons: vec!["unique-id"],
            };
        }
    }

    let mut css = String::from("div");
    let mut bonus = 0;
    let mut reasons = Vec::new();

    if let Some(class) = element
        .class_name
        .as_deref()
        .and_then(meaningful_class_name)
    {
        css.push('.');
        css.push_str(class);
    }

    if let Some(jsname) = element.jsname.as_deref().filter(|v| !v.is_empty()) {
        css.push_str(&format!("[jsname=\"{jsname}\"]"));
        bonus += 15;
        reasons.push("jsname-attribute");
    } else if let Some(ved) = element.data_ved.as_deref().filter(|v| !v.is_empty()) {
        css.push_str(&format!("[data-ved=\"{ved}\"]"));
        bonus += 10;
        reasons.push("data-ved-attribute");
    }

    SynthesizedLocator {
        locator: Locator::inferred(css),
        bonus,
        reasons,
    }
}

fn id_is_unique(id: &str, snapshot: &DomSnapshot) -> bool {
    snapshot
        .elements
        .iter()
        .filter(|element| element.id.as_deref() == Some(id))
        .count()
        <= 1
}

/// A class name usable in a durable selector: long enough to be meaningful
/// and not shaped like an auto-generated token (`a1`, `b2`) or a mangled
/// build artifact (underscored).
fn meaningful_class_name(class_attr: &str) -> Option<&str> {
    class_attr.split_whitespace().find(|class| {
        class.len() > 2 && !class.contains('_') && !is_generated_token(class)
    })
}

fn is_generated_token(class: &str) -> bool {
    let mut chars = class.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic())
        && chars.clone().count() > 0
        && chars.all(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_with(
        id: Option<&str>,
        class_name: Option<&str>,
        jsname: Option<&str>,
        data_ved: Option<&str>,
    ) -> ElementSnapshot {
        ElementSnapshot {
            text: String::new(),
            text_length: 0,
            id: id.map(String::from),
            class_name: class_name.map(String::from),
            jsname: jsname.map(String::from),
            data_ved: data_ved.map(String::from),
            child_count: 0,
        }
    }

    fn lone_snapshot(element: ElementSnapshot) -> DomSnapshot {
        DomSnapshot {
            elements: vec![element],
        }
    }

    #[test]
    fn unique_id_wins_synthesis() {
        let element = element_with(Some("rso"), Some("answer-block"), Some("htVhGf"), None);
        let synthesized = synthesize_locator(&element, &lone_snapshot(element.clone()));
        assert_eq!(synthesized.locator.css(), "div#rso");
        assert_eq!(synthesized.bonus, 5);
        assert_eq!(synthesized.locator.kind(), LocatorKind::Inferred);
    }

    #[test]
    fn duplicate_id_falls_back_to_class_and_jsname() {
        let element = element_with(Some("dup"), Some("answerPanel"), Some("htVhGf"), None);
        let snapshot = DomSnapshot {
            elements: vec![element.clone(), element.clone()],
        };
        let synthesized = synthesize_locator(&element, &snapshot);
        assert_eq!(synthesized.locator.css(), "div.answerPanel[jsname=\"htVhGf\"]");
        assert_eq!(synthesized.bonus, 15);
        assert_eq!(synthesized.reasons, vec!["jsname-attribute"]);
    }

    #[test]
    fn generated_class_tokens_are_skipped() {
        let element = element_with(None, Some("a1 b2 content_main panelBody"), None, Some("ved123"));
        let synthesized = synthesize_locator(&element, &lone_snapshot(element.clone()));
        assert_eq!(synthesized.locator.css(), "div.panelBody[data-ved=\"ved123\"]");
        assert_eq!(synthesized.bonus, 10);
    }

    #[test]
    fn bare_div_when_nothing_meaningful_exists() {
        let element = element_with(None, None, None, None);
        let synthesized = synthesize_locator(&element, &lone_snapshot(element.clone()));
        assert_eq!(synthesized.locator.css(), "div");
        assert_eq!(synthesized.bonus, 0);
    }

    #[test]
    fn validation_rejects_listing_fingerprints() {
        let mut listing = "climate change result listing ".repeat(50);
        listing.push_str("sites15 sites");
        assert!(!validates_as_answer(&listing, "climate change effects"));
    }

    #[test]
    fn validation_rejects_short_text() {
        assert!(!validates_as_answer("short", "climate change"));
    }

    #[test]
    fn validation_accepts_relevant_long_prose() {
        let text = "Climate change is driven by greenhouse gas accumulation. ".repeat(30);
        assert!(text.len() > VALIDATION_TEXT_FLOOR);
        assert!(validates_as_answer(&text, "climate change effects"));
    }

    #[test]
    fn ladder_orders_known_stable_first() {
        assert_eq!(RESOLVE_LADDER[0], ResolveStrategy::KnownStable);
        assert_eq!(RESOLVE_LADDER[1], ResolveStrategy::ScoredFallback);
    }
}
