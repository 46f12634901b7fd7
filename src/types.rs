//! Result types shared by the programmatic and CLI surfaces.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A cited source attached to an extracted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub domain: String,
}

/// Outcome of one extraction attempt. Immutable once constructed; `text` is
/// present exactly when `success` is true, `error` exactly when it is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl ExtractionResult {
    pub fn answered(
        query: impl Into<String>,
        text: impl Into<String>,
        sources: Option<Vec<Source>>,
    ) -> Self {
        ExtractionResult {
            success: true,
            query: query.into(),
            text: Some(text.into()),
            sources,
            error: None,
            timestamp: now_iso(),
        }
    }

    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        ExtractionResult {
            success: false,
            query: query.into(),
            text: None,
            sources: None,
            error: Some(error.into()),
            timestamp: now_iso(),
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
