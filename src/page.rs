//! Page abstraction consumed by the extraction pipeline.
//!
//! The core never touches network sockets or rendering directly; it issues
//! DOM evaluation calls through [`PageDriver`] and receives serialized data
//! back. The chromiumoxide-backed implementation lives here; tests substitute
//! scripted drivers.

use async_trait::async_trait;
use chromiumoxide::page::Page as ChromiumPage;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::time::{timeout, Duration};

/// Error surfaced by DOM round trips.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("page evaluation failed: {0}")]
    Evaluate(String),
    #[error("page is closed")]
    Closed,
}

/// Queryable, navigable page surface owned by one extraction for its
/// lifetime.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url`, bounded by `timeout_ms`.
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<(), PageError>;

    /// Run a pure expression against the current DOM and return its
    /// serialized result.
    async fn evaluate(&self, expression: &str) -> Result<JsonValue, PageError>;

    /// Text content of the first element matching `css`, or `None` when no
    /// element matches.
    async fn query_text(&self, css: &str) -> Result<Option<String>, PageError>;

    /// Cooperatively sleep for `ms`.
    async fn wait(&self, ms: u64);

    /// Release the underlying page target. Idempotent.
    async fn close(&self) -> Result<(), PageError>;
}

impl std::fmt::Debug for dyn PageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PageDriver")
    }
}

/// [`PageDriver`] backed by a chromiumoxide page target.
pub struct ChromiumPageDriver {
    page: ChromiumPage,
}

impl ChromiumPageDriver {
    pub fn new(page: ChromiumPage) -> Self {
        Self { page }
    }
}

fn cdp_error(err: impl std::fmt::Display) -> PageError {
    PageError::Evaluate(err.to_string())
}

#[async_trait]
impl PageDriver for ChromiumPageDriver {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<(), PageError> {
        let navigation = self.page.goto(url);
        match timeout(Duration::from_millis(timeout_ms), navigation).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(PageError::Navigation(err.to_string())),
            Err(_) => Err(PageError::Navigation(format!(
                "timed out after {timeout_ms}ms reaching {url}"
            ))),
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<JsonValue, PageError> {
        let result = self.page.evaluate(expression).await.map_err(cdp_error)?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn query_text(&self, css: &str) -> Result<Option<String>, PageError> {
        let expression = crate::dom_scripts::query_text_script(css);
        match self.evaluate(&expression).await? {
            JsonValue::String(text) => Ok(Some(text)),
            _ => Ok(None),
        }
    }

    async fn wait(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn close(&self) -> Result<(), PageError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|err| PageError::Evaluate(err.to_string()))
    }
}
