//! Extraction orchestrator: search, settle, resolve, read, sanitize.
//!
//! One extraction owns one page and one browser lease for its whole
//! lifetime. The pipeline is a single attempt wrapped in an overall
//! deadline; retry orchestration belongs to the caller.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::json;
use tokio::time::{timeout, Duration};
use url::Url;

use crate::browser::{BrowserHandle, BrowserLease, BrowserRuntime, LaunchPlan};
use crate::config::SearchConfig;
use crate::dom_scripts::CONSENT_SCRIPT;
use crate::logging::SearchLogger;
use crate::page::PageDriver;
use crate::runtime::ChromiumoxideRuntime;
use crate::sanitize::sanitize_with_floor;
use crate::selector::{resolve, ANSWER_REGION};
use crate::stability::{
    await_stable, RegionTextSource, StabilityOutcome, StabilitySettings, TokioClock,
    MIN_SUBSTANCE_LEN,
};
use crate::types::ExtractionResult;

const SEARCH_ENDPOINT: &str = "https://www.google.com/search";

/// Build the results URL that routes the query to the generated-answer
/// experience.
pub fn search_url(query: &str) -> String {
    Url::parse_with_params(
        SEARCH_ENDPOINT,
        &[
            ("authuser", "0"),
            ("udm", "50"),
            ("aep", "25"),
            ("hl", "en"),
            ("source", "searchlabs"),
            ("q", query),
        ],
    )
    .map(String::from)
    .unwrap_or_else(|_| format!("{SEARCH_ENDPOINT}?q={query}"))
}

/// Drives the full extraction pipeline against a browser runtime.
///
/// All extractions running through one `Extractor` share one browser
/// process: each call takes a lease on the handle, and the process is torn
/// down only when the last in-flight extraction releases.
pub struct Extractor {
    config: SearchConfig,
    handle: BrowserHandle,
    logger: Arc<SearchLogger>,
}

impl Extractor {
    /// Extractor backed by a locally launched browser process.
    pub fn new(config: SearchConfig) -> Self {
        Self::with_runtime(config, Arc::new(ChromiumoxideRuntime::new()))
    }

    /// Extractor over an injected runtime; tests script the runtime instead
    /// of launching a browser.
    pub fn with_runtime(config: SearchConfig, runtime: Arc<dyn BrowserRuntime>) -> Self {
        let plan = LaunchPlan::from_config(&config);
        Self::with_handle(config, BrowserHandle::new(runtime, plan))
    }

    /// Extractor over a caller-managed handle, for sharing one browser
    /// process across several orchestrators.
    pub fn with_handle(config: SearchConfig, handle: BrowserHandle) -> Self {
        let logger = Arc::new(SearchLogger::new(config.verbose));
        Self {
            config,
            handle,
            logger,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn logger(&self) -> &SearchLogger {
        &self.logger
    }

    /// Run one extraction. Failures come back as unsuccessful results, never
    /// as panics; the browser process and page are released on every path.
    pub async fn extract(&self, query: &str) -> ExtractionResult {
        let query = query.trim();
        if query.is_empty() {
            return ExtractionResult::failed(query, "empty query");
        }

        self.logger.info(
            format!("extracting answer for {query:?}"),
            Some("extractor"),
            None,
        );

        let lease = match self.handle.lease().await {
            Ok(lease) => lease,
            Err(err) => {
                return ExtractionResult::failed(query, format!("browser launch failed: {err}"))
            }
        };

        let result = self.extract_with_lease(&lease, query).await;
        if let Err(err) = lease.release().await {
            self.logger
                .error(format!("browser release failed: {err}"), Some("extractor"), None);
        }
        result
    }

    async fn extract_with_lease(&self, lease: &BrowserLease, query: &str) -> ExtractionResult {
        let page = match lease.new_page().await {
            Ok(page) => page,
            Err(err) => {
                return ExtractionResult::failed(query, format!("page creation failed: {err}"))
            }
        };

        let deadline = Duration::from_millis(self.config.timeout_ms);
        let outcome = match timeout(deadline, self.run_pipeline(page.as_ref(), query)).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "extraction timed out after {}ms",
                self.config.timeout_ms
            )),
        };

        if let Err(err) = page.close().await {
            self.logger
                .debug(format!("page close failed: {err}"), Some("extractor"), None);
        }

        match outcome {
            Ok(text) => {
                self.logger.info(
                    format!("extracted {} chars", text.len()),
                    Some("extractor"),
                    None,
                );
                ExtractionResult::answered(query, text, None)
            }
            Err(error) => {
                self.logger.error(error.clone(), Some("extractor"), None);
                ExtractionResult::failed(query, error)
            }
        }
    }

    async fn run_pipeline(&self, page: &dyn PageDriver, query: &str) -> Result<String, String> {
        let url = search_url(query);
        page.navigate(&url, self.config.navigation_timeout_ms)
            .await
            .map_err(|err| format!("navigation failed: {err}"))?;

        // Consent interstitials only appear in some regions; dismissal is
        // best effort and never fails the extraction.
        match page.evaluate(CONSENT_SCRIPT).await {
            Ok(clicked) if clicked.as_bool() == Some(true) => {
                self.logger
                    .debug("dismissed consent dialog", Some("extractor"), None);
            }
            Ok(_) => {}
            Err(err) => {
                self.logger.debug(
                    format!("consent dismissal failed: {err}"),
                    Some("extractor"),
                    None,
                );
            }
        }

        let settings = StabilitySettings {
            quiet_period_ms: self.config.quiet_period_ms,
            poll_interval_ms: self.config.poll_interval_ms,
            deadline_ms: self.config.stability_deadline_ms,
            min_text_len: MIN_SUBSTANCE_LEN,
        };
        let mut source = RegionTextSource::new(page, ANSWER_REGION);
        let clock = TokioClock::new();
        let outcome = await_stable(&mut source, &clock, settings, &self.logger).await;
        if let StabilityOutcome::TimedOut { text } = &outcome {
            self.logger.debug(
                "proceeding without stable content",
                Some("extractor"),
                Some(json!({ "observedChars": text.len() })),
            );
        }

        let locator = resolve(page, query, &self.logger)
            .await
            .ok_or_else(|| "no answer container found".to_string())?;

        let raw = page
            .query_text(locator.css())
            .await
            .map_err(|err| format!("answer read failed: {err}"))?
            .ok_or_else(|| "no answer container found".to_string())?;

        let text = sanitize_with_floor(&raw, MIN_SUBSTANCE_LEN);
        if text.len() < MIN_SUBSTANCE_LEN {
            return Err(format!(
                "insufficient answer content ({} chars)",
                text.len()
            ));
        }

        Ok(text)
    }
}

/// Extract the answer for a single query with its own browser process.
pub async fn extract_one(query: &str, config: SearchConfig) -> ExtractionResult {
    Extractor::new(config).extract(query).await
}

/// Extract answers for several queries concurrently, one isolated browser
/// process per query. Results come back in input order regardless of
/// completion order; `delay_ms` staggers the launches.
pub async fn extract_batch(queries: &[String], config: SearchConfig) -> Vec<ExtractionResult> {
    extract_batch_with(queries, config, |config| Extractor::new(config.clone())).await
}

/// Batch driver parameterised over extractor construction so tests can
/// substitute scripted runtimes.
pub async fn extract_batch_with<F>(
    queries: &[String],
    config: SearchConfig,
    build: F,
) -> Vec<ExtractionResult>
where
    F: Fn(&SearchConfig) -> Extractor,
{
    let mut tasks = Vec::with_capacity(queries.len());
    for (index, query) in queries.iter().enumerate() {
        let extractor = build(&config);
        let query = query.clone();
        let stagger_ms = config.delay_ms * index as u64;
        tasks.push(tokio::spawn(async move {
            if stagger_ms > 0 {
                tokio::time::sleep(Duration::from_millis(stagger_ms)).await;
            }
            extractor.extract(&query).await
        }));
    }

    join_all(tasks)
        .await
        .into_iter()
        .zip(queries)
        .map(|(outcome, query)| match outcome {
            Ok(result) => result,
            Err(err) => ExtractionResult::failed(query.as_str(), format!("task failed: {err}")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_routes_to_answer_experience() {
        let url = search_url("why is the sky blue");
        assert!(url.starts_with("https://www.google.com/search?"));
        assert!(url.contains("udm=50"));
        assert!(url.contains("source=searchlabs"));
        assert!(url.contains("q=why+is+the+sky+blue"));
    }

    #[test]
    fn search_url_escapes_reserved_characters() {
        let url = search_url("what is a&b?");
        assert!(url.contains("q=what+is+a%26b%3F"));
    }
}
