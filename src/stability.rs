//! Completion detection for streaming answer content.
//!
//! Generated content streams in incrementally, and length alone can plateau
//! mid-sentence during network stalls. The monitor therefore requires a
//! quiet window of unchanged text before declaring completion, while a hard
//! deadline bounds the worst case. Time and text acquisition are injected so
//! tests can drive the machine without real delays.

use async_trait::async_trait;
use std::time::Instant;
use tokio::time::Duration;

use crate::logging::SearchLogger;
use crate::page::{PageDriver, PageError};

/// The final answer must exceed this many characters; an unchanging empty
/// region is absent content, not a stable answer.
pub const MIN_SUBSTANCE_LEN: usize = 100;

/// Tuning knobs for one stability wait.
#[derive(Debug, Clone, Copy)]
pub struct StabilitySettings {
    pub quiet_period_ms: u64,
    pub poll_interval_ms: u64,
    pub deadline_ms: u64,
    pub min_text_len: usize,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        StabilitySettings {
            quiet_period_ms: 2_000,
            poll_interval_ms: 500,
            deadline_ms: 30_000,
            min_text_len: MIN_SUBSTANCE_LEN,
        }
    }
}

/// Terminal states of the monitor. Both carry the last observed text so the
/// caller can proceed either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilityOutcome {
    /// Content stopped changing for the full quiet period and clears the
    /// substance floor.
    Stable { text: String, waited_ms: u64 },
    /// The deadline elapsed with content still changing (or still absent);
    /// extraction proceeds anyway.
    TimedOut { text: String },
}

impl StabilityOutcome {
    pub fn text(&self) -> &str {
        match self {
            StabilityOutcome::Stable { text, .. } => text,
            StabilityOutcome::TimedOut { text } => text,
        }
    }
}

/// Source of the monitored region's normalized text. A read error is a
/// transient condition (element detached mid-poll); the monitor logs it and
/// keeps polling.
#[async_trait]
pub trait TextSource: Send {
    async fn read(&mut self) -> Result<String, PageError>;
}

/// Injectable time source.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    async fn sleep_ms(&self, ms: u64);
}

/// Wall-clock implementation backed by tokio's timer.
pub struct TokioClock {
    epoch: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Reads the monitored region through the page driver.
pub struct RegionTextSource<'a> {
    page: &'a dyn PageDriver,
    css: &'a str,
}

impl<'a> RegionTextSource<'a> {
    pub fn new(page: &'a dyn PageDriver, css: &'a str) -> Self {
        Self { page, css }
    }
}

#[async_trait]
impl TextSource for RegionTextSource<'_> {
    async fn read(&mut self) -> Result<String, PageError> {
        Ok(self.page.query_text(self.css).await?.unwrap_or_default())
    }
}

/// Verdict of one poll step; pure so the transition rules are unit testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollVerdict {
    Polling,
    Stable,
    TimedOut,
}

fn assess(
    now_ms: u64,
    started_ms: u64,
    last_change_ms: u64,
    text_len: usize,
    settings: &StabilitySettings,
) -> PollVerdict {
    if now_ms.saturating_sub(started_ms) >= settings.deadline_ms {
        return PollVerdict::TimedOut;
    }
    if now_ms.saturating_sub(last_change_ms) >= settings.quiet_period_ms
        && text_len > settings.min_text_len
    {
        return PollVerdict::Stable;
    }
    PollVerdict::Polling
}

/// Wait until the region's text has stopped changing for the quiet period
/// (and clears the substance floor), or until the deadline. Never fails and
/// always returns by the deadline at latest.
pub async fn await_stable<S, C>(
    source: &mut S,
    clock: &C,
    settings: StabilitySettings,
    logger: &SearchLogger,
) -> StabilityOutcome
where
    S: TextSource,
    C: Clock,
{
    let started = clock.now_ms();
    let mut last_change = started;
    let mut previous = String::new();

    loop {
        match source.read().await {
            Ok(text) => {
                let text = text.trim().to_string();
                if text != previous {
                    previous = text;
                    last_change = clock.now_ms();
                }
            }
            Err(err) => {
                // Transient read failure; keep polling until the deadline.
                logger.debug(
                    format!("region read failed, continuing: {err}"),
                    Some("stability"),
                    None,
                );
            }
        }

        let now = clock.now_ms();
        match assess(now, started, last_change, previous.len(), &settings) {
            PollVerdict::Stable => {
                let waited_ms = now - started;
                logger.debug(
                    format!("region stable after {waited_ms}ms ({} chars)", previous.len()),
                    Some("stability"),
                    None,
                );
                return StabilityOutcome::Stable {
                    text: previous,
                    waited_ms,
                };
            }
            PollVerdict::TimedOut => {
                logger.debug(
                    format!(
                        "stability deadline reached with {} chars observed",
                        previous.len()
                    ),
                    Some("stability"),
                    None,
                );
                return StabilityOutcome::TimedOut { text: previous };
            }
            PollVerdict::Polling => {}
        }

        clock.sleep_ms(settings.poll_interval_ms).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Virtual clock: sleeping advances time instantly.
    struct SimClock {
        now: AtomicU64,
    }

    impl SimClock {
        fn new() -> Self {
            Self {
                now: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Clock for SimClock {
        fn now_ms(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }

        async fn sleep_ms(&self, ms: u64) {
            self.now.fetch_add(ms, Ordering::SeqCst);
        }
    }

    /// Replays a scripted sequence of reads, repeating the final entry.
    struct ScriptedSource {
        frames: Vec<Result<String, ()>>,
        cursor: usize,
    }

    impl ScriptedSource {
        fn new(frames: Vec<&str>) -> Self {
            Self {
                frames: frames.into_iter().map(|f| Ok(f.to_string())).collect(),
                cursor: 0,
            }
        }
    }

    #[async_trait]
    impl TextSource for ScriptedSource {
        async fn read(&mut self) -> Result<String, PageError> {
            let index = self.cursor.min(self.frames.len() - 1);
            self.cursor += 1;
            match &self.frames[index] {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(PageError::Evaluate("detached".to_string())),
            }
        }
    }

    fn settings() -> StabilitySettings {
        StabilitySettings {
            quiet_period_ms: 2_000,
            poll_interval_ms: 500,
            deadline_ms: 30_000,
            min_text_len: 100,
        }
    }

    fn logger() -> SearchLogger {
        SearchLogger::new(Verbosity::Minimal)
    }

    fn long_text() -> String {
        "The prevailing explanation involves scattering of shorter wavelengths. ".repeat(10)
    }

    #[tokio::test]
    async fn loading_placeholder_then_stable_answer() {
        let answer = long_text();
        assert!(answer.len() >= 600);
        let mut source = ScriptedSource::new(vec![
            "Loading...",
            "Loading...",
            "Loading...",
            "Loading...",
            "Loading...",
            answer.as_str(),
        ]);
        let clock = SimClock::new();

        let outcome = await_stable(&mut source, &clock, settings(), &logger()).await;
        match outcome {
            StabilityOutcome::Stable { text, waited_ms } => {
                assert_eq!(text, answer.trim());
                // Five placeholder polls, one change, then a full quiet
                // period on the final value.
                assert!(waited_ms >= 2_000 + 5 * 500);
                assert!(waited_ms < 30_000);
            }
            other => panic!("expected stable outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn never_stable_before_quiet_period() {
        let answer = long_text();
        let mut source = ScriptedSource::new(vec![answer.as_str()]);
        let clock = SimClock::new();

        let outcome = await_stable(&mut source, &clock, settings(), &logger()).await;
        match outcome {
            StabilityOutcome::Stable { waited_ms, .. } => {
                assert!(waited_ms >= settings().quiet_period_ms);
            }
            other => panic!("expected stable outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stably_empty_region_times_out() {
        let mut source = ScriptedSource::new(vec![""]);
        let clock = SimClock::new();

        let outcome = await_stable(&mut source, &clock, settings(), &logger()).await;
        assert_eq!(
            outcome,
            StabilityOutcome::TimedOut {
                text: String::new()
            }
        );
        assert!(clock.now_ms() <= settings().deadline_ms + settings().poll_interval_ms);
    }

    #[tokio::test]
    async fn endlessly_changing_content_hits_deadline() {
        struct Counter(u64);
        #[async_trait]
        impl TextSource for Counter {
            async fn read(&mut self) -> Result<String, PageError> {
                self.0 += 1;
                Ok(format!("{} {}", long_helper(), self.0))
            }
        }
        fn long_helper() -> String {
            "still generating more and more content for this answer block ".repeat(4)
        }

        let clock = SimClock::new();
        let outcome = await_stable(&mut Counter(0), &clock, settings(), &logger()).await;
        assert!(matches!(outcome, StabilityOutcome::TimedOut { .. }));
        assert!(clock.now_ms() >= settings().deadline_ms);
    }

    #[tokio::test]
    async fn transient_read_errors_do_not_terminate() {
        struct Flaky {
            calls: u32,
            answer: String,
        }
        #[async_trait]
        impl TextSource for Flaky {
            async fn read(&mut self) -> Result<String, PageError> {
                self.calls += 1;
                if self.calls <= 2 {
                    Err(PageError::Evaluate("element detached".to_string()))
                } else {
                    Ok(self.answer.clone())
                }
            }
        }

        let clock = SimClock::new();
        let mut source = Flaky {
            calls: 0,
            answer: long_text(),
        };
        let outcome = await_stable(&mut source, &clock, settings(), &logger()).await;
        assert!(matches!(outcome, StabilityOutcome::Stable { .. }));
    }

    #[test]
    fn assess_requires_both_quiet_and_substance() {
        let s = settings();
        // Quiet but empty: keep polling.
        assert_eq!(assess(5_000, 0, 0, 0, &s), PollVerdict::Polling);
        // Substantial but recently changed: keep polling.
        assert_eq!(assess(5_000, 0, 4_000, 600, &s), PollVerdict::Polling);
        // Quiet and substantial: stable.
        assert_eq!(assess(5_000, 0, 2_500, 600, &s), PollVerdict::Stable);
        // Deadline dominates everything.
        assert_eq!(assess(30_000, 0, 27_000, 600, &s), PollVerdict::TimedOut);
    }
}
