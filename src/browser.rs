//! Browser lifecycle primitives.
//!
//! Configuration is transformed into a strongly-typed [`LaunchPlan`] first,
//! and only the [`BrowserRuntime`] seam touches a real browser process.
//! Extractions share one process through a ref-counted [`BrowserHandle`];
//! the last released lease tears the process down.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::{SearchConfig, DEFAULT_LAUNCH_ARGS};
use crate::page::PageDriver;

/// Error surfaced by browser lifecycle operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("page creation failed: {0}")]
    Page(String),
    #[error("browser not launched")]
    NotLaunched,
    #[error("browser shutdown failed: {0}")]
    Shutdown(String),
}

/// Viewport dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        // Small enough to stay unobtrusive in headed mode, large enough
        // that the results page renders its desktop layout.
        Viewport {
            width: 1024,
            height: 600,
        }
    }
}

/// Everything a runtime needs to bring up one browser process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub headless: bool,
    pub args: Vec<String>,
    pub viewport: Viewport,
    pub user_agent: String,
    pub chrome_executable: Option<PathBuf>,
}

impl LaunchPlan {
    pub fn from_config(config: &SearchConfig) -> Self {
        LaunchPlan {
            headless: config.headless,
            args: DEFAULT_LAUNCH_ARGS
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
            viewport: Viewport::default(),
            user_agent: config.user_agent.clone(),
            chrome_executable: config.chrome_executable.clone(),
        }
    }
}

/// Seam between the pipeline and an actual browser backend. Tests provide
/// scripted implementations; production uses the chromiumoxide runtime.
#[async_trait]
pub trait BrowserRuntime: Send + Sync {
    /// Bring up the browser process. Idempotent: a second call on a live
    /// runtime is a no-op.
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), BrowserError>;

    /// Open a fresh page target.
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, BrowserError>;

    /// Tear down the browser process and all its pages.
    async fn shutdown(&self) -> Result<(), BrowserError>;
}

/// Ref-counted ownership of one shared browser process.
///
/// The handle launches nothing by itself: the first active lease brings the
/// process up, further leases join it, and the last released lease tears it
/// down. Handles are cheap to clone and may be shared across orchestrators
/// and in-flight extractions; after a full teardown the next lease
/// relaunches the process.
#[derive(Clone)]
pub struct BrowserHandle {
    shared: Arc<HandleShared>,
}

struct HandleShared {
    runtime: Arc<dyn BrowserRuntime>,
    plan: LaunchPlan,
    leases: AtomicUsize,
    // Serializes the 0->1 launch and 1->0 shutdown transitions so a lease
    // acquired during teardown always sees a live process.
    transition: AsyncMutex<()>,
}

impl BrowserHandle {
    pub fn new(runtime: Arc<dyn BrowserRuntime>, plan: LaunchPlan) -> Self {
        Self {
            shared: Arc::new(HandleShared {
                runtime,
                plan,
                leases: AtomicUsize::new(0),
                transition: AsyncMutex::new(()),
            }),
        }
    }

    /// Claim the process, launching it when this is the first active lease.
    pub async fn lease(&self) -> Result<BrowserLease, BrowserError> {
        let _guard = self.shared.transition.lock().await;
        if self.shared.leases.load(Ordering::SeqCst) == 0 {
            self.shared.runtime.launch(&self.shared.plan).await?;
        }
        self.shared.leases.fetch_add(1, Ordering::SeqCst);
        Ok(BrowserLease {
            shared: Arc::clone(&self.shared),
            released: false,
        })
    }
}

/// One extraction's claim on the shared browser process.
pub struct BrowserLease {
    shared: Arc<HandleShared>,
    released: bool,
}

impl BrowserLease {
    pub async fn new_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        self.shared.runtime.new_page().await
    }

    /// Give up this lease; the last release shuts the browser down.
    pub async fn release(mut self) -> Result<(), BrowserError> {
        self.released = true;
        let _guard = self.shared.transition.lock().await;
        if self.shared.leases.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.runtime.shutdown().await
        } else {
            Ok(())
        }
    }
}

impl Drop for BrowserLease {
    fn drop(&mut self) {
        // A dropped-without-release lease (panic unwind) must not wedge the
        // count; shutdown is skipped since Drop cannot await it.
        if !self.released {
            self.shared.leases.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
