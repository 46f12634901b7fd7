//! Chromiumoxide-based browser runtime.
//!
//! Implements [`BrowserRuntime`](crate::browser::BrowserRuntime) on top of
//! the `chromiumoxide` crate: local launch only, one CDP event handler task
//! per process, pages handed out as owned drivers.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser::{BrowserError, BrowserRuntime, LaunchPlan};
use crate::dom_scripts::STEALTH_SCRIPT;
use crate::page::{ChromiumPageDriver, PageDriver};

pub struct ChromiumoxideRuntime {
    state: Mutex<Option<RuntimeState>>,
}

struct RuntimeState {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    user_agent: String,
}

impl ChromiumoxideRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

impl Default for ChromiumoxideRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn build_config(plan: &LaunchPlan) -> Result<BrowserConfig, BrowserError> {
    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: plan.viewport.width,
        height: plan.viewport.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: plan.viewport.width >= plan.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();

    if let Some(path) = &plan.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder
        .viewport(viewport)
        .args(plan.args.clone())
        .arg(format!("--user-agent={}", plan.user_agent));

    let builder = if plan.headless {
        builder
    } else {
        builder.with_head()
    };

    builder.build().map_err(BrowserError::Launch)
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                log::warn!("chromiumoxide handler error: {err}");
            }
        }
    })
}

#[async_trait]
impl BrowserRuntime for ChromiumoxideRuntime {
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), BrowserError> {
        let mut guard = self.state.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let config = build_config(plan)?;
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        *guard = Some(RuntimeState {
            browser: Arc::new(browser),
            handler: spawn_handler(handler),
            user_agent: plan.user_agent.clone(),
        });

        Ok(())
    }

    async fn new_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let (browser, user_agent) = {
            let guard = self.state.lock().await;
            let state = guard.as_ref().ok_or(BrowserError::NotLaunched)?;
            (state.browser.clone(), state.user_agent.clone())
        };

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| BrowserError::Page(err.to_string()))?;

        page.set_user_agent(user_agent.as_str())
            .await
            .map_err(|err| BrowserError::Page(err.to_string()))?;

        // Injected before any document script runs on every navigation.
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|err| BrowserError::Page(err.to_string()))?;

        Ok(Box::new(ChromiumPageDriver::new(page)))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        let state = {
            let mut guard = self.state.lock().await;
            guard.take()
        };

        if let Some(state) = state {
            // Dropping the last browser reference kills the child process;
            // the handler task just needs to stop pumping events first.
            state.handler.abort();
            drop(state.browser);
        }

        Ok(())
    }
}
