//! [`AutomationSession`] backed by an in-process preview page.

use std::time::Duration;

use async_trait::async_trait;
use harness_core_types::protocol::STORYBOOK_IFRAME_PATH;
use harness_core_types::{bindings, StoryLoadResult};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;
use wd_bridge::{AutomationSession, DriverError, DriverResult, PageScript, SessionMeta};

use crate::coordinator;
use crate::runtime::{PreviewConfig, PreviewRuntime};
use crate::window::PreviewWindow;

/// Driver capabilities of the emulated session.
#[derive(Clone, Debug)]
pub struct BrowserOptions {
    /// Async execute with a completion callback. Older drivers lack it.
    pub async_execute: bool,
    /// Sync execute; when off every sync script fails as not implemented.
    pub sync_execute: bool,
    pub current_url: bool,
    /// Deadline of one async script.
    pub script_timeout: Duration,
    /// Leave freshly navigated documents loading until
    /// [`EmulatedBrowser::finish_loading`].
    pub hold_page_load: bool,
    /// Page policy rejects injected scripts.
    pub block_injection: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            async_execute: true,
            sync_execute: true,
            current_url: true,
            script_timeout: Duration::from_secs(2),
            hold_page_load: false,
            block_injection: false,
        }
    }
}

/// One recorded driver call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowserCall {
    Navigate(String),
    CurrentUrl,
    Execute(&'static str),
    ExecuteAsync(&'static str),
}

#[derive(Default)]
struct BrowserState {
    url: String,
    runtime: Option<PreviewRuntime>,
    calls: Vec<BrowserCall>,
    failing_navigations: usize,
}

/// Browser session whose only page is an emulated storybook preview.
///
/// Navigating to an `iframe.html` URL boots a [`PreviewRuntime`] with the
/// configured stories; any other URL yields a page without a preview channel.
pub struct EmulatedBrowser {
    window: PreviewWindow,
    preview: PreviewConfig,
    options: BrowserOptions,
    state: Mutex<BrowserState>,
    meta: SessionMeta,
}

impl EmulatedBrowser {
    pub fn new(preview: PreviewConfig) -> Self {
        Self::with_options(preview, BrowserOptions::default())
    }

    pub fn with_options(preview: PreviewConfig, options: BrowserOptions) -> Self {
        let window = PreviewWindow::new();
        window.complete_load();
        Self {
            window,
            preview,
            options,
            state: Mutex::new(BrowserState {
                url: "about:blank".to_string(),
                ..BrowserState::default()
            }),
            meta: SessionMeta::default(),
        }
    }

    pub fn window(&self) -> &PreviewWindow {
        &self.window
    }

    pub fn runtime(&self) -> Option<PreviewRuntime> {
        self.state.lock().runtime.clone()
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn calls(&self) -> Vec<BrowserCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Make the next `count` navigations fail.
    pub fn fail_next_navigations(&self, count: usize) {
        self.state.lock().failing_navigations = count;
    }

    /// Complete a document held by [`BrowserOptions::hold_page_load`].
    pub fn finish_loading(&self) {
        self.window.complete_load();
        if self.preview.preview_store {
            self.window.initialize_store();
        }
    }

    /// Address bar: the preview keeps `id` in sync with the shown story.
    fn location(&self) -> String {
        let state = self.state.lock();
        let story = state
            .runtime
            .as_ref()
            .and_then(PreviewRuntime::current_story)
            .filter(|id| !id.is_empty());
        match (story, Url::parse(&state.url)) {
            (Some(story_id), Ok(mut url)) => {
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(key, _)| key != "id")
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(kept)
                    .append_pair("id", &story_id);
                url.to_string()
            }
            _ => state.url.clone(),
        }
    }

    fn record(&self, call: BrowserCall) {
        self.state.lock().calls.push(call);
    }

    fn load_page(&self, url: &str) -> Option<PreviewRuntime> {
        self.window.reset();

        let is_preview = Url::parse(url)
            .map(|parsed| parsed.path().ends_with(STORYBOOK_IFRAME_PATH))
            .unwrap_or(false);
        let runtime = is_preview.then(|| PreviewRuntime::boot(&self.window, self.preview.clone()));
        if is_preview && self.preview.addon_installed {
            coordinator::install(&self.window);
        }

        if !self.options.hold_page_load {
            self.finish_loading();
        }
        runtime
    }

    fn run_sync(&self, script: &PageScript) -> DriverResult<Value> {
        match script {
            PageScript::ProbeCoordinator => Ok(Value::Bool(self.window.has_coordinator())),
            PageScript::InjectCoordinator => {
                if self.options.block_injection {
                    return Ok(Value::Bool(false));
                }
                coordinator::install(&self.window);
                Ok(Value::Bool(true))
            }
            PageScript::StartOpenStory(request) => {
                self.window.set_flag(bindings::IS_STORY_RENDERED, false);
                if self.window.has_coordinator() {
                    let page = self.window.clone();
                    coordinator::open_story(
                        &self.window,
                        request.clone(),
                        Box::new(move |_| page.set_flag(bindings::IS_STORY_RENDERED, true)),
                    );
                }
                Ok(Value::Null)
            }
            PageScript::IsStoryRendered => {
                Ok(Value::Bool(self.window.flag(bindings::IS_STORY_RENDERED)))
            }
            PageScript::OpenStory(_) => {
                Err(DriverError::Script("done is not a function".to_string()))
            }
        }
    }
}

#[async_trait]
impl AutomationSession for EmulatedBrowser {
    async fn execute(&self, script: &PageScript) -> DriverResult<Value> {
        self.record(BrowserCall::Execute(script.name()));
        if !self.options.sync_execute {
            return Err(DriverError::not_implemented("executeScript"));
        }
        self.run_sync(script)
    }

    async fn execute_async(&self, script: &PageScript) -> DriverResult<Value> {
        self.record(BrowserCall::ExecuteAsync(script.name()));
        if !self.options.async_execute {
            return Err(DriverError::not_implemented("executeAsyncScript"));
        }

        let PageScript::OpenStory(request) = script else {
            return self.run_sync(script);
        };
        if !self.window.has_coordinator() {
            return Ok(Value::String(StoryLoadResult::not_injected().to_json_string()));
        }

        let (tx, rx) = oneshot::channel();
        coordinator::open_story(
            &self.window,
            request.clone(),
            Box::new(move |result| {
                let _ = tx.send(result.to_json_string());
            }),
        );

        match tokio::time::timeout(self.options.script_timeout, rx).await {
            Ok(Ok(payload)) => Ok(Value::String(payload)),
            Ok(Err(_)) => Err(DriverError::Script(
                "document unloaded while waiting for result".to_string(),
            )),
            Err(_) => Err(DriverError::Timeout(format!(
                "script timeout: result was not received in {}ms",
                self.options.script_timeout.as_millis()
            ))),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.record(BrowserCall::CurrentUrl);
        if !self.options.current_url {
            return Err(DriverError::not_implemented("getUrl"));
        }
        Ok(self.location())
    }

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        {
            let mut state = self.state.lock();
            state.calls.push(BrowserCall::Navigate(url.to_string()));
            if state.failing_navigations > 0 {
                state.failing_navigations -= 1;
                return Err(DriverError::Transport(format!(
                    "navigation to {url} failed: net::ERR_CONNECTION_RESET"
                )));
            }
        }

        let runtime = self.load_page(url);
        debug!(target: "emulated-browser", url, preview = runtime.is_some(), "navigated");

        let mut state = self.state.lock();
        state.url = url.to_string();
        state.runtime = runtime;
        Ok(())
    }

    fn meta(&self) -> &SessionMeta {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::StoryBehavior;
    use harness_core_types::SelectionRequest;

    fn preview() -> PreviewConfig {
        PreviewConfig::default().with_story("a--b", StoryBehavior::Renders)
    }

    #[tokio::test]
    async fn navigation_to_iframe_boots_preview() {
        let browser = EmulatedBrowser::new(preview());
        browser
            .navigate("http://localhost:6006/iframe.html")
            .await
            .unwrap();

        assert!(browser.runtime().is_some());
        assert!(browser.window().channel().is_some());
        assert!(!browser.window().has_coordinator());
    }

    #[tokio::test]
    async fn open_story_without_coordinator_reports_not_injected() {
        let browser = EmulatedBrowser::new(preview());
        browser
            .navigate("http://localhost:6006/iframe.html")
            .await
            .unwrap();

        let value = browser
            .execute_async(&PageScript::OpenStory(SelectionRequest::new("a--b")))
            .await
            .unwrap();

        let result = StoryLoadResult::from_script_value(&value).unwrap();
        assert!(result.is_not_injected());
    }

    #[tokio::test]
    async fn hanging_story_times_out() {
        let browser = EmulatedBrowser::with_options(
            PreviewConfig::default().with_story("slow", StoryBehavior::Hang),
            BrowserOptions {
                script_timeout: Duration::from_millis(50),
                ..BrowserOptions::default()
            },
        );
        browser
            .navigate("http://localhost:6006/iframe.html")
            .await
            .unwrap();
        browser.execute(&PageScript::InjectCoordinator).await.unwrap();

        let err = browser
            .execute_async(&PageScript::OpenStory(SelectionRequest::new("slow")))
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::Timeout(_)));
    }

    #[tokio::test]
    async fn address_bar_follows_selected_story() {
        let browser = EmulatedBrowser::new(preview());
        browser
            .navigate("http://localhost:6006/iframe.html?viewMode=story")
            .await
            .unwrap();
        browser.execute(&PageScript::InjectCoordinator).await.unwrap();
        browser
            .execute_async(&PageScript::OpenStory(SelectionRequest::new("a--b")))
            .await
            .unwrap();

        assert_eq!(
            browser.current_url().await.unwrap(),
            "http://localhost:6006/iframe.html?viewMode=story&id=a--b"
        );
    }

    #[tokio::test]
    async fn failing_navigation_keeps_previous_page() {
        let browser = EmulatedBrowser::new(preview());
        browser.fail_next_navigations(1);

        let err = browser
            .navigate("http://localhost:6006/iframe.html")
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::Transport(_)));
        assert_eq!(browser.url(), "about:blank");
        assert!(browser.runtime().is_none());
    }
}
