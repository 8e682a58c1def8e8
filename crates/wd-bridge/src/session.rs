use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, Instant};

use crate::errors::{DriverError, DriverResult};
use crate::meta::SessionMeta;
use crate::script::PageScript;

/// Polling parameters for [`AutomationSession::wait_until`].
#[derive(Clone, Debug)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
    pub timeout_msg: String,
}

impl WaitOptions {
    pub fn new(timeout: Duration, timeout_msg: impl Into<String>) -> Self {
        Self {
            timeout,
            interval: Duration::from_millis(100),
            timeout_msg: timeout_msg.into(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// One browser session as seen by the story commands.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// Run a synchronous page script and return its value.
    async fn execute(&self, script: &PageScript) -> DriverResult<Value>;

    /// Run an asynchronous page script; resolves with the value passed to the
    /// script's callback.
    async fn execute_async(&self, script: &PageScript) -> DriverResult<Value>;

    async fn current_url(&self) -> DriverResult<String>;

    async fn navigate(&self, url: &str) -> DriverResult<()>;

    fn meta(&self) -> &SessionMeta;

    async fn set_meta(&self, key: &str, value: Value) -> DriverResult<()> {
        self.meta().set(key, value);
        Ok(())
    }

    /// Poll `probe` until it returns `true`. Fails with `timeout_msg` once the
    /// deadline passes.
    async fn wait_until(&self, probe: &PageScript, options: &WaitOptions) -> DriverResult<()> {
        let deadline = Instant::now() + options.timeout;
        loop {
            if matches!(self.execute(probe).await?, Value::Bool(true)) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(options.timeout_msg.clone()));
            }
            sleep(options.interval).await;
        }
    }
}
