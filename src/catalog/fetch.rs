use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{CatalogError, CatalogResult};

/// Pause between attempts on one resource.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// Deadline of a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct PollSettings {
    /// Overall deadline across all resources.
    pub timeout: Duration,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl PollSettings {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: CHECK_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Poll every url concurrently; the first JSON document wins.
pub async fn wait_storybook_data_json(
    urls: &[String],
    settings: &PollSettings,
) -> CatalogResult<Value> {
    let client = Client::builder()
        .timeout(settings.request_timeout)
        .build()?;

    let mut pollers = JoinSet::new();
    for url in urls {
        let client = client.clone();
        let url = url.clone();
        let interval = settings.interval;
        pollers.spawn(async move { poll_resource(&client, &url, interval).await });
    }

    let timed_out = || CatalogError::Timeout {
        timeout_ms: settings.timeout.as_millis(),
    };
    let deadline = tokio::time::Instant::now() + settings.timeout;
    let first = loop {
        match tokio::time::timeout_at(deadline, pollers.join_next()).await {
            Ok(Some(Ok(data))) => break Ok(data),
            Ok(Some(Err(err))) => {
                warn!(target: "catalog", error = %err, "stories json poller stopped");
            }
            Ok(None) | Err(_) => break Err(timed_out()),
        }
    };
    pollers.abort_all();
    first
}

async fn poll_resource(client: &Client, url: &str, interval: Duration) -> Value {
    loop {
        match fetch_json(client, url).await {
            Ok(data) => {
                debug!(target: "catalog", url, "stories json received");
                return data;
            }
            Err(FetchError::Http(err)) if is_connection_refused(&err) => {}
            Err(err) => {
                warn!(target: "catalog", url, error = %err, "Fetching stories json failed");
            }
        }
        tokio::time::sleep(interval).await;
    }
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("response is not json: {0}")]
    Json(#[from] serde_json::Error),
}

async fn fetch_json(client: &Client, url: &str) -> Result<Value, FetchError> {
    let text = client.get(url).send().await?.text().await?;
    Ok(serde_json::from_str(&text)?)
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    if !err.is_connect() {
        return false;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<io::Error>() {
            return io.kind() == io::ErrorKind::ConnectionRefused;
        }
        source = cause.source();
    }
    false
}
