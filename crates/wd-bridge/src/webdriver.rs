//! W3C WebDriver client backing [`AutomationSession`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, Instrument};
use url::Url;

use crate::errors::{DriverError, DriverResult};
use crate::meta::SessionMeta;
use crate::model::{
    ExecuteScriptRequest, NavigateToUrlRequest, NewSessionRequest, SessionCreated, WireError,
    WireResponse,
};
use crate::script::PageScript;
use crate::session::AutomationSession;
use crate::trace::BridgeTracer;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebDriverConfig {
    pub endpoint: String,
    pub capabilities: Value,
    pub request_timeout_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4444".to_string(),
            capabilities: default_capabilities(),
            request_timeout_ms: 60_000,
        }
    }
}

pub fn default_capabilities() -> Value {
    json!({
        "browserName": "chrome",
        "goog:chromeOptions": { "args": ["--headless=new", "--disable-gpu"] }
    })
}

pub struct WebDriverSession {
    client: Client,
    endpoint: Url,
    session_id: String,
    capabilities: Value,
    meta: SessionMeta,
    tracer: BridgeTracer,
}

impl WebDriverSession {
    /// Open a new session on the remote end.
    pub async fn connect(cfg: &WebDriverConfig) -> DriverResult<Self> {
        let endpoint = parse_endpoint(&cfg.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;

        let body = serde_json::to_value(NewSessionRequest::new(cfg.capabilities.clone()))
            .map_err(|err| DriverError::Protocol(err.to_string()))?;
        let value = send(&client, Method::POST, join(&endpoint, "session"), Some(body)).await?;
        let created: SessionCreated =
            serde_json::from_value(value).map_err(|err| DriverError::Protocol(err.to_string()))?;

        info!(
            target: "wd-bridge",
            endpoint = %endpoint,
            session = %created.session_id,
            "webdriver session created"
        );

        Ok(Self {
            client,
            endpoint,
            session_id: created.session_id,
            capabilities: created.capabilities,
            meta: SessionMeta::default(),
            tracer: BridgeTracer,
        })
    }

    /// Reuse a session created elsewhere.
    pub fn attach(endpoint: &str, session_id: impl Into<String>) -> DriverResult<Self> {
        Ok(Self {
            client: Client::new(),
            endpoint: parse_endpoint(endpoint)?,
            session_id: session_id.into(),
            capabilities: Value::Null,
            meta: SessionMeta::default(),
            tracer: BridgeTracer,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    pub async fn close(self) -> DriverResult<()> {
        let url = join(&self.endpoint, &format!("session/{}", self.session_id));
        send(&self.client, Method::DELETE, url, None).await?;
        info!(target: "wd-bridge", session = %self.session_id, "webdriver session closed");
        Ok(())
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> DriverResult<Value> {
        let url = join(
            &self.endpoint,
            &format!("session/{}/{}", self.session_id, path),
        );
        send(&self.client, method, url, body)
            .instrument(self.tracer.span(path))
            .await
    }

    async fn run_script(&self, path: &str, script: &PageScript) -> DriverResult<Value> {
        let request = ExecuteScriptRequest {
            script: script.source(),
            args: script.arguments(),
        };
        let body =
            serde_json::to_value(request).map_err(|err| DriverError::Protocol(err.to_string()))?;
        debug!(target: "wd-bridge", script = script.name(), path, "executing page script");
        self.command(Method::POST, path, Some(body)).await
    }
}

#[async_trait]
impl AutomationSession for WebDriverSession {
    async fn execute(&self, script: &PageScript) -> DriverResult<Value> {
        self.run_script("execute/sync", script).await
    }

    async fn execute_async(&self, script: &PageScript) -> DriverResult<Value> {
        self.run_script("execute/async", script).await
    }

    async fn current_url(&self) -> DriverResult<String> {
        match self.command(Method::GET, "url", None).await? {
            Value::String(url) => Ok(url),
            other => Err(DriverError::Protocol(format!("url is not a string: {other}"))),
        }
    }

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let body = serde_json::to_value(NavigateToUrlRequest { url })
            .map_err(|err| DriverError::Protocol(err.to_string()))?;
        self.command(Method::POST, "url", Some(body)).await?;
        Ok(())
    }

    fn meta(&self) -> &SessionMeta {
        &self.meta
    }
}

fn parse_endpoint(raw: &str) -> DriverResult<Url> {
    Url::parse(raw).map_err(|err| DriverError::Protocol(format!("invalid endpoint {raw}: {err}")))
}

fn join(endpoint: &Url, path: &str) -> String {
    format!("{}/{}", endpoint.as_str().trim_end_matches('/'), path)
}

async fn send(
    client: &Client,
    method: Method,
    url: String,
    body: Option<Value>,
) -> DriverResult<Value> {
    let mut request = client.request(method, &url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let payload = match serde_json::from_str::<WireResponse>(&text) {
        Ok(payload) => payload,
        Err(_) if matches!(status, StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED) => {
            return Err(DriverError::not_implemented(url));
        }
        Err(err) => {
            return Err(DriverError::Protocol(format!("{url} answered {status}: {err}")));
        }
    };

    if !status.is_success() {
        return Err(match serde_json::from_value::<WireError>(payload.value) {
            Ok(error) => DriverError::from_wire(&error.error, &error.message),
            Err(_) => DriverError::command(status.as_str(), format!("{url} answered {status}")),
        });
    }

    Ok(payload.value)
}
