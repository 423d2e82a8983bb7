use crate::clock::Clock;
use crate::config::Config;
use crate::errors::AppError;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Total attempts (first try included) for a rate-limited call.
pub const MAX_ATTEMPTS: u32 = 3;

/// Shape of one call against the validation API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/jobs/abc/results`.
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    /// Per-request override; `None` uses the transport's configured timeout.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            query: Vec::new(),
            timeout: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body,
            query: Vec::new(),
            timeout: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Failure of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportError {
    /// HTTP status, or `None` when no response was received.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }
}

/// Executes one authenticated request. Credentials are the implementor's concern.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<Value, TransportError>;
}

/// reqwest-backed transport that injects the API key header.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    api_key_header: String,
    api_key: String,
}

impl ReqwestTransport {
    /// Creates a new `ReqwestTransport`.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration holding the base URL and API key.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key_header: config.api_key_header.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Pulls a readable message out of an error body (`message`, `error`, `detail`).
fn error_message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        body.trim().to_string()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!(
            "{} {} (query: {:?})",
            request.method,
            url,
            request.query
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(self.api_key_header.as_str(), self.api_key.as_str())
            .header("Accept", "application/json");
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::network(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(TransportError::status(
                status.as_u16(),
                error_message_from_body(&text),
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_str(&text)
            .map_err(|e| TransportError::network(format!("Failed to parse response: {}", e)))
    }
}

/// Remote call wrapper: one logical call, retried on 429 with exponential backoff.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    base_delay: Duration,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>, base_delay: Duration) -> Self {
        Self {
            transport,
            clock,
            base_delay,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Delay before the retry that follows attempt `attempt` (0-based).
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Executes `request`, retrying only on HTTP 429.
    ///
    /// `operation` names the call in error messages (e.g. "Create job").
    pub async fn call(&self, operation: &str, request: ApiRequest) -> Result<Value, AppError> {
        let mut attempt = 0;
        loop {
            match self.transport.send(&request).await {
                Ok(body) => {
                    if attempt > 0 {
                        tracing::info!("✓ {} succeeded after {} retries", operation, attempt);
                    }
                    return Ok(body);
                }
                Err(err) if err.is_rate_limited() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        "{} rate limited (attempt {}/{}), retrying in {:?}",
                        operation,
                        attempt + 1,
                        MAX_ATTEMPTS,
                        delay
                    );
                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(into_app_error(operation, err)),
            }
        }
    }
}

fn into_app_error(operation: &str, err: TransportError) -> AppError {
    match err.status {
        Some(status_code) => {
            tracing::error!(
                "{} failed with status {}: {}",
                operation,
                status_code,
                err.message
            );
            AppError::RemoteApi {
                operation: operation.to_string(),
                status_code,
                message: err.message,
            }
        }
        None => {
            tracing::error!("{} failed: {}", operation, err.message);
            AppError::Transport(format!("{} failed: {}", operation, err.message))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use crate::clock::testing::ManualClock;
    use serde_json::json;

    fn client(transport: Arc<ScriptedTransport>, clock: Arc<ManualClock>) -> ApiClient {
        ApiClient::new(transport, clock, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_retries_429_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(TransportError::status(429, "slow down")),
            Err(TransportError::status(429, "slow down")),
            Ok(json!({"ok": true})),
        ]));
        let clock = Arc::new(ManualClock::new());
        let api = client(transport.clone(), clock.clone());

        let body = api.call("Validate email", ApiRequest::get("/x")).await.unwrap();

        assert_eq!(body, json!({"ok": true}));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let transport = Arc::new(ScriptedTransport::repeating(Err(TransportError::status(
            429, "slow down",
        ))));
        let clock = Arc::new(ManualClock::new());
        let api = client(transport.clone(), clock.clone());

        let err = api.call("Create job", ApiRequest::get("/jobs")).await.unwrap_err();

        assert_eq!(transport.call_count(), MAX_ATTEMPTS as usize);
        assert_eq!(clock.sleeps().len(), 2);
        match err {
            AppError::RemoteApi { status_code, .. } => assert_eq!(status_code, 429),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_statuses_are_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::status(
            500, "kaboom",
        ))]));
        let clock = Arc::new(ManualClock::new());
        let api = client(transport.clone(), clock.clone());

        let err = api.call("Get usage", ApiRequest::get("/billing/usage")).await.unwrap_err();

        assert_eq!(transport.call_count(), 1);
        assert!(clock.sleeps().is_empty());
        assert_eq!(err.error_code(), json!(500));
    }

    #[tokio::test]
    async fn test_network_errors_map_to_transport() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::network(
            "connection refused",
        ))]));
        let api = client(transport, Arc::new(ManualClock::new()));

        let err = api.call("List jobs", ApiRequest::get("/jobs")).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message_from_body(r#"{"message":"bad email"}"#), "bad email");
        assert_eq!(error_message_from_body(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message_from_body(""), "Unknown error");
        assert_eq!(error_message_from_body("plain text"), "plain text");
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("/jobs")
            .query("limit", 10)
            .timeout(Duration::from_secs(5));
        assert_eq!(request.query, vec![("limit".to_string(), "10".to_string())]);
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert_eq!(ApiRequest::get("/jobs").timeout, None);
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let base = Duration::from_secs(u64::MAX / 2 + 1);
        let api = ApiClient::new(transport, Arc::new(ManualClock::new()), base);
        assert_eq!(api.backoff_delay(0), base);
        assert_eq!(api.backoff_delay(1), Duration::MAX);
        assert_eq!(api.backoff_delay(40), Duration::MAX);
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let api = ApiClient::new(transport, Arc::new(ManualClock::new()), Duration::from_millis(250));
        assert_eq!(api.backoff_delay(0), Duration::from_millis(250));
        assert_eq!(api.backoff_delay(1), Duration::from_millis(500));
    }
}
