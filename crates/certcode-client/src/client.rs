use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use certcode_core::{ApiConfig, CodeTrace, CERT_CODE_VERSION};

use crate::error::ClientError;

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests in flight during a batch unless the caller says otherwise
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Outcome of submitting one trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub success: bool,
    pub trace_id: Option<String>,
    pub error: Option<String>,
    /// Evaluation returned inline by the API, if any
    pub evaluation: Option<Value>,
}

impl SubmitResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Client for the CERT evaluation API.
///
/// Holds one pooled `reqwest::Client`; clones share it.
#[derive(Debug, Clone)]
pub struct CertClient {
    http: Client,
    base_url: String,
    project_id: Option<String>,
}

impl CertClient {
    pub fn new(api: &ApiConfig) -> Result<Self, ClientError> {
        let key = api
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ClientError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {key}"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(format!("cert-code/{CERT_CODE_VERSION}"))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: api.url.trim_end_matches('/').to_string(),
            project_id: None,
        })
    }

    /// Project applied to traces that do not carry their own
    pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Post one trace. Failures are reported in the result, never raised.
    pub async fn submit(&self, trace: &CodeTrace) -> SubmitResult {
        let mut wire = trace.to_wire();
        if wire.project_id.is_none() {
            wire.project_id = self.project_id.clone();
        }

        let url = format!("{}/traces", self.base_url);
        debug!(url = %url, name = %wire.name, "Submitting trace");

        let response = match self.http.post(&url).json(&wire).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Request failed");
                return SubmitResult::failure(format!("Request failed: {e}"));
            }
        };

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        if let Some(message) = api_error(status, &body) {
            error!(status = status.as_u16(), error = %message, "API error");
            return SubmitResult::failure(message);
        }

        let trace_id = ["id", "trace_id"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .map(str::to_string);
        info!(trace_id = ?trace_id, "Trace submitted");

        SubmitResult {
            success: true,
            trace_id,
            error: None,
            evaluation: body.get("evaluation").filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Submit traces with at most `concurrency` requests in flight.
    /// Results come back in input order and one failure never affects
    /// another.
    pub async fn submit_batch(&self, traces: &[CodeTrace], concurrency: usize) -> Vec<SubmitResult> {
        let concurrency = concurrency.max(1);
        debug!(count = traces.len(), concurrency, "Submitting batch");

        stream::iter(traces.iter().map(|trace| self.submit(trace)))
            .buffered(concurrency)
            .collect()
            .await
    }

    /// API root: the base URL without its `/v1` version segment
    pub fn api_root(&self) -> &str {
        self.base_url
            .strip_suffix("/v1")
            .unwrap_or(&self.base_url)
    }

    /// GET `<api root>/health` and report the status
    pub async fn health(&self) -> Result<StatusCode, ClientError> {
        let url = format!("{}/health", self.api_root());
        let response = self
            .http
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        Ok(response.status())
    }
}

/// Map an error status to the message reported to the user
fn api_error(status: StatusCode, body: &Value) -> Option<String> {
    let message = match status {
        StatusCode::UNAUTHORIZED => "Invalid API key".to_string(),
        StatusCode::FORBIDDEN => "Access denied to project".to_string(),
        s if s.is_client_error() || s.is_server_error() => body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
        _ => return None,
    };
    Some(format!("CERT API Error ({}): {}", status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_api_key() {
        let api = ApiConfig::default();
        assert!(matches!(
            CertClient::new(&api),
            Err(ClientError::MissingApiKey)
        ));

        let api = ApiConfig {
            key: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            CertClient::new(&api),
            Err(ClientError::MissingApiKey)
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let api = ApiConfig {
            url: "http://localhost:8080/api/v1/".to_string(),
            key: Some("sk_test".to_string()),
        };
        let client = CertClient::new(&api).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api/v1");
        assert_eq!(client.api_root(), "http://localhost:8080/api");
    }

    #[test]
    fn test_api_error_messages() {
        assert_eq!(
            api_error(StatusCode::UNAUTHORIZED, &Value::Null).as_deref(),
            Some("CERT API Error (401): Invalid API key")
        );
        assert_eq!(
            api_error(StatusCode::FORBIDDEN, &json!({"error": "ignored"})).as_deref(),
            Some("CERT API Error (403): Access denied to project")
        );
        assert_eq!(
            api_error(StatusCode::UNPROCESSABLE_ENTITY, &json!({"error": "bad trace"})).as_deref(),
            Some("CERT API Error (422): bad trace")
        );
        assert_eq!(
            api_error(StatusCode::INTERNAL_SERVER_ERROR, &Value::Null).as_deref(),
            Some("CERT API Error (500): Unknown error")
        );
        assert!(api_error(StatusCode::CREATED, &Value::Null).is_none());
    }
}
