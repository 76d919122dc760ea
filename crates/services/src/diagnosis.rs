//! Printer diagnosis service client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ServiceError;

/// Body of a diagnosis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest {
    pub device_id: String,
    pub prompt: String,
    /// Latest status of the device, forwarded as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

/// Structured answer of the diagnosis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub summary: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Diagnosis service client.
pub struct DiagnosisClient {
    http: reqwest::Client,
    url: String,
}

impl DiagnosisClient {
    /// Creates a client posting to `url` with the given API key.
    pub fn new(url: &str, api_key: &str) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| ServiceError::InvalidKey)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    pub async fn diagnose(&self, request: &DiagnosisRequest) -> Result<Diagnosis, ServiceError> {
        debug!(device = %request.device_id, url = %self.url, "requesting diagnosis");
        let resp = self.http.post(&self.url).json(request).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Starts a one-shot HTTP server answering with `status` and `body`.
    /// The request head is returned through the join handle.
    async fn mock_server(status: u16, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/diagnose");
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await.unwrap_or(0);

            let resp = format!(
                "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        (url, handle)
    }

    fn request() -> DiagnosisRequest {
        DiagnosisRequest {
            device_id: "p1".into(),
            prompt: "first layer not sticking".into(),
            status: Some(serde_json::json!({"connected": true})),
        }
    }

    #[tokio::test]
    async fn diagnose_parses_answer() {
        let (url, handle) = mock_server(
            200,
            r#"{"summary":"Bed too cold","suggestions":["Raise bed to 60C","Clean the plate"]}"#,
        )
        .await;

        let client = DiagnosisClient::new(&url, "secret").unwrap();
        let diagnosis = client.diagnose(&request()).await.unwrap();
        assert_eq!(diagnosis.summary, "Bed too cold");
        assert_eq!(diagnosis.suggestions.len(), 2);

        let head = handle.await.unwrap().to_lowercase();
        assert!(head.starts_with("post /diagnose"));
        assert!(head.contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn non_success_is_api_error() {
        let (url, handle) = mock_server(503, r#"{"error":"overloaded"}"#).await;

        let client = DiagnosisClient::new(&url, "secret").unwrap();
        match client.diagnose(&request()).await {
            Err(ServiceError::Api { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.contains("overloaded"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
        handle.await.unwrap();
    }

    #[test]
    fn rejects_unprintable_key() {
        assert!(matches!(
            DiagnosisClient::new("http://localhost", "bad\nkey"),
            Err(ServiceError::InvalidKey)
        ));
    }

    #[test]
    fn request_body_shape() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["deviceId"], "p1");
        assert_eq!(json["status"]["connected"], true);

        let bare = DiagnosisRequest {
            status: None,
            ..request()
        };
        assert!(serde_json::to_value(bare).unwrap().get("status").is_none());
    }
}
