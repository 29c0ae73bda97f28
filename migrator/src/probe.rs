//! 后端 API 探测
//!
//! 迁移后逐个 GET 配置的接口，确认服务端能读取新 schema

use std::time::{Duration, Instant};

use nobal_config::ApiConfig;
use nobal_errors::{AppError, AppResult};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub endpoint: String,
    pub url: String,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Prober {
    client: reqwest::Client,
    base_url: String,
    token: Option<Secret<String>>,
}

impl Prober {
    pub fn new(api: &ApiConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(api.timeout())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token: api.token().map(|t| Secret::new(t.to_string())),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn probe(&self, endpoint: &str) -> ProbeResult {
        let url = self.url(endpoint);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let started = Instant::now();
        let response = request.send().await;
        let latency_ms = elapsed_ms(started.elapsed());

        let (status, error) = match response {
            Ok(response) => (Some(response.status()), None),
            Err(e) => (e.status(), Some(e.to_string())),
        };
        let ok = status.is_some_and(|s| s.is_success());
        if ok {
            debug!(url = %url, latency_ms, "Probe succeeded");
        } else {
            warn!(url = %url, status = ?status, error = ?error, "Probe failed");
        }

        ProbeResult {
            endpoint: endpoint.to_string(),
            url,
            status: status.map(|s| s.as_u16()),
            latency_ms,
            ok,
            error,
        }
    }

    /// 依次探测，不并发，避免压到开发环境的后端
    pub async fn probe_all(&self, endpoints: &[String]) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            results.push(self.probe(endpoint).await);
        }
        results
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn api(base_url: &str, token: Option<&str>) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            token: token.map(|t| Secret::new(t.to_string())),
            timeout_secs: 2,
            endpoints: vec![],
        }
    }

    #[tokio::test]
    async fn test_probe_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/selling/sales-orders"))
            .and(header("authorization", "Bearer dev-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let prober = Prober::new(&api(&format!("{}/api/", server.uri()), Some("dev-token"))).unwrap();
        let result = prober.probe("/selling/sales-orders").await;

        assert!(result.ok);
        assert_eq!(result.status, Some(200));
        assert_eq!(result.url, format!("{}/api/selling/sales-orders", server.uri()));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_reports_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/production/work-orders"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let prober = Prober::new(&api(&format!("{}/api", server.uri()), None)).unwrap();
        let results = prober
            .probe_all(&[
                "/production/work-orders".to_string(),
                "/production/job-cards".to_string(),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].ok);
        assert_eq!(results[0].status, Some(500));
        // 未注册的路径由 wiremock 返回 404
        assert_eq!(results[1].status, Some(404));
    }

    #[tokio::test]
    async fn test_probe_unreachable_host() {
        let prober = Prober::new(&api("http://127.0.0.1:1/api", None)).unwrap();
        let result = prober.probe("/selling/sales-orders").await;

        assert!(!result.ok);
        assert!(result.status.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_empty_token_is_not_sent() {
        let prober = Prober::new(&api("http://localhost:5001/api", Some(""))).unwrap();
        assert!(prober.token.is_none());
    }
}
