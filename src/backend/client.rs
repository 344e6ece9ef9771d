use super::{
    AckResponse, ProjectResponse, ProjectResult, PushSubscription, TemplatesResponse,
    UnsubscribeRequest, WidgetIdentity,
};
use crate::error::{PingletError, Result};
use crate::render::Template;
use crate::signing::{encode_component, RequestSigner};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Timeout for regular JSON calls. The SSE request has none.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    endpoint: String,
    identity: WidgetIdentity,
    signer: RequestSigner,
}

impl BackendClient {
    pub fn new(endpoint: impl Into<String>, identity: WidgetIdentity, signer: RequestSigner) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            identity,
            signer,
        }
    }

    pub fn identity(&self) -> &WidgetIdentity {
        &self.identity
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.endpoint, path_and_query)
    }

    /// Header set for one request: identity, millisecond timestamp and the
    /// signature over the canonical request.
    pub fn signed_headers(&self, method: &str, path_and_query: &str, body: Option<&Value>) -> Result<HeaderMap> {
        let signature = self.signer.sign(method, path_and_query, body)?;
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();

        let pairs = [
            ("X-Project-ID", self.identity.project_id.as_str()),
            ("X-Timestamp", timestamp.as_str()),
            ("X-Pinglet-Signature", signature.as_str()),
            ("X-Pinglet-Checksum", self.identity.checksum.as_str()),
            ("X-Pinglet-Version", self.identity.version.as_str()),
            ("X-Configured-Domain", self.identity.configured_domain.as_str()),
            ("X-Pinglet-Id", self.identity.pinglet_id.as_str()),
        ];

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let invalid = |e: &dyn std::fmt::Display| PingletError::Signature(format!("invalid {} header: {}", name, e));
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(&e))?;
            let value = HeaderValue::from_str(value).map_err(|e| invalid(&e))?;
            headers.insert(header, value);
        }
        Ok(headers)
    }

    /// Build a request carrying the signed header set. Signing failures abort
    /// before anything is sent.
    fn signed(&self, method: Method, path_and_query: &str, body: Option<&Value>) -> Result<RequestBuilder> {
        let headers = self.signed_headers(method.as_str(), path_and_query, body)?;
        let mut request = self
            .client
            .request(method, self.url(path_and_query))
            .headers(headers);

        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request)
    }

    /// `GET /load/projects`. Every failure here is a [`PingletError::ConfigLoad`].
    pub async fn load_project(&self, project_id: &str, domain: &str) -> Result<ProjectResult> {
        let path = format!(
            "/load/projects?projectId={}&domain={}",
            encode_component(project_id),
            encode_component(domain)
        );

        let response = self
            .signed(Method::GET, &path, None)?
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| PingletError::ConfigLoad(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PingletError::ConfigLoad(format!("backend returned {}", status)));
        }

        let parsed: ProjectResponse = serde_json::from_str(&text)
            .map_err(|e| PingletError::ConfigLoad(format!("malformed response: {}", e)))?;

        if !parsed.success {
            return Err(PingletError::ConfigLoad(
                parsed.message.unwrap_or_else(|| "project could not be loaded".to_string()),
            ));
        }

        let result = parsed
            .result
            .ok_or_else(|| PingletError::ConfigLoad("response has no result".to_string()))?;

        tracing::debug!(
            "Loaded project {} (premium: {})",
            project_id,
            result.is_premium
        );
        Ok(result)
    }

    /// `GET /load/templates`
    pub async fn load_templates(&self) -> Result<HashMap<String, Template>> {
        let path = format!(
            "/load/templates?projectId={}",
            encode_component(&self.identity.project_id)
        );

        let response = self
            .signed(Method::GET, &path, None)?
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PingletError::Other(format!("template load returned {}", status)));
        }

        let parsed: TemplatesResponse = response.json().await?;
        if !parsed.success {
            return Err(PingletError::Other(
                parsed.message.unwrap_or_else(|| "templates could not be loaded".to_string()),
            ));
        }

        tracing::info!("Loaded {} templates", parsed.result.len());
        Ok(parsed.result)
    }

    /// `POST /subscribe`
    pub async fn subscribe(&self, subscription: &PushSubscription) -> Result<()> {
        let path = format!(
            "/subscribe?projectId={}",
            encode_component(&self.identity.project_id)
        );
        let body = serde_json::to_value(subscription)?;
        self.post_ack(&path, &body).await
    }

    /// `POST /unsubscribe`
    pub async fn unsubscribe(&self, endpoint: &str) -> Result<()> {
        let body = serde_json::to_value(UnsubscribeRequest {
            endpoint: endpoint.to_string(),
            project_id: self.identity.project_id.clone(),
        })?;
        self.post_ack("/unsubscribe", &body).await
    }

    async fn post_ack(&self, path: &str, body: &Value) -> Result<()> {
        let response = self
            .signed(Method::POST, path, Some(body))?
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| PingletError::Subscription(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PingletError::Subscription(format!("{} returned {}", path, status)));
        }

        let ack: AckResponse = response
            .json()
            .await
            .map_err(|e| PingletError::Subscription(format!("malformed response: {}", e)))?;

        if !ack.success {
            return Err(PingletError::Subscription(
                ack.message.unwrap_or_else(|| format!("{} was rejected", path)),
            ));
        }
        Ok(())
    }

    /// Open `GET /sse`. The returned response body is the event stream.
    /// `last_event_id` resumes after the last message seen on a previous
    /// connection.
    pub async fn open_stream(&self, last_event_id: Option<&str>) -> Result<reqwest::Response> {
        let path = format!(
            "/sse?projectId={}&pingletId={}",
            encode_component(&self.identity.project_id),
            encode_component(&self.identity.pinglet_id)
        );

        let mut request = self
            .signed(Method::GET, &path, None)?
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PingletError::Other(format!("stream handshake returned {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.to_ascii_lowercase().starts_with("text/event-stream") {
            return Err(PingletError::Other(format!(
                "stream handshake returned content type {:?}",
                content_type
            )));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{client_for, identity, subscription};
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_load_project_sends_signed_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/load/projects"))
            .and(query_param("projectId", "proj-1"))
            .and(query_param("domain", "example.com"))
            .and(header_exists("X-Pinglet-Signature"))
            .and(header_exists("X-Timestamp"))
            .and(header_exists("X-Pinglet-Checksum"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "ok",
                "result": {"config": {"duration": 1000}, "template": {}, "is_premium": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).load_project("proj-1", "example.com").await.unwrap();
        assert_eq!(result.config["duration"], 1000);
        assert!(result.is_premium);
    }

    #[tokio::test]
    async fn test_load_project_failure_is_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/load/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "domain not allowed"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).load_project("proj-1", "example.com").await.unwrap_err();
        match err {
            PingletError::ConfigLoad(msg) => assert_eq!(msg, "domain not allowed"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_project_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/load/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).load_project("proj-1", "example.com").await.unwrap_err();
        assert!(matches!(err, PingletError::ConfigLoad(_)));
    }

    #[tokio::test]
    async fn test_unsigned_request_is_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(0)
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri(), identity(), RequestSigner::new(""));
        let err = client.subscribe(&subscription()).await.unwrap_err();
        assert!(matches!(err, PingletError::Signature(_)));
    }

    #[tokio::test]
    async fn test_signed_header_set() {
        let server = MockServer::start().await;
        let headers = client_for(&server)
            .signed_headers("get", "/sse?pingletId=w&projectId=p", None)
            .unwrap();

        assert_eq!(headers.len(), 7);
        assert_eq!(headers["x-project-id"], "proj-1");
        assert_eq!(headers["x-pinglet-id"], "pinglet-1");
        let timestamp: i64 = headers["x-timestamp"].to_str().unwrap().parse().unwrap();
        assert!(timestamp > 1_600_000_000_000);

        let expected = RequestSigner::new("secret")
            .sign("GET", "/sse?projectId=p&pingletId=w", None)
            .unwrap();
        assert_eq!(headers["x-pinglet-signature"], expected.as_str());
        assert_eq!(expected.len(), 128);
    }

    #[tokio::test]
    async fn test_unsubscribe_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/unsubscribe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
            .mount(&server)
            .await;

        let err = client_for(&server).unsubscribe("https://push.example/abc").await.unwrap_err();
        assert!(matches!(err, PingletError::Subscription(_)));
    }

    #[tokio::test]
    async fn test_stream_handshake_requires_event_stream_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream; charset=utf-8"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.open_stream(None).await.unwrap_err();
        assert!(matches!(err, PingletError::Other(ref msg) if msg.contains("content type")));
        assert!(client.open_stream(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_stream_resumes_with_last_event_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .and(header("Last-Event-ID", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client_for(&server).open_stream(Some("42")).await.is_ok());
    }
}
