use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{FieldcallError, FieldcallResult};
use crate::models::{ActiveCall, ChatSession, Message, Responder, VideoRequest};

use super::traits::{
    CallRoom, ChatStart, DirectoryClient, OutgoingMessage, OutgoingSignal, RequestDraft,
};

/// [`DirectoryClient`] over the consultation service's REST API.
pub struct HttpDirectoryClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout_secs: u64,
}

impl HttpDirectoryClient {
    pub fn new(config: &ApiConfig, token: Option<String>) -> FieldcallResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FieldcallError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> FieldcallResult<Self> {
        let config = ApiConfig {
            base_url: base_url.into(),
            ..ApiConfig::default()
        };
        Self::new(&config, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> FieldcallError {
        if err.is_timeout() {
            FieldcallError::RequestTimeout(self.timeout_secs)
        } else {
            err.into()
        }
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> FieldcallResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(path = %path, status = status.as_u16(), "Directory request completed");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_detail(&body).unwrap_or_else(|| status.to_string());
        warn!(path = %path, status = status.as_u16(), "Directory request failed: {}", message);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FieldcallError::ApiAuthenticationFailed(message)
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                FieldcallError::ApiServiceUnavailable(message)
            }
            _ => FieldcallError::ApiStatus {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> FieldcallResult<T> {
        let response = self.send(self.client.get(self.url(path)), path).await?;
        decode(response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> FieldcallResult<Response> {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request, path).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> FieldcallResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FieldcallError::NetworkError(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| FieldcallError::ApiParseError(e.to_string()))
}

/// FastAPI-style `{"detail": "..."}` bodies, falling back to the raw text.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value
            .get("detail")
            .or_else(|| value.get("message"))
            .map(|d| match d.as_str() {
                Some(s) => s.to_string(),
                None => d.to_string(),
            })
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

fn string_field(value: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn list_responders(&self) -> FieldcallResult<Vec<Responder>> {
        self.get_json("/api/specialists/available").await
    }

    async fn list_pending_requests(&self) -> FieldcallResult<Vec<VideoRequest>> {
        self.get_json("/api/consultations/video-requests/pending")
            .await
    }

    async fn list_own_requests(&self) -> FieldcallResult<Vec<VideoRequest>> {
        self.get_json("/api/consultations/video-requests/my-requests")
            .await
    }

    async fn list_active_calls(&self) -> FieldcallResult<Vec<ActiveCall>> {
        self.get_json("/api/consultations/video-calls/active").await
    }

    async fn list_chats(&self) -> FieldcallResult<Vec<ChatSession>> {
        self.get_json("/api/consultations/chats/active").await
    }

    async fn create_request(
        &self,
        responder_id: &str,
        draft: &RequestDraft,
    ) -> FieldcallResult<VideoRequest> {
        let path = format!("/api/consultations/request-video/{}", responder_id);
        let response = self.post(&path, Some(draft)).await?;
        let value: serde_json::Value = decode(response).await?;

        if let Ok(request) = serde_json::from_value::<VideoRequest>(value.clone()) {
            return Ok(request);
        }

        // The service may answer with only an acknowledgement and the new id.
        let id = string_field(&value, &["request_id", "id", "_id"]).ok_or_else(|| {
            FieldcallError::ApiParseError(
                "request-video response carries no request id".to_string(),
            )
        })?;

        Ok(VideoRequest {
            id,
            requester_id: string_field(&value, &["farmer_id"]).unwrap_or_default(),
            requester_name: string_field(&value, &["farmer_name"]).unwrap_or_default(),
            responder_id: Some(responder_id.to_string()),
            responder_name: string_field(&value, &["specialist_name"]),
            topic: draft.topic.clone(),
            description: draft.description.clone(),
            urgency: draft.urgency,
            status: Default::default(),
            created_at: Utc::now(),
        })
    }

    async fn accept_request(&self, request_id: &str) -> FieldcallResult<()> {
        let path = format!("/api/consultations/{}/accept-video", request_id);
        self.post::<()>(&path, None).await?;
        Ok(())
    }

    async fn start_call(&self, request_id: &str) -> FieldcallResult<CallRoom> {
        let path = format!("/api/consultations/{}/start-video", request_id);
        let response = self.post::<()>(&path, None).await?;
        decode(response).await
    }

    async fn start_chat(&self, responder_id: &str, topic: &str) -> FieldcallResult<ChatStart> {
        let path = format!("/api/consultations/start-chat/{}", responder_id);
        let body = serde_json::json!({ "topic": topic });
        let response = self.post(&path, Some(&body)).await?;
        decode(response).await
    }

    async fn end_session(&self, session_id: &str) -> FieldcallResult<()> {
        let path = format!("/api/consultations/{}/end", session_id);
        self.post::<()>(&path, None).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        session_id: &str,
        message: &OutgoingMessage,
    ) -> FieldcallResult<()> {
        let path = format!("/api/consultations/{}/messages", session_id);
        self.post(&path, Some(message)).await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> FieldcallResult<Vec<Message>> {
        let path = format!("/api/consultations/{}/messages", session_id);
        self.get_json(&path).await
    }
    async fn send_signal(
        &self,
        session_id: &str,
        signal: &OutgoingSignal,
    ) -> FieldcallResult<()> {
        let path = format!("/api/consultations/{}/webrtc-signal", session_id);
        self.post(&path, Some(signal)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "Request not found"}"#).as_deref(),
            Some("Request not found")
        );
        assert_eq!(error_detail("Bad Gateway").as_deref(), Some("Bad Gateway"));
        assert_eq!(error_detail("   "), None);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpDirectoryClient::with_base_url("http://localhost:8000/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.url("/api/specialists/available"),
            "http://localhost:8000/api/specialists/available"
        );
    }
}
