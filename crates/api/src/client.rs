//! HTTP client with credential attachment and session rejection.
//!
//! Every request goes through [`ApiClient::dispatch`]. Outgoing requests get the
//! current bearer token when one exists. Failed responses on authenticated
//! requests are inspected once: a 401, a 403 (when the policy says so) or a
//! "user not found" body means the session is dead, and the owning
//! [`SessionHandle`] is told to drop exactly the token that was sent.

use std::sync::Arc;
use std::time::Duration;

use pantry_config::{ApiConfig, SessionConfig};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult, RejectionReason};

/// Source of credentials and sink for session rejection.
///
/// Implemented by the session owner. `reject_token` must clear the session only
/// if `token` is still the active one and return whether it did, so that a
/// burst of failures for the same token results in a single clear.
pub trait SessionHandle: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
    fn reject_token(&self, token: &str, reason: RejectionReason) -> bool;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<dyn SessionHandle>,
    forbidden_ends_session: bool,
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        policy: &SessionConfig,
        session: Arc<dyn SessionHandle>,
    ) -> ApiResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|error| ApiError::InvalidUrl(format!("{base_url}: {error}")))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url,
            session,
            forbidden_ends_session: policy.forbidden_ends_session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http.request(method, url)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        let body = self.dispatch(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub(crate) async fn send_unit(&self, request: RequestBuilder) -> ApiResult<()> {
        self.dispatch(request).await.map(|_| ())
    }

    async fn dispatch(&self, request: RequestBuilder) -> ApiResult<Vec<u8>> {
        let token = self.session.bearer_token();
        let request = match token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|error| {
            warn!(%error, "request failed before a response arrived");
            ApiError::Transport(error)
        })?;

        let status = response.status();
        let path = response.url().path().to_string();
        let body = response.bytes().await?.to_vec();

        if status.is_success() {
            debug!(status = status.as_u16(), %path, "backend response");
            return Ok(body);
        }

        let message = error_message(&body);
        debug!(status = status.as_u16(), %path, %message, "backend error");

        if let Some(token) = token {
            if let Some(reason) = self.rejection_reason(status, &message) {
                if self.session.reject_token(&token, reason) {
                    warn!(%reason, %path, "session rejected by backend, credentials cleared");
                }
                return Err(ApiError::SessionRejected {
                    status: status.as_u16(),
                    reason,
                });
            }
        }

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn rejection_reason(&self, status: StatusCode, message: &str) -> Option<RejectionReason> {
        if status == StatusCode::UNAUTHORIZED {
            Some(RejectionReason::Unauthenticated)
        } else if status == StatusCode::FORBIDDEN && self.forbidden_ends_session {
            Some(RejectionReason::Forbidden)
        } else if message.to_ascii_lowercase().contains("user not found") {
            Some(RejectionReason::UserGone)
        } else {
            None
        }
    }
}

/// Pull a human readable message out of an error body: `message`, then
/// `error`, then a bare JSON string, then the raw text.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => ["message", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|value| value.as_str()))
            .map(str::to_string)
            .unwrap_or_default(),
        Ok(serde_json::Value::String(text)) => text,
        _ => String::from_utf8_lossy(body).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_message_field() {
        let body = br#"{"error":"Not Found","message":"User not found"}"#;
        assert_eq!(error_message(body), "User not found");
    }

    #[test]
    fn error_message_falls_back_to_error_field_and_text() {
        assert_eq!(error_message(br#"{"error":"boom"}"#), "boom");
        assert_eq!(error_message(br#""plain json string""#), "plain json string");
        assert_eq!(error_message(b"  gateway timeout \n"), "gateway timeout");
        assert_eq!(error_message(b""), "");
    }
}
