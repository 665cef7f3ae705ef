use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::DialerConfig;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Access denied")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{message}")]
    Function {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Server error: {0}")]
    Server(String),
    #[error("Invalid response: {0}")]
    Parse(String),
    #[error("Realtime error: {0}")]
    Realtime(String),
}

impl ApiError {
    /// The backend refused to place a call because the account is out of credits.
    pub fn is_insufficient_credits(&self) -> bool {
        match self {
            ApiError::Function { status, code, .. } => {
                *status == StatusCode::PAYMENT_REQUIRED.as_u16()
                    || code.as_deref() == Some("insufficient_credits")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Thin client for one Supabase project: edge functions and PostgREST.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    functions_url: String,
    rest_url: String,
    anon_key: String,
    access_token: String,
    user_id: String,
    client: Client,
}

impl SupabaseClient {
    pub fn new(config: &DialerConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(SupabaseClient {
            inner: Arc::new(SupabaseClientInner {
                functions_url: config.functions_url(),
                rest_url: config.rest_url(),
                anon_key: config.anon_key.clone(),
                access_token: config.access_token.clone(),
                user_id: config.user_id.clone(),
                client,
            }),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Invoke an edge function with a JSON body.
    pub async fn invoke<T: DeserializeOwned, B: Serialize>(
        &self,
        function: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.inner.functions_url, function);
        tracing::debug!("Invoking edge function {}", function);

        let response = self
            .inner
            .client
            .post(&url)
            .header("apikey", &self.inner.anon_key)
            .header("Authorization", format!("Bearer {}", self.inner.access_token))
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Run a PostgREST select against `table` with `query` filters.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let url = format!("{}/{}", self.inner.rest_url, table);

        let response = self
            .inner
            .client
            .get(&url)
            .header("apikey", &self.inner.anon_key)
            .header("Authorization", format!("Bearer {}", self.inner.access_token))
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                response.json::<T>().await.map_err(|e| ApiError::Parse(e.to_string()))
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(error_from_body(status, &text))
            }
        }
    }
}

/// Map an error response body onto `ApiError`.
///
/// Edge functions answer either `{"error": {"code": .., "message": ..}}` or
/// `{"error": "..", "details": ..}`; anything else falls back to the status.
pub(crate) fn error_from_body(status: StatusCode, text: &str) -> ApiError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(text).ok();

    match parsed.as_ref().and_then(|v| v.get("error")) {
        Some(serde_json::Value::Object(err)) => ApiError::Function {
            status: status.as_u16(),
            code: err.get("code").and_then(|c| c.as_str()).map(String::from),
            message: err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(text)
                .to_string(),
        },
        Some(serde_json::Value::String(message)) => {
            let details = parsed
                .as_ref()
                .and_then(|v| v.get("details"))
                .and_then(|d| d.as_str());
            ApiError::Function {
                status: status.as_u16(),
                code: None,
                message: match details {
                    Some(details) => format!("{}: {}", message, details),
                    None => message.clone(),
                },
            }
        }
        _ if status == StatusCode::NOT_FOUND => ApiError::NotFound(text.to_string()),
        _ => ApiError::Server(format!("{}: {}", status, text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_body() {
        let err = error_from_body(
            StatusCode::PAYMENT_REQUIRED,
            r#"{"error":{"code":"insufficient_credits","message":"Add credits to keep calling"}}"#,
        );
        assert!(err.is_insufficient_credits());
        assert_eq!(err.to_string(), "Add credits to keep calling");
    }

    #[test]
    fn test_string_error_body_with_details() {
        let err = error_from_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"Failed to create call","details":"trunk unreachable"}"#,
        );
        assert!(!err.is_insufficient_credits());
        assert_eq!(err.to_string(), "Failed to create call: trunk unreachable");
    }

    #[test]
    fn test_bare_402_counts_as_insufficient_credits() {
        let err = error_from_body(StatusCode::PAYMENT_REQUIRED, r#"{"error":"Payment required"}"#);
        assert!(err.is_insufficient_credits());
    }

    #[test]
    fn test_plain_text_errors_fall_back_to_status() {
        assert!(matches!(
            error_from_body(StatusCode::NOT_FOUND, "no such function"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            error_from_body(StatusCode::BAD_GATEWAY, "<html>"),
            ApiError::Server(_)
        ));
    }
}
