// chat.rs — Shared HTTP plumbing for OpenAI-compatible chat completions.
//
// Both the summarizer and the classifier POST a JSON body to the same
// endpoint with a bearer token and read back the raw body; status handling
// and timeouts live here so the two clients agree on error mapping.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::AiError;

pub struct ChatClient {
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
    client: Client,
}

impl ChatClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiError::ConnectionError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: api_base.into(),
            api_key: api_key.into(),
            timeout_secs,
            client,
        })
    }

    pub fn url(&self) -> String {
        format!(
            "{}/openai/v1/chat/completions",
            self.endpoint.trim_end_matches('/'),
        )
    }

    /// POST `body` and return the raw response bytes of a 2xx reply.
    pub async fn post(&self, body: &Value) -> Result<Vec<u8>, AiError> {
        let response = self
            .client
            .post(self.url())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".into());

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AiError::AuthError(error_body));
            }
            if status.as_u16() == 429 {
                return Err(AiError::RateLimited);
            }
            return Err(AiError::HttpError {
                status: status.as_u16(),
                body: error_body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }

    fn transport_error(&self, e: reqwest::Error) -> AiError {
        if e.is_timeout() {
            AiError::Timeout(self.timeout_secs)
        } else {
            AiError::ConnectionError(e.to_string())
        }
    }
}
