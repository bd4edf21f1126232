use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::chat::ChatClient;
use super::{AiError, ChatEnvelope, Summarizer, TextMessage, VibeSummary};
use crate::context::BusinessContext;
use crate::settings::ChatModelSettings;

/// Text-completion client that derives a vibe summary from the business context.
pub struct VibeSummarizer {
    chat: Arc<ChatClient>,
    model: ChatModelSettings,
}

impl VibeSummarizer {
    pub fn new(chat: Arc<ChatClient>, model: ChatModelSettings) -> Self {
        Self { chat, model }
    }

    fn build_request_body(&self, context: &BusinessContext) -> Value {
        let prompt = build_prompt(context);
        json!({
            "model": self.model.model,
            "messages": [TextMessage { role: "user", content: &prompt }],
            "temperature": self.model.temperature,
            "max_tokens": self.model.max_tokens,
            "top_p": self.model.top_p,
            "stream": false
        })
    }
}

fn build_prompt(context: &BusinessContext) -> String {
    format!(
        "My business is {}. I think my ideal customer is {}. \
         Can you provide a generalized description of the type of vibe for content \
         you think this customer would like on social media? \
         Please do not make it too specific, more a general feel. \
         Please do not include any intro text or lists, just a description of the content.",
        context.business_description(),
        context.ideal_customer_description(),
    )
}

/// Read the summary out of a 2xx body. A body that is not a chat envelope
/// is still usable text, so it comes back as-is.
fn interpret_body(body: &[u8]) -> Result<VibeSummary, AiError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| AiError::InvalidResponse(format!("response is not UTF-8: {}", e)))?;

    match ChatEnvelope::content_from_body(text) {
        Ok(content) => Ok(VibeSummary::new(content)),
        Err(e) => {
            log::warn!("Summarizer: unexpected response shape ({}), using raw body", e);
            Ok(VibeSummary::new(text))
        }
    }
}

#[async_trait]
impl Summarizer for VibeSummarizer {
    async fn summarize(&self, context: &BusinessContext) -> Result<VibeSummary, AiError> {
        let body = self.build_request_body(context);
        log::info!("Requesting vibe summary from {}", self.model.model);
        let raw = self.chat.post(&body).await?;
        let summary = interpret_body(&raw)?;
        log::info!("Vibe summary received ({} chars)", summary.as_str().len());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bakery() -> BusinessContext {
        BusinessContext::new("bakery", "families with young children").unwrap()
    }

    fn summarizer(api_base: &str) -> VibeSummarizer {
        let chat = ChatClient::new(api_base, "test-key", 5).unwrap();
        VibeSummarizer::new(Arc::new(chat), ChatModelSettings::summarizer_default())
    }

    #[test]
    fn test_request_body_structure() {
        let body = summarizer("https://api.groq.com").build_request_body(&bakery());

        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["max_tokens"], json!(1024));
        assert_eq!(body["temperature"], json!(1.0));
        assert_eq!(body["top_p"], json!(1.0));

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        let content = messages[0]["content"].as_str().unwrap();
        assert!(content.starts_with("My business is bakery."));
        assert!(content.contains("my ideal customer is families with young children."));
    }

    #[test]
    fn prompt_embeds_fields_verbatim() {
        let ctx = BusinessContext::new("\"Joe's\" café", "people who say {hi}").unwrap();
        let prompt = build_prompt(&ctx);
        assert!(prompt.contains("\"Joe's\" café"));
        assert!(prompt.contains("people who say {hi}"));
    }

    #[test]
    fn interpret_returns_content_verbatim() {
        let body = br#"{"choices":[{"message":{"content":"  Warm, cozy moments.\n"}}]}"#;
        assert_eq!(
            interpret_body(body).unwrap().as_str(),
            "  Warm, cozy moments.\n"
        );
    }

    #[test]
    fn interpret_falls_back_to_raw_body() {
        let body = br#"{"unexpected":"shape"}"#;
        assert_eq!(
            interpret_body(body).unwrap().as_str(),
            r#"{"unexpected":"shape"}"#
        );
        assert_eq!(interpret_body(b"plain text").unwrap().as_str(), "plain text");
    }

    #[test]
    fn interpret_rejects_non_utf8() {
        let err = interpret_body(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, AiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn summarize_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(json!({"stream": false})))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"Playful, bright family moments."}}]}"#)
            .create_async()
            .await;

        let vibe = summarizer(&server.url()).summarize(&bakery()).await.unwrap();
        assert_eq!(vibe.as_str(), "Playful, bright family moments.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn summarize_surfaces_http_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/openai/v1/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let err = summarizer(&server.url()).summarize(&bakery()).await.unwrap_err();
        assert!(matches!(err, AiError::HttpError { status: 500, .. }));
    }
}
