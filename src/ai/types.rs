use serde::{Deserialize, Serialize};

/// Yes/no label returned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
    Unknown,
}

impl Answer {
    /// Case-insensitive match on `"yes"` / `"no"`; anything else is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Answer::Yes),
            "no" => Some(Answer::No),
            _ => None,
        }
    }
}

/// Outcome of classifying one captured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl ClassificationResult {
    pub fn new(answer: Answer, justification: Option<String>) -> Self {
        Self {
            answer,
            justification,
        }
    }

    pub fn unknown() -> Self {
        Self::new(Answer::Unknown, None)
    }
}

/// Natural-language description of the content a business's customers like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VibeSummary(String);

impl VibeSummary {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VibeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type for AI operations
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

/// Chat-completions request message with plain text content.
#[derive(Debug, Clone, Serialize)]
pub struct TextMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// `{choices:[{message:{content}}]}` response envelope.
#[derive(Debug, Deserialize)]
pub struct ChatEnvelope {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub content: Option<String>,
}

impl ChatEnvelope {
    /// Parse a response body and pull out the first choice's text.
    pub fn content_from_body(body: &str) -> Result<String, AiError> {
        let envelope: ChatEnvelope = serde_json::from_str(body)
            .map_err(|e| AiError::InvalidResponse(format!("envelope: {}", e)))?;
        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::InvalidResponse("no message content in choices".into()))
    }
}
