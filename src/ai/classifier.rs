use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::chat::ChatClient;
use super::parse::{default_strategies, parse_with, ParseStrategy};
use super::{AiError, ChatEnvelope, ClassificationResult, ImageClassifier, VibeSummary};
use crate::capture::encode::{jpeg_data_url, reencode_jpeg};
use crate::settings::ChatModelSettings;

const ANSWER_CONTRACT: &str = "Respond only with a JSON object with two keys: \
     \"answer\", which must be \"yes\" or \"no\", and \"justification\", \
     a short sentence explaining the answer.";

/// Multimodal chat-completions client that asks a yes/no question about a photo.
pub struct VisionClassifier {
    chat: Arc<ChatClient>,
    model: ChatModelSettings,
    default_question: String,
    max_image_width: u32,
    jpeg_quality: u8,
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl VisionClassifier {
    pub fn new(
        chat: Arc<ChatClient>,
        model: ChatModelSettings,
        default_question: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            model,
            default_question: default_question.into(),
            max_image_width: 1024,
            jpeg_quality: 80,
            strategies: default_strategies(),
        }
    }

    pub fn with_image_limits(mut self, max_image_width: u32, jpeg_quality: u8) -> Self {
        self.max_image_width = max_image_width;
        self.jpeg_quality = jpeg_quality;
        self
    }

    fn build_prompt(&self, vibe: Option<&VibeSummary>) -> String {
        match vibe {
            Some(vibe) => format!(
                "Here is a description of the kind of social media content my ideal customer likes: {} \
                 Does this photo fit that description? {}",
                vibe, ANSWER_CONTRACT
            ),
            None => format!("{} {}", self.default_question, ANSWER_CONTRACT),
        }
    }

    fn build_request_body(&self, data_url: &str, prompt: &str) -> Value {
        json!({
            "model": self.model.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "image_url", "image_url": { "url": data_url } },
                        { "type": "text", "text": prompt }
                    ]
                }
            ],
            "response_format": { "type": "json_object" },
            "temperature": self.model.temperature,
            "max_tokens": self.model.max_tokens,
            "top_p": self.model.top_p
        })
    }
}

#[async_trait]
impl ImageClassifier for VisionClassifier {
    async fn classify(
        &self,
        image: &[u8],
        vibe: Option<&VibeSummary>,
    ) -> Result<ClassificationResult, AiError> {
        let jpeg = reencode_jpeg(image, self.max_image_width, self.jpeg_quality)
            .map_err(AiError::InvalidImage)?;
        log::debug!(
            "Classifier: {} byte capture re-encoded to {} bytes",
            image.len(),
            jpeg.len()
        );

        let prompt = self.build_prompt(vibe);
        let body = self.build_request_body(&jpeg_data_url(&jpeg), &prompt);
        let raw = self.chat.post(&body).await?;

        let text = String::from_utf8_lossy(&raw);
        let content = ChatEnvelope::content_from_body(&text)?;
        Ok(parse_with(&self.strategies, &content))
    }

    fn name(&self) -> &str {
        "vision-chat-completions"
    }
}
