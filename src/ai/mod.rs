use async_trait::async_trait;

pub mod chat;
pub mod classifier;
pub mod parse;
pub mod summarizer;
pub mod types;
pub use types::*;

use crate::context::BusinessContext;

/// Turns a business description into a vibe summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, context: &BusinessContext) -> Result<VibeSummary, AiError>;
}

/// Labels a captured photo as matching the vibe (or the default question) or not.
/// `image` is the raw JPEG payload as captured.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(
        &self,
        image: &[u8],
        vibe: Option<&VibeSummary>,
    ) -> Result<ClassificationResult, AiError>;

    /// Provider name for logging/display
    fn name(&self) -> &str;
}
