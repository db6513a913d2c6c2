//! Natural-language summarization of spike reports.
//!
//! The summarizer is optional. The analysis is complete without it, so
//! every failure here is logged by the caller and never fails a run.

pub mod ollama;
pub mod prompt;

use crate::external::UpstreamError;
use async_trait::async_trait;

pub use ollama::OllamaSummarizer;
pub use prompt::build_prompt;

/// Turns a prompt into generated text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Model name, for report metadata.
    fn model(&self) -> &str;

    async fn summarize(&self, prompt: &str) -> Result<String, UpstreamError>;
}
