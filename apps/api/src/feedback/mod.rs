//! AI feedback on uploaded resumes.
//!
//! The provider contract mirrors the hosted AI API the front end used:
//! `feedback(document_path, instructions) -> { message: { content } }`.

pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, LlmClient, LlmError};
use crate::models::feedback::Feedback;
use crate::storage::{BlobStore, StorageError};

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Document not found: {0}")]
    MissingDocument(String),

    #[error("Malformed feedback: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub message: FeedbackContent,
}

#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    async fn feedback(
        &self,
        document_path: &str,
        instructions: &str,
    ) -> Result<FeedbackMessage, FeedbackError>;
}

/// Sends the stored PDF to Claude together with the instructions.
pub struct LlmFeedbackProvider {
    llm: LlmClient,
    blobs: Arc<dyn BlobStore>,
}

impl LlmFeedbackProvider {
    pub fn new(llm: LlmClient, blobs: Arc<dyn BlobStore>) -> Self {
        Self { llm, blobs }
    }
}

#[async_trait]
impl FeedbackProvider for LlmFeedbackProvider {
    async fn feedback(
        &self,
        document_path: &str,
        instructions: &str,
    ) -> Result<FeedbackMessage, FeedbackError> {
        let document = self
            .blobs
            .read(document_path)
            .await?
            .ok_or_else(|| FeedbackError::MissingDocument(document_path.to_string()))?;

        info!("Requesting feedback for {document_path} ({} bytes)", document.size());
        let response = self
            .llm
            .call_with_document(instructions, JSON_ONLY_SYSTEM, &document.bytes)
            .await?;
        let content = response.text().ok_or(LlmError::EmptyContent)?.to_string();

        Ok(FeedbackMessage {
            message: FeedbackContent { content },
        })
    }
}

/// Parses the model's reply, tolerating markdown code fences.
pub fn parse_feedback(content: &str) -> Result<Feedback, FeedbackError> {
    Ok(serde_json::from_str(strip_json_fences(content))?)
}
