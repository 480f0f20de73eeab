//! The seam between Prism and whatever answers it: a hosted model called
//! directly, or the Prism HTTP endpoints.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use prism_core::{Constraint, NewConstraint, Turn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Incrementally delivered reply text.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

/// Body of the chat endpoint: the whole turn history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Turn>,
}

/// Body of the document endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateRequest {
    pub constraints: Vec<NewConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl GenerateRequest {
    pub fn new(constraints: &[Constraint], prompt: Option<&str>) -> Self {
        Self {
            constraints: constraints.iter().map(NewConstraint::from).collect(),
            prompt: prompt.map(str::to_string),
        }
    }
}

/// Something that can hold the conversation and draft documents.
///
/// Implementations apply the system directives themselves; callers only
/// send history or constraints.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Reply to the last user turn of `request`.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<TextStream>;

    /// Draft a specification document from the constraints in `request`.
    async fn stream_document(&self, request: &GenerateRequest) -> Result<TextStream>;
}

/// A stream over already known chunks.
pub fn text_stream<I>(chunks: I) -> TextStream
where
    I: IntoIterator<Item = Result<String>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks))
}
