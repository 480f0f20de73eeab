//! Drafting the specification document from the collected constraints.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use prism_core::{SpecStore, StateBackend};

use crate::backend::{Assistant, GenerateRequest};
use crate::error::{Result, SuggestError};

/// Streams a generated document into the store. At most one generation runs
/// at a time; a second trigger is rejected with [`SuggestError::Busy`].
#[derive(Debug, Default)]
pub struct DocumentGenerator {
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the generation ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DocumentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Send every constraint in `store` and stream the document back.
    ///
    /// Once the stream starts the document is cleared, then replaced by the
    /// cumulative text after every chunk. If the stream breaks off the
    /// partial text stays in place. Returns the final document length.
    pub async fn generate<B: StateBackend>(
        &self,
        assistant: &dyn Assistant,
        store: &mut SpecStore<B>,
        prompt: Option<&str>,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<usize> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SuggestError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        let request = GenerateRequest::new(store.constraints(), prompt);
        tracing::info!(constraints = request.constraints.len(), "generating document");

        let mut stream = assistant.stream_document(&request).await.inspect_err(|e| {
            tracing::warn!(error = %e, "document request failed");
        })?;

        store.set_markdown(String::new());
        let mut document = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.inspect_err(|e| {
                tracing::warn!(error = %e, kept = document.len(), "document stream broke off");
            })?;
            document.push_str(&chunk);
            store.set_markdown(document.clone());
            on_chunk(&chunk);
        }

        tracing::info!(bytes = document.len(), "document generated");
        Ok(document.len())
    }
}
