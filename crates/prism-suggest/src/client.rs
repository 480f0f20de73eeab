//! Client for the Prism chat and document endpoints.

use std::fmt::Display;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::backend::{Assistant, ChatRequest, GenerateRequest, TextStream};
use crate::error::{Result, SuggestError};

/// Talks to a `prism-server` (or anything serving the same two routes).
#[derive(Debug, Clone)]
pub struct HttpAssistant {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAssistant {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_stream<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<TextStream> {
        let url = self.url(path);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            // Endpoints answer failures with a plain-text reason
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), %message, "endpoint refused request");
            return Err(SuggestError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(decode_text_stream(response.bytes_stream()))
    }
}

#[async_trait]
impl Assistant for HttpAssistant {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<TextStream> {
        self.post_stream("api/chat", request).await
    }

    async fn stream_document(&self, request: &GenerateRequest) -> Result<TextStream> {
        self.post_stream("api/generate", request).await
    }
}

/// Turn a byte stream into text chunks. A multi-byte character split across
/// network chunks is held back until it is complete. Bytes still held when
/// the body ends are flushed with replacement characters.
pub fn decode_text_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let start = (Box::pin(bytes), Vec::<u8>::new(), false);
    let chunks = futures::stream::unfold(start, |(mut inner, mut pending, ended)| async move {
        if ended {
            return None;
        }
        match inner.next().await {
            Some(Ok(bytes)) => {
                pending.extend_from_slice(bytes.as_ref());
                let text = take_complete_utf8(&mut pending);
                Some((Ok(text), (inner, pending, false)))
            }
            Some(Err(e)) => Some((Err(SuggestError::Stream(e.to_string())), (inner, pending, false))),
            None if pending.is_empty() => None,
            None => {
                tracing::warn!(bytes = pending.len(), "body ended inside a character");
                let tail = String::from_utf8_lossy(&pending).into_owned();
                Some((Ok(tail), (inner, Vec::new(), true)))
            }
        }
    })
    .filter(|chunk| futures::future::ready(!matches!(chunk, Ok(text) if text.is_empty())));
    Box::pin(chunks)
}

/// Remove and decode the longest prefix of `pending` that does not end in
/// an incomplete character. Invalid sequences are replaced, not held.
fn take_complete_utf8(pending: &mut Vec<u8>) -> String {
    let complete = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(complete);
    let head = std::mem::replace(pending, rest);
    String::from_utf8_lossy(&head).into_owned()
}
