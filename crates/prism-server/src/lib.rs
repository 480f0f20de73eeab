//! The server-side half of Prism: two streaming endpoints in front of the
//! hosted model.
//!
//! - `POST /api/chat` takes `{ "messages": [Turn] }` and streams the reply.
//! - `POST /api/generate` takes `{ "constraints": [...], "prompt": "..." }`
//!   and streams a Markdown document.
//!
//! Both answer `text/plain; charset=utf-8`.

mod error;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use prism_core::AiSettings;
use prism_suggest::{Assistant, ChatRequest, GenerateRequest, LlmAssistant, SuggestError, TextStream};

pub use error::ServerError;

/// Shared handler state. `assistant` is `None` when no credential was found
/// at startup; every request then fails with "Missing API Key".
#[derive(Clone)]
pub struct AppState {
    assistant: Option<Arc<dyn Assistant>>,
}

impl AppState {
    pub fn new(assistant: Arc<dyn Assistant>) -> Self {
        Self {
            assistant: Some(assistant),
        }
    }

    pub fn without_credential() -> Self {
        Self { assistant: None }
    }

    /// Build the hosted-model assistant from settings. A missing credential
    /// is not fatal for the server, only for each request.
    pub fn from_settings(settings: AiSettings) -> Result<Self, SuggestError> {
        match LlmAssistant::new(settings) {
            Ok(assistant) => {
                tracing::info!(
                    provider = assistant.provider(),
                    model = assistant.model(),
                    "model configured"
                );
                Ok(Self::new(Arc::new(assistant)))
            }
            Err(SuggestError::MissingCredential) => {
                tracing::error!(
                    "missing API key; set one of {}",
                    prism_core::CREDENTIAL_ENV_VARS.join(", ")
                );
                Ok(Self::without_credential())
            }
            Err(e) => Err(e),
        }
    }

    fn assistant(&self) -> Result<Arc<dyn Assistant>, ServerError> {
        self.assistant.clone().ok_or(ServerError::MissingCredential)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/generate", post(generate))
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ServerError> {
    let assistant = state.assistant()?;
    tracing::info!(turns = request.messages.len(), "chat request");

    let stream = assistant.stream_chat(&request).await.map_err(|e| {
        tracing::error!(error = %e, "model call failed");
        ServerError::Upstream("Error calling model API")
    })?;
    Ok(text_response(stream))
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ServerError> {
    let assistant = state.assistant()?;
    tracing::info!(constraints = request.constraints.len(), "generate request");

    let stream = assistant.stream_document(&request).await.map_err(|e| {
        tracing::error!(error = %e, "spec generation failed");
        ServerError::Upstream("Error generating spec")
    })?;
    Ok(text_response(stream))
}

fn text_response(stream: TextStream) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{Request, StatusCode};
    use prism_suggest::backend::text_stream;
    use tower::ServiceExt;

    /// Replies with fixed chunks to both routes.
    struct Canned(&'static [&'static str]);

    #[async_trait]
    impl Assistant for Canned {
        async fn stream_chat(&self, _: &ChatRequest) -> prism_suggest::Result<TextStream> {
            Ok(text_stream(self.0.iter().map(|c| Ok(c.to_string()))))
        }

        async fn stream_document(&self, _: &GenerateRequest) -> prism_suggest::Result<TextStream> {
            Ok(text_stream(self.0.iter().map(|c| Ok(c.to_string()))))
        }
    }

    struct Down;

    #[async_trait]
    impl Assistant for Down {
        async fn stream_chat(&self, _: &ChatRequest) -> prism_suggest::Result<TextStream> {
            Err(SuggestError::Model("quota exceeded".into()))
        }

        async fn stream_document(&self, _: &GenerateRequest) -> prism_suggest::Result<TextStream> {
            Err(SuggestError::Model("quota exceeded".into()))
        }
    }

    const CHAT_BODY: &str = r#"{"messages":[{"id":"1","role":"user","content":"I want a login"}]}"#;
    const GENERATE_BODY: &str = r#"{"constraints":[{"category":"UI","content":"Button is blue"}]}"#;

    async fn post_json(state: AppState, uri: &str, body: &'static str) -> (StatusCode, String) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_credential_is_a_plain_500() {
        let (status, body) = post_json(AppState::without_credential(), "/api/chat", CHAT_BODY).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Missing API Key");

        let (status, body) =
            post_json(AppState::without_credential(), "/api/generate", GENERATE_BODY).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Missing API Key");
    }

    #[tokio::test]
    async fn document_chunks_are_streamed_as_text() {
        let state = AppState::new(Arc::new(Canned(&["# Spec\n", "Button is blue.\n"])));
        let (status, body) = post_json(state, "/api/generate", GENERATE_BODY).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "# Spec\nButton is blue.\n");
    }

    #[tokio::test]
    async fn chat_reply_is_streamed_as_text() {
        let state = AppState::new(Arc::new(Canned(&["Which provider?"])));
        let (status, body) = post_json(state, "/api/chat", CHAT_BODY).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Which provider?");
    }

    #[tokio::test]
    async fn upstream_failure_is_reported() {
        let state = AppState::new(Arc::new(Down));
        let (status, body) = post_json(state.clone(), "/api/chat", CHAT_BODY).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error calling model API");

        let (_, body) = post_json(state, "/api/generate", GENERATE_BODY).await;
        assert_eq!(body, "Error generating spec");
    }
}
