use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use prism_core::{AiSettings, Role, Turn};

use crate::backend::{text_stream, Assistant, ChatRequest, GenerateRequest, TextStream};
use crate::error::{Result, SuggestError};
use crate::prompt;

fn map_backend(provider: &str) -> Result<LLMBackend> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(SuggestError::UnknownProvider(other.to_string())),
    }
}

/// Calls a hosted model directly through the `llm` crate.
///
/// The provider returns the whole completion at once, so each stream carries
/// a single chunk.
#[derive(Debug, Clone)]
pub struct LlmAssistant {
    settings: AiSettings,
    api_key: Option<String>,
}

impl LlmAssistant {
    /// Resolve the credential now so a missing key fails before any request.
    pub fn new(settings: AiSettings) -> Result<Self> {
        map_backend(&settings.provider)?;
        let api_key = prism_core::resolve_api_key(&settings);
        if api_key.is_none() && prism_core::requires_api_key(&settings) {
            return Err(SuggestError::MissingCredential);
        }
        Ok(Self { settings, api_key })
    }

    pub fn provider(&self) -> &str {
        &self.settings.provider
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(system);

        if let Some(key) = &self.api_key {
            builder = builder.api_key(key);
        }

        let llm = builder
            .build()
            .map_err(|e| SuggestError::Model(format!("build LLM: {e}")))?;

        tracing::debug!(
            provider = %self.settings.provider,
            model = %self.settings.model,
            messages = messages.len(),
            "sending to model"
        );

        let response = llm
            .chat(messages)
            .await
            .map_err(|e| SuggestError::Model(format!("chat: {e}")))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(SuggestError::Model("LLM returned empty text".to_string())),
            None => Err(SuggestError::Model("LLM returned no text".to_string())),
        }
    }
}

fn to_chat_message(turn: &Turn) -> ChatMessage {
    match turn.role {
        Role::User => ChatMessage::user().content(&turn.content).build(),
        Role::Assistant => ChatMessage::assistant().content(&turn.content).build(),
    }
}

#[async_trait]
impl Assistant for LlmAssistant {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<TextStream> {
        let system = prompt::chat_system_prompt();
        let messages: Vec<ChatMessage> = request.messages.iter().map(to_chat_message).collect();
        let reply = self.generate(&system, &messages).await?;
        Ok(text_stream([Ok(reply)]))
    }

    async fn stream_document(&self, request: &GenerateRequest) -> Result<TextStream> {
        let system = prompt::generation_system_prompt(&request.constraints)?;
        let user_msg = prompt::generation_user_prompt(request.prompt.as_deref());
        let messages = vec![ChatMessage::user().content(user_msg).build()];
        let document = self.generate(&system, &messages).await?;
        Ok(text_stream([Ok(document)]))
    }
}
