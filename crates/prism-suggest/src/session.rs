//! The conversation with the assistant and its hand-off to the store.

use futures::StreamExt;
use prism_core::{Role, SpecStore, StateBackend, Turn};

use crate::backend::{Assistant, ChatRequest};
use crate::error::Result;
use crate::parse;

/// Result of one completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The assistant turn as appended to the history (raw content).
    pub reply: Turn,
    /// How many constraints the reply added to the store.
    pub extracted: usize,
}

/// Ordered turn history, starting with the welcome turn. Not persisted.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    turns: Vec<Turn>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    pub fn new() -> Self {
        Self {
            turns: vec![Turn::welcome()],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns as they should be shown, with constraint blocks hidden.
    pub fn transcript(&self) -> impl Iterator<Item = (Role, String)> + '_ {
        self.turns.iter().map(|turn| {
            let shown = match turn.role {
                Role::Assistant => parse::strip_constraint_block(&turn.content),
                Role::User => turn.content.clone(),
            };
            (turn.role, shown)
        })
    }

    /// Send `text` and stream the reply, handing each chunk to `on_chunk`.
    ///
    /// When the reply completes, any constraint block in it is appended to
    /// `store`. On failure the user turn stays in the history, along with
    /// whatever part of the reply already arrived; nothing is extracted from
    /// an incomplete reply and nothing is retried.
    pub async fn submit<B: StateBackend>(
        &mut self,
        assistant: &dyn Assistant,
        store: &mut SpecStore<B>,
        text: &str,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<TurnOutcome> {
        self.turns.push(Turn::user(text));
        let request = ChatRequest {
            messages: self.turns.clone(),
        };

        let mut stream = assistant.stream_chat(&request).await.inspect_err(|e| {
            tracing::warn!(error = %e, "chat request failed");
        })?;

        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    on_chunk(&chunk);
                    reply.push_str(&chunk);
                }
                Err(e) => {
                    tracing::warn!(error = %e, received = reply.len(), "chat reply broke off");
                    if !reply.is_empty() {
                        self.turns.push(Turn::assistant(reply));
                    }
                    return Err(e);
                }
            }
        }

        self.turns.push(Turn::assistant(reply));
        let extracted = self.on_turn_complete(store);
        let reply = self.turns[self.turns.len() - 1].clone();
        Ok(TurnOutcome { reply, extracted })
    }

    /// Merge constraints from the last turn if, and only if, it is an
    /// assistant turn.
    fn on_turn_complete<B: StateBackend>(&self, store: &mut SpecStore<B>) -> usize {
        let Some(turn) = self.turns.last() else {
            return 0;
        };
        if turn.role != Role::Assistant {
            return 0;
        }
        let found = parse::extract_constraints(&turn.content);
        let added = store.add_constraints(found);
        if added > 0 {
            tracing::info!(added, total = store.constraints().len(), "recorded constraints");
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{Script, ScriptedAssistant};
    use crate::error::SuggestError;
    use prism_core::{MemoryBackend, NewConstraint};

    fn store() -> SpecStore<MemoryBackend> {
        SpecStore::open(MemoryBackend::new())
    }

    #[test]
    fn starts_with_welcome_turn() {
        let session = ConversationSession::new();
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.turns()[0].id, "welcome");
        assert_eq!(session.turns()[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn reply_with_block_records_constraints() {
        let assistant = ScriptedAssistant::chat(vec![Script::Chunks(vec![
            "Sure. ```json:constraints\n",
            "[{\"category\":\"Auth\",\"content\":\"Password must be 8 chars\"}]\n```",
        ])]);
        let mut store = store();
        let mut session = ConversationSession::new();
        let mut streamed = Vec::new();

        let outcome = session
            .submit(&assistant, &mut store, "I want a login", |c| streamed.push(c.to_string()))
            .await
            .unwrap();

        assert_eq!(outcome.extracted, 1);
        assert_eq!(streamed.len(), 2);
        assert_eq!(
            NewConstraint::from(&store.constraints()[0]),
            NewConstraint::new("Auth", "Password must be 8 chars")
        );
        // raw content is retained in history, hidden in the transcript
        assert!(outcome.reply.content.contains("json:constraints"));
        let shown: Vec<_> = session.transcript().collect();
        assert_eq!(shown.last().unwrap(), &(Role::Assistant, "Sure.".to_string()));
    }

    #[tokio::test]
    async fn whole_history_is_sent() {
        let assistant = ScriptedAssistant::chat(vec![
            Script::Chunks(vec!["Which provider?"]),
            Script::Chunks(vec!["Noted."]),
        ]);
        let mut store = store();
        let mut session = ConversationSession::new();

        session.submit(&assistant, &mut store, "I want a login", |_| {}).await.unwrap();
        session.submit(&assistant, &mut store, "Google", |_| {}).await.unwrap();

        let requests = assistant.chat_requests.lock().unwrap();
        assert_eq!(requests[0].messages.len(), 2);
        let second: Vec<_> = requests[1].messages.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(second[1..], ["I want a login", "Which provider?", "Google"]);
        assert_eq!(session.turns().len(), 5);
    }

    #[tokio::test]
    async fn reply_without_block_leaves_store_alone() {
        let assistant = ScriptedAssistant::chat(vec![Script::Chunks(vec!["What happens on failure?"])]);
        let mut store = store();
        store.add_constraint(NewConstraint::general("existing"));
        let mut session = ConversationSession::new();

        let outcome = session.submit(&assistant, &mut store, "login", |_| {}).await.unwrap();
        assert_eq!(outcome.extracted, 0);
        assert_eq!(store.constraints().len(), 1);
    }

    #[tokio::test]
    async fn repeated_constraints_accumulate() {
        let block = "```json:constraints\n[\"Max 3 retries\"]\n```";
        let assistant = ScriptedAssistant::chat(vec![
            Script::Chunks(vec![block]),
            Script::Chunks(vec![block]),
        ]);
        let mut store = store();
        let mut session = ConversationSession::new();
        session.submit(&assistant, &mut store, "a", |_| {}).await.unwrap();
        session.submit(&assistant, &mut store, "b", |_| {}).await.unwrap();
        assert_eq!(store.constraints().len(), 2);
    }

    #[tokio::test]
    async fn refused_request_keeps_history_intact() {
        let assistant = ScriptedAssistant::chat(vec![Script::Refuse(500, "Missing API Key")]);
        let mut store = store();
        let mut session = ConversationSession::new();

        let err = session.submit(&assistant, &mut store, "hello", |_| {}).await.unwrap_err();
        assert!(matches!(err, SuggestError::Api { status: 500, .. }));
        assert_eq!(session.turns().len(), 2);
        assert_eq!(session.turns()[1].role, Role::User);
        assert!(store.constraints().is_empty());
    }

    #[tokio::test]
    async fn broken_reply_is_kept_but_not_extracted() {
        let assistant = ScriptedAssistant::chat(vec![Script::BreakAfter(vec![
            "Partial ```json:constraints\n[\"x\"]\n```",
        ])]);
        let mut store = store();
        let mut session = ConversationSession::new();

        let err = session.submit(&assistant, &mut store, "hello", |_| {}).await.unwrap_err();
        assert!(matches!(err, SuggestError::Stream(_)));
        assert_eq!(session.turns().len(), 3);
        assert!(store.constraints().is_empty());
    }
}
