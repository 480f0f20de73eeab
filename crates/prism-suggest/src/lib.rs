pub mod backend;
pub mod client;
pub mod engine;
mod error;
pub mod generator;
pub mod parse;
pub mod prompt;
pub mod session;

pub use backend::{Assistant, ChatRequest, GenerateRequest, TextStream};
pub use client::HttpAssistant;
pub use engine::LlmAssistant;
pub use error::{Result, SuggestError};
pub use generator::DocumentGenerator;
pub use parse::{extract_constraints, strip_constraint_block};
pub use session::{ConversationSession, TurnOutcome};
