//! Conversational travel agent.
//!
//! One turn runs classification, extraction and repair, provider search, payload
//! reduction and formatting in sequence, then records the answer in the session's
//! [`memory::ConversationMemory`]:
//!
//! 1. **Intent** (`intent`): FLIGHT / HOTEL / ATTRACTION from the utterance and history.
//! 2. **Extraction** (`extraction`): model output parsed into a typed query, then repaired
//!    by deterministic rules.
//! 3. **Search** (`tripwise-booking`): raw provider payload.
//! 4. **Reduction** (`reducer`): at most 20 essential offers, no model involved.
//! 5. **Formatting** (`formatter`): ranked shortlist rendered into the final answer.
//!
//! The model only turns text into structure and structure into text. Ranking, date
//! repair and defaults are decided in code.

pub mod extraction;
pub mod formatter;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod reducer;
pub mod runtime;

use thiserror::Error;
use tripwise_core::errors::DomainError;

pub use runtime::{TravelAgent, TurnStage};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Gateway(#[from] llm::GatewayError),
    #[error(transparent)]
    Prompt(#[from] prompts::PromptError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("failed to serialize prompt data: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("agent setup failed: {0}")]
    Setup(String),
}
