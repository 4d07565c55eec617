//! Convenient re-exports of the commonly used types.

pub use crate::completion::{
    AnthropicClient, CompletionClient, MockClient, SharedCompletionClient,
};
pub use crate::config::{CompletionSettings, GuardrailConfig, GuardrailEntry};
pub use crate::conversation::{
    ConversationHistory, Orchestrator, RejectionStage, Role, Turn, TurnOutcome,
};
pub use crate::error::{Error, GuardrailError, RemoteError, RemoteErrorKind, Result};
pub use crate::guardrail::{
    CheckCatalog, CheckDefinition, GuardrailCheck, GuardrailExecutor, GuardrailGroup,
    GuardrailRegistry, GuardrailVerdict, async_check_fn, check_fn,
};
