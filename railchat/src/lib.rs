#![cfg_attr(docsrs, feature(doc_cfg))]
//! Railchat wraps a conversation with a remote text-generation service in
//! configurable guardrails.
//!
//! Every user message is screened by the **blocking** guardrail group before
//! it is sent, every reply is screened again before it is shown, and the
//! **non-blocking** group is fired in the background for observability and
//! side effects.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use railchat::prelude::*;
//!
//! let registry = GuardrailRegistry::from_config(
//!     &GuardrailConfig::default(),
//!     &CheckCatalog::builtin(),
//! )?;
//! let executor = GuardrailExecutor::new(Arc::new(registry));
//! let client = AnthropicClient::from_env()?;
//! let orchestrator = Orchestrator::new(executor, Arc::new(client));
//!
//! match orchestrator.handle_turn("Hello there").await? {
//!     TurnOutcome::Reply(text) => println!("AI: {text}"),
//!     TurnOutcome::Rejected { message, .. } => println!("AI: {message}"),
//! }
//! ```

pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod guardrail;
pub mod prelude;

pub use error::{Error, GuardrailError, RemoteError, RemoteErrorKind, Result};
