//! Railchat CLI library for interactive guarded conversations.
//!
//! This crate provides the terminal front end for the railchat library.

pub mod chatbot;

pub use chatbot::{ChatBot, ChatBotConfig, Command};
