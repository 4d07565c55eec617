//! CLI chatbot module for interactive guarded conversations.
//!
//! Reads one line at a time, passes it through the [`Orchestrator`] and prints
//! the reply, the rejection message, or a transient failure notice.

#![allow(clippy::print_stdout)] // CLI module intentionally uses stdout

use std::io::{self, Write};
use std::time::Duration;

use railchat::conversation::{Orchestrator, TurnOutcome};
use railchat::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Configuration for the chatbot.
#[derive(Debug, Clone)]
pub struct ChatBotConfig {
    /// How long detached guardrails may keep running after the session ends.
    pub drain_timeout: Duration,
    /// Prompt shown before user input.
    pub prompt: String,
}

impl Default for ChatBotConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(5),
            prompt: "You: ".to_owned(),
        }
    }
}

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// End the session.
    Exit,
    /// Re-send the last message after a transient failure (`/retry`).
    Retry,
    /// Nothing to do.
    Empty,
    /// A message for the assistant.
    Message(&'a str),
}

impl<'a> Command<'a> {
    /// Interpret one line of input. Commands are case-insensitive.
    #[must_use]
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line.to_lowercase().as_str() {
            "exit" | "quit" | "bye" => Self::Exit,
            "/retry" => Self::Retry,
            _ => Self::Message(line),
        }
    }
}

/// An interactive terminal chatbot around an [`Orchestrator`].
#[derive(Debug)]
pub struct ChatBot {
    orchestrator: Orchestrator,
    config: ChatBotConfig,
}

impl ChatBot {
    /// Create a new chatbot.
    #[inline]
    #[must_use]
    pub const fn new(orchestrator: Orchestrator, config: ChatBotConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Returns the underlying orchestrator.
    #[inline]
    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Handle one line of input and return the text to print.
    ///
    /// Returns `None` when the line ends the session.
    pub async fn respond(&self, line: &str) -> Option<String> {
        let result = match Command::parse(line) {
            Command::Exit => return None,
            Command::Empty => return Some(String::new()),
            Command::Retry => self.orchestrator.retry_turn().await,
            Command::Message(text) => self.orchestrator.handle_turn(text).await,
        };
        Some(render(result))
    }

    /// Run the interactive REPL loop until `exit`, `quit`, `bye` or end of
    /// input, then give detached guardrails a bounded chance to finish.
    ///
    /// Detached guardrails are drained even when reading input fails.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if standard input cannot be read.
    pub async fn run(&self) -> io::Result<()> {
        let result = self.read_loop().await;
        if let Err(e) = &result {
            warn!(error = %e, "Reading input failed");
        }
        self.shutdown().await;
        result
    }

    async fn read_loop(&self) -> io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = io::stdout();

        println!("Railchat (type 'exit', 'quit' or 'bye' to leave, '/retry' to resend after an error)");
        println!();

        loop {
            print!("{}", self.config.prompt);
            stdout.flush().ok();

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            match self.respond(&line).await {
                None => {
                    println!("Goodbye!");
                    break;
                }
                Some(output) if output.is_empty() => {}
                Some(output) => println!("{output}"),
            }
        }

        Ok(())
    }

    /// Drain detached guardrails with the configured timeout.
    pub async fn shutdown(&self) {
        let aborted = self
            .orchestrator
            .shutdown(self.config.drain_timeout)
            .await;
        if aborted > 0 {
            warn!(aborted, "Background guardrails did not finish before exit");
        } else {
            info!("Session closed");
        }
    }
}

fn render(result: Result<TurnOutcome>) -> String {
    match result {
        Ok(outcome) => format!("AI: {}", outcome.text()),
        Err(Error::NothingToRetry) => "Nothing to retry.".to_owned(),
        Err(Error::Remote(e)) => {
            let hint = if e.is_retryable() {
                "Type '/retry' to resend your last message."
            } else {
                "You can type '/retry' to resend your last message."
            };
            format!("[The assistant is unavailable right now: {e}. {hint}]")
        }
        Err(e) => format!("[Error: {e}]"),
    }
}
