//! Error definitions for the keyboard input module

use thiserror::Error;

/// Errors raised while setting up or draining a key source
#[derive(Debug, Error)]
pub enum InputError {
    /// The terminal could not be switched into raw mode
    #[error("Terminal setup failed: {0}")]
    TerminalSetup(#[from] std::io::Error),

    /// Reading a pending terminal event failed
    #[error("Event read failed: {0}")]
    EventRead(String),

    /// A scripted frame named a key the reader does not track
    #[error("Unknown key in script: {0}")]
    UnknownKey(String),
}
