//! Error types for the chat session.

use compass_core::error::CompassError;

/// Errors from the chat session and its backend.
///
/// `Transport` never reaches the conversation as raw text; the session
/// turns it into a fallback reply.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("a reply is still pending")]
    TurnInProgress,
    #[error("no pending turn to resolve")]
    NoPendingTurn,
    #[error("chat transport failure: {0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Input errors are the caller's fault and leave history untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) | ChatError::TurnInProgress
        )
    }
}

impl From<CompassError> for ChatError {
    fn from(err: CompassError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<ChatError> for CompassError {
    fn from(err: ChatError) -> Self {
        CompassError::Chat(err.to_string())
    }
}
