//! Conversational side of the travel assistant.
//!
//! Owns the conversation history and its pending-reply lifecycle, talks to
//! the chat backend through the canonical request/reply contract, and
//! renders messages into display units with typed UI actions.

pub mod backend;
pub mod error;
pub mod render;
pub mod session;

pub use backend::{
    decode_reply, ChatBackend, ChatReply, ChatRequest, HttpChatBackend, MockChatBackend,
};
pub use error::ChatError;
pub use render::{
    escape_html, is_http_url, ConversationRenderer, DisplayUnit, GalleryImage, ImageModal,
    ModalInput, ModalTarget, SuggestionButton, UiAction, VideoLink,
};
pub use session::{ChatSession, PendingTurn, SessionEvent};
