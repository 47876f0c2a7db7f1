//! chat-model: language-model client used for open-ended chat
//!
//! The trait is blocking on purpose: callers that need a deadline run it on a
//! worker thread and stop waiting once the deadline passes.

mod types;
pub use types::{ChatMessage, ChatRequest, Role};

mod error;
pub use error::{ChatError, Result};

mod traits;
pub use traits::ChatModel;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::MockChatModel;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::{HttpChatConfig, HttpChatModel};
