//! sous-chat: streaming chat pipeline
//!
//! This crate folds decoded protocol events into a conversation, paces how
//! fast answers are revealed, and runs exchanges one at a time against a
//! transport.

pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;
pub mod reducer;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use conversation::{Conversation, Message, MessageId, MessageStatus, Role};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::SessionHandle;
pub use reducer::{ERROR_MARKER, reduce};
pub use scheduler::{DisplayScheduler, RevealConfig, Tick};
pub use session::{SessionConfig, SessionController};
pub use transport::{HttpTransport, Transport};
