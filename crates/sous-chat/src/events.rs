//! Session event types

use serde::{Deserialize, Serialize};

use crate::conversation::{MessageId, MessageStatus};

/// Lifecycle events broadcast by the session controller.
///
/// Conversation contents are published separately as snapshots; these
/// events only mark transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A submission was accepted
    ExchangeStart {
        user_message: MessageId,
        assistant_message: MessageId,
    },

    /// The answer reached a terminal status; a new submission is allowed
    ExchangeEnd {
        message: MessageId,
        status: MessageStatus,
    },

    /// The answer is fully shown
    RevealFinished { message: MessageId },

    /// The backend rejected the credential; the caller should log in again
    Unauthorized,
}

impl ChatEvent {
    /// Check if this event ends an exchange
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::ExchangeEnd { .. })
    }
}
