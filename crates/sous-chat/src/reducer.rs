//! Folds protocol events into conversation state.

use sous_ai::ProtocolEvent;

use crate::conversation::{Conversation, MessageId, MessageStatus};

/// Prefix marking an error appended to a failed answer
pub const ERROR_MARKER: &str = "[error]";

/// Apply one event to the message `target`.
///
/// Pure and total: events for an unknown or already finished message leave
/// the state untouched. A trailing frame can legitimately arrive after the
/// exchange ended, so this is not treated as a failure.
pub fn reduce(mut state: Conversation, target: MessageId, event: &ProtocolEvent) -> Conversation {
    let Some(message) = state.get_mut(target) else {
        tracing::debug!(%target, "Dropping event for unknown message");
        return state;
    };

    if message.is_terminal() {
        tracing::debug!(
            %target,
            status = ?message.status(),
            "Dropping late event for finished message"
        );
        return state;
    }

    match event {
        ProtocolEvent::Token(text) => {
            message.push_text(text);
            message.set_status(MessageStatus::Streaming);
        }
        ProtocolEvent::Analysis(payload) => {
            message.set_analysis(payload.clone());
        }
        ProtocolEvent::Error(reason) => {
            let annotation = error_annotation(message.text().is_empty(), reason);
            message.push_text(&annotation);
            message.set_status(MessageStatus::Failed);
        }
        ProtocolEvent::Done => {
            message.set_status(MessageStatus::Complete);
        }
    }

    state
}

fn error_annotation(empty: bool, reason: &str) -> String {
    if empty {
        format!("{} {}", ERROR_MARKER, reason)
    } else {
        format!("\n\n{} {}", ERROR_MARKER, reason)
    }
}
