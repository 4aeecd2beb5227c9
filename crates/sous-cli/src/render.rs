//! Terminal rendering of streamed answers

use sous_ai::AnalysisPayload;
use sous_chat::{Conversation, Message, MessageId};
use std::io::{self, Write};
use tokio::sync::watch;

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Print the answer `id` as it is revealed.
///
/// Returns the finished message once it is fully shown, or `None` if the
/// conversation was cleared first.
pub async fn stream_answer(
    snapshots: &mut watch::Receiver<Conversation>,
    id: MessageId,
) -> io::Result<Option<Message>> {
    let mut stdout = io::stdout();
    let mut printed = 0;

    loop {
        let message = snapshots.borrow_and_update().get(id).cloned();
        let Some(message) = message else {
            return Ok(None);
        };

        // Visible text only grows, so the printed prefix stays valid
        let visible = message.visible_text();
        if visible.len() > printed {
            write!(stdout, "{}", &visible[printed..])?;
            stdout.flush()?;
            printed = visible.len();
        }

        if message.is_terminal() && message.is_fully_visible() {
            writeln!(stdout)?;
            return Ok(Some(message));
        }

        if snapshots.changed().await.is_err() {
            writeln!(stdout)?;
            return Ok(Some(message));
        }
    }
}

/// One-line summary of how the answer was routed
pub fn analysis_summary(analysis: &AnalysisPayload) -> String {
    let mut parts = vec![
        format!("strategy: {}", analysis.strategy),
        format!("complexity: {:.2}", analysis.complexity),
    ];
    if let Some(intensity) = analysis.relationship_intensity {
        parts.push(format!("relations: {:.2}", intensity));
    }
    if !analysis.relevant_documents.is_empty() {
        let names: Vec<&str> = analysis
            .relevant_documents
            .iter()
            .take(3)
            .map(|doc| doc.name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        let more = analysis.relevant_documents.len().saturating_sub(3);
        let mut recipes = names.join(", ");
        if more > 0 {
            recipes.push_str(&format!(" (+{} more)", more));
        }
        parts.push(format!("recipes: {}", recipes));
    }
    format!("[{}]", parts.join(" | "))
}
