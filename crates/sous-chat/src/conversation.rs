//! Conversation state: ordered messages with authoritative and visible text.

use serde::{Deserialize, Serialize};
use sous_ai::AnalysisPayload;
use std::fmt;
use uuid::Uuid;

/// Opaque message identifier, assigned once and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Created, no text yet
    Pending,
    /// Receiving text
    Streaming,
    Complete,
    Failed,
}

impl MessageStatus {
    /// Complete or failed; no further mutation is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Complete | MessageStatus::Failed)
    }
}

/// A single chat message.
///
/// `text` only ever grows. The visible text is a prefix of it, tracked as a
/// byte offset that always sits on a character boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    text: String,
    #[serde(skip)]
    visible: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisPayload>,
    status: MessageStatus,
    /// Unix milliseconds
    timestamp: i64,
}

impl Message {
    fn new(role: Role, text: String, status: MessageStatus) -> Self {
        let visible = if status.is_terminal() { text.len() } else { 0 };
        Self {
            id: MessageId::new(),
            role,
            text,
            visible,
            analysis: None,
            status,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// A user message; user text is never streamed
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), MessageStatus::Complete)
    }

    /// A finished assistant message, e.g. a greeting or restored history
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), MessageStatus::Complete)
    }

    pub(crate) fn assistant_pending() -> Self {
        Self::new(Role::Assistant, String::new(), MessageStatus::Pending)
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Authoritative text: everything received so far, in order
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The part of the text currently shown
    pub fn visible_text(&self) -> &str {
        &self.text[..self.visible.min(self.text.len())]
    }

    pub fn analysis(&self) -> Option<&AnalysisPayload> {
        self.analysis.as_ref()
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_fully_visible(&self) -> bool {
        self.visible >= self.text.len()
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub(crate) fn set_analysis(&mut self, analysis: AnalysisPayload) {
        self.analysis = Some(analysis);
    }

    pub(crate) fn set_status(&mut self, status: MessageStatus) {
        self.status = status;
    }

    pub(crate) fn visible_len(&self) -> usize {
        self.visible
    }

    /// Reveal up to `chars` more characters; returns how many were revealed
    pub(crate) fn reveal(&mut self, chars: usize) -> usize {
        let hidden = &self.text[self.visible..];
        let (count, bytes) = hidden
            .char_indices()
            .take(chars)
            .fold((0, 0), |(n, _), (i, c)| (n + 1, i + c.len_utf8()));
        self.visible += bytes;
        count
    }

    pub(crate) fn reveal_all(&mut self) {
        self.visible = self.text.len();
    }

    /// Pull the visible offset back inside the text after an invariant breach
    pub(crate) fn clamp_visible(&mut self) {
        let mut end = self.visible.min(self.text.len());
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        self.visible = end;
    }
}

/// Ordered messages of one conversation.
///
/// Order is send/arrival order, and at most one message is in flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a conversation from earlier messages.
    ///
    /// Historical messages are never animated, so everything is fully
    /// visible. A message that was still streaming is marked failed, and a
    /// repeated id keeps only its first occurrence.
    pub fn restore(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut conversation = Self::new();
        for mut message in messages {
            if !message.is_terminal() {
                message.set_status(MessageStatus::Failed);
            }
            message.reveal_all();
            if conversation.get(message.id()).is_some() {
                tracing::warn!("Dropping restored message with duplicate id {}", message.id());
                continue;
            }
            conversation.messages.push(message);
        }
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// The message still receiving text, if any
    pub fn in_flight(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| !m.is_terminal())
    }

    /// The most recent assistant message
    pub fn latest_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Append the user message and a pending assistant message for a new
    /// exchange. Returns the `(user, assistant)` message ids.
    pub(crate) fn begin_exchange(&mut self, query: &str) -> (MessageId, MessageId) {
        debug_assert!(self.in_flight().is_none(), "exchange begun while another is in flight");

        // Earlier answers become history and are shown in full
        for message in &mut self.messages {
            message.reveal_all();
        }

        let user = Message::user(query);
        let assistant = Message::assistant_pending();
        let ids = (user.id(), assistant.id());
        self.push(user);
        self.push(assistant);
        ids
    }

    fn push(&mut self, message: Message) {
        let duplicate = self.get(message.id).is_some();
        debug_assert!(!duplicate, "duplicate message id {}", message.id);
        if duplicate {
            tracing::error!("Refusing to append duplicate message id {}", message.id);
            return;
        }
        self.messages.push(message);
    }
}
