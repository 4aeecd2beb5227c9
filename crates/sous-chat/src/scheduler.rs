//! Paced reveal of streamed text.
//!
//! Network reads are bursty; a whole sentence can land in one chunk. The
//! scheduler re-serializes what has arrived into a steady cadence: every tick
//! reveals at most `chars_per_tick` characters of the tracked message, no
//! matter how much text is buffered behind it.

use std::time::Duration;

use crate::conversation::{Conversation, MessageId};

/// Shortest tick period; a zero period cannot drive a timer
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Reveal cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Characters revealed per tick
    pub chars_per_tick: usize,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(15),
            chars_per_tick: 1,
        }
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Revealed this many characters
    Revealed(usize),
    /// Caught up with the text, but more may still arrive
    Waiting,
    /// Message is finished and fully shown; the scheduler has stopped
    Finished,
    /// Nothing is being tracked
    Idle,
}

/// Reveals one message at a time.
///
/// Ticks are driven by the caller, one after another, so there is never more
/// than one revealer for a message.
#[derive(Debug, Default)]
pub struct DisplayScheduler {
    config: RevealConfig,
    target: Option<MessageId>,
    /// Text length seen on the previous tick; authoritative text never shrinks
    last_len: usize,
}

impl DisplayScheduler {
    pub fn new(config: RevealConfig) -> Self {
        Self {
            config: RevealConfig {
                interval: config.interval.max(MIN_INTERVAL),
                chars_per_tick: config.chars_per_tick.max(1),
            },
            target: None,
            last_len: 0,
        }
    }

    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    /// Start animating `id`; any previously tracked message is released
    pub fn track(&mut self, id: MessageId) {
        self.target = Some(id);
        self.last_len = 0;
    }

    pub fn target(&self) -> Option<MessageId> {
        self.target
    }

    /// Stop tracking without touching the conversation
    pub fn release(&mut self) {
        self.target = None;
    }

    /// Advance the reveal by one tick
    pub fn tick(&mut self, state: &mut Conversation) -> Tick {
        let Some(id) = self.target else {
            return Tick::Idle;
        };
        let Some(message) = state.get_mut(id) else {
            tracing::debug!(%id, "Tracked message disappeared; stopping reveal");
            self.target = None;
            return Tick::Idle;
        };

        let len = message.text().len();
        if len < self.last_len || message.visible_len() > len {
            debug_assert!(false, "authoritative text of {} shrank below its visible text", id);
            tracing::error!(%id, "Authoritative text shrank; clamping visible text");
            message.clamp_visible();
        }
        self.last_len = len;

        let revealed = message.reveal(self.config.chars_per_tick);

        if revealed > 0 {
            Tick::Revealed(revealed)
        } else if message.is_terminal() {
            self.target = None;
            Tick::Finished
        } else {
            Tick::Waiting
        }
    }
}
