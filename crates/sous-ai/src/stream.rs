//! Streaming event types and the byte-stream adapter

use crate::{
    decoder::{FrameDecoder, MAX_FRAME_BYTES},
    error::{Error, Result},
    types::AnalysisPayload,
};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_stream::Stream;

/// Events decoded from the assistant's event stream
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// A piece of answer text
    Token(String),
    /// Routing analysis for the answer; may arrive between tokens
    Analysis(AnalysisPayload),
    /// The server reported a failure
    Error(String),
    /// The answer is complete
    Done,
}

impl ProtocolEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolEvent::Done | ProtocolEvent::Error(_))
    }
}

/// A lazy, finite stream of decoded events.
///
/// `Err` items are transport failures and are always the last item. The
/// stream ending without `Done` means the connection closed normally.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ProtocolEvent>> + Send>>;

/// Decode a stream of raw body chunks into protocol events.
///
/// Chunk boundaries are not assumed to align with frames; partial frames are
/// carried over until their terminating blank line arrives.
pub fn decode_stream<S, B, E>(chunks: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    decode_stream_with_limit(chunks, MAX_FRAME_BYTES)
}

/// Like [`decode_stream`], failing with [`Error::BufferOverflow`] once more
/// than `limit` bytes arrive without completing a frame.
pub fn decode_stream_with_limit<S, B, E>(chunks: S, limit: usize) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let pending = Arc::new(AtomicUsize::new(0));
    let received = pending.clone();
    let bytes = chunks.map(move |chunk| -> Result<B> {
        let chunk = chunk.map_err(Into::<Error>::into)?;
        let len = chunk.as_ref().len();
        if received.fetch_add(len, Ordering::Relaxed) + len > limit {
            return Err(Error::BufferOverflow { limit });
        }
        Ok(chunk)
    });
    let mut frames = Box::pin(bytes.eventsource());

    Box::pin(async_stream::stream! {
        let mut decoder = FrameDecoder::new();

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) => {
                    pending.store(0, Ordering::Relaxed);
                    if let Some(event) = decoder.decode(&frame.data) {
                        yield Ok(event);
                    }
                }
                Err(EventStreamError::Transport(e)) => {
                    yield Err(e);
                    return;
                }
                Err(EventStreamError::Utf8(e)) => decoder.skip_malformed(e),
                Err(EventStreamError::Parser(e)) => {
                    // The framer cannot resync past a parse failure
                    decoder.skip_malformed(e);
                    break;
                }
            }
        }

        tracing::debug!(
            "Event stream closed (sentinel: {}, malformed frames: {})",
            decoder.saw_sentinel(),
            decoder.malformed_frames()
        );
    })
}
