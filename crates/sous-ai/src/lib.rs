//! sous-ai: wire protocol and backend client for the sous cooking assistant
//!
//! This crate turns the assistant's event-stream response into typed
//! [`ProtocolEvent`]s and exposes the backend's HTTP endpoints.

pub mod auth;
pub mod client;
pub mod decoder;
pub mod error;
pub mod stream;
pub mod types;

pub use auth::{CredentialSource, CredentialStore};
pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use decoder::FrameDecoder;
pub use error::{Error, Result};
pub use stream::{EventStream, ProtocolEvent, decode_stream, decode_stream_with_limit};
pub use types::*;
