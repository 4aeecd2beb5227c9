//! Transport abstraction for opening chat exchanges

use std::sync::Arc;

use async_trait::async_trait;
use sous_ai::{ApiClient, CredentialSource, EventStream, Result};

/// Opens one event stream per exchange
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `query` and return the decoded answer stream.
    ///
    /// Dropping the returned stream closes the connection.
    async fn open(&self, query: &str) -> Result<EventStream>;
}

/// HTTP transport against the assistant backend.
///
/// The bearer credential is read from its source on every call.
pub struct HttpTransport {
    client: ApiClient,
    credentials: Option<Arc<dyn CredentialSource>>,
}

impl HttpTransport {
    /// Create a transport that sends no credential
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            credentials: None,
        }
    }

    /// Attach a credential source
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, query: &str) -> Result<EventStream> {
        let credential = self.credentials.as_ref().and_then(|c| c.current());
        tracing::debug!(
            authenticated = credential.is_some(),
            "Opening chat stream to {}",
            self.client.base_url()
        );
        self.client.open_chat_stream(query, credential.as_ref()).await
    }
}
