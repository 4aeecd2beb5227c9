//! Bearer credential sources for authenticated requests

use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::Credential;

/// Supplies the bearer credential attached to each request.
///
/// Read on every call, so a credential replaced after login is picked up by
/// the next request without rebuilding the client.
pub trait CredentialSource: Send + Sync {
    /// The credential to attach, if any
    fn current(&self) -> Option<Credential>;

    /// Drop the credential after the backend rejected it
    fn invalidate(&self);
}

/// Shared in-memory credential slot
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl CredentialStore {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credential)),
        }
    }

    /// Replace the stored credential
    pub fn set(&self, credential: Credential) {
        *self.inner.write() = Some(credential);
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl CredentialSource for CredentialStore {
    fn current(&self) -> Option<Credential> {
        self.inner.read().clone()
    }

    fn invalidate(&self) {
        if self.inner.write().take().is_some() {
            tracing::info!("Bearer credential invalidated");
        }
    }
}
