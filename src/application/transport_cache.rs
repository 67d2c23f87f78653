//! Process-wide cache for the authenticated API transport.
//!
//! The host creates one `TransportCache` at startup and hands it to every
//! orchestrator it builds. The first invocation that gets past secret
//! resolution performs the OAuth2 grant; concurrent first invocations wait on
//! the same initialization instead of racing. A failed grant leaves the cache
//! empty so the next invocation tries again. Once set, the transport is reused
//! for the life of the process and refreshes its own token; rotated
//! credentials therefore only take effect after a restart.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::domain::error::PipelineError;
use crate::infrastructure::wow_api::{AuthenticatedTransport, OAuth2Secrets};

#[derive(Default)]
pub struct TransportCache {
    transport: OnceCell<Arc<AuthenticatedTransport>>,
}

impl TransportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.transport.initialized()
    }

    pub async fn get_or_authenticate(
        &self,
        secrets: OAuth2Secrets,
        token_url: &str,
    ) -> Result<Arc<AuthenticatedTransport>, PipelineError> {
        if let Some(transport) = self.transport.get() {
            debug!("Reusing cached API transport");
            return Ok(Arc::clone(transport));
        }

        let transport = self
            .transport
            .get_or_try_init(|| async move {
                info!("Authenticating API transport");
                AuthenticatedTransport::with_token_url(secrets, token_url).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(transport))
    }
}
