//! Shared application state for the gateway

use std::sync::Arc;
use tuber_chats::ChatRelay;
use tuber_config::AppConfig;

use crate::identity::IdentityResolver;

/// Shared application state: the injected relay plus the identity layer
#[derive(Clone)]
pub struct GatewayState {
    /// Chat relay bound to the shared log and broadcast backends
    pub relay: Arc<ChatRelay>,
    /// Resolves participants from session tokens
    pub identity: Arc<IdentityResolver>,
}

impl GatewayState {
    pub fn new(relay: Arc<ChatRelay>, identity: IdentityResolver) -> Self {
        Self {
            relay,
            identity: Arc::new(identity),
        }
    }

    /// Build the state from configuration around an already wired relay.
    pub fn from_config(config: &AppConfig, relay: Arc<ChatRelay>) -> Self {
        let identity = IdentityResolver::new(&config.auth, config.chat.allow_anonymous);
        Self::new(relay, identity)
    }

    pub fn relay(&self) -> &ChatRelay {
        &self.relay
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }
}
