//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use squid::{InMemoryRegistry, InitializeAgreementRequest};

/// State held by the request handlers.
pub struct AppState {
    /// Descriptors stored through the registry routes.
    pub registry: InMemoryRegistry,
    /// Every agreement initialization the gateway has accepted, in order.
    pub initialized: Mutex<Vec<InitializeAgreementRequest>>,
}

impl AppState {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            registry: InMemoryRegistry::new(public_url),
            initialized: Mutex::new(Vec::new()),
        }
    }
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
