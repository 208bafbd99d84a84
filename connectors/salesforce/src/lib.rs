//! Salesforce platform-event bus client
//!
//! Publishes domain records as platform events over REST and subscribes to
//! them over CometD, sharing one OAuth session between both paths.
//!
//! # Example
//!
//! ```rust,ignore
//! let bus = SalesforceBus::new(SalesforceConfig::from_env()?)?;
//!
//! // Publish
//! bus.publisher().send(&address).await?;
//!
//! // Subscribe (the Bayeux client comes from the host)
//! let handle = bus
//!     .subscriptions(factory)
//!     .start(vec![address_subscription(|msg| println!("{msg:?}"))])
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod event;
mod publisher;

pub use config::*;
pub use error::*;
pub use event::*;
pub use publisher::*;

use std::sync::Arc;

use sfbus_core::{HttpTransport, ReqwestTransport};
use sfbus_oauth::TokenManager;
use sfbus_streaming::{ClientFactory, Message, SubscriptionManager};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Publish and subscribe paths over one shared session.
#[derive(Debug, Clone)]
pub struct SalesforceBus {
    config: SalesforceConfig,
    http: Arc<dyn HttpTransport>,
    tokens: Arc<TokenManager>,
}

impl SalesforceBus {
    /// Validate `config` and build the HTTP client and token manager.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: SalesforceConfig) -> ConfigResult<Self> {
        config.validate()?;
        let http = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(http)))
    }

    /// Build over an existing transport. The configuration is used as given.
    #[must_use]
    pub fn with_transport(config: SalesforceConfig, http: Arc<dyn HttpTransport>) -> Self {
        let tokens = Arc::new(
            TokenManager::new(Arc::clone(&http), config.credentials())
                .with_session_ttl(config.session_ttl())
                .with_refresh_margin(config.refresh_margin()),
        );
        info!(host = %config.host, api_version = %config.api_version(), "Salesforce bus ready");
        Self {
            config,
            http,
            tokens,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SalesforceConfig {
        &self.config
    }

    /// Shared token manager.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Publisher using the shared session.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher::new(
            Arc::clone(&self.http),
            Arc::clone(&self.tokens),
            self.config.api_version(),
            self.config.system_source.clone(),
        )
        .with_max_reauth_retries(self.config.max_reauth_retries)
    }

    /// Subscription manager using the shared session and `factory` for the
    /// Bayeux client.
    #[must_use]
    pub fn subscriptions(&self, factory: Arc<dyn ClientFactory>) -> SubscriptionManager {
        SubscriptionManager::new(Arc::clone(&self.tokens), factory, self.config.api_version())
    }

    /// Check if a delivered event was published by this system.
    #[must_use]
    pub fn is_own_event(&self, message: &Message) -> bool {
        event_source(message) == Some(self.config.system_source.as_str())
    }
}

/// Install a `tracing` subscriber honouring `RUST_LOG`. Does nothing if one
/// is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
