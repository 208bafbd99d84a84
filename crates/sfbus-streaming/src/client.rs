//! Bayeux client boundary.
//!
//! The wire protocol (handshake, long-poll connect, reconnect advice) lives
//! in whatever Bayeux library the host links. This module names the small
//! surface the subscription manager needs from it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::StreamResult;
use crate::extension::Extension;
use crate::message::Message;

/// Header used for the bearer token.
pub const AUTHORIZATION: &str = "Authorization";

/// Callback for messages delivered on a subscribed channel. Runs on the
/// client's dispatch loop; keep it short.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Callback for a transport lifecycle event.
pub type TransportHook = Arc<dyn Fn() + Send + Sync>;

/// Transport lifecycle events a client reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportEvent {
    /// Connection (re-)established.
    Up,
    /// Connection lost; the client will reconnect on its own.
    Down,
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "transport:up"),
            Self::Down => write!(f, "transport:down"),
        }
    }
}

/// A connected (or connecting) Bayeux client.
#[async_trait]
pub trait BayeuxClient: Send + Sync + fmt::Debug {
    /// Set a header sent with every subsequent request, including the
    /// handshake after a reconnect.
    fn set_header(&self, name: &str, value: &str);

    /// Install a pipeline extension.
    fn add_extension(&self, extension: Arc<dyn Extension>);

    /// Register a lifecycle hook.
    fn bind(&self, event: TransportEvent, hook: TransportHook);

    /// Subscribe to a channel.
    ///
    /// # Errors
    /// Returns an error if the server rejects the subscription.
    async fn subscribe(&self, channel: &str, handler: MessageHandler) -> StreamResult<()>;

    /// Unsubscribe from a channel.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    async fn unsubscribe(&self, channel: &str) -> StreamResult<()>;

    /// Close the connection.
    ///
    /// # Errors
    /// Returns an error if the disconnect request fails.
    async fn disconnect(&self) -> StreamResult<()>;
}

/// Creates clients for a streaming endpoint.
pub trait ClientFactory: Send + Sync + fmt::Debug {
    /// Build a client for `endpoint` (e.g. `https://na1.example.com/cometd/58.0`).
    ///
    /// # Errors
    /// Returns an error if the client cannot be constructed.
    fn create(&self, endpoint: &str) -> StreamResult<Arc<dyn BayeuxClient>>;
}

/// Streaming endpoint for an instance and API version.
#[must_use]
pub fn streaming_endpoint(instance_url: &str, api_version: &str) -> String {
    format!(
        "{}/cometd/{}",
        instance_url.trim_end_matches('/'),
        api_version.trim_start_matches('v')
    )
}
