//! Subscription lifecycle.
//!
//! [`SubscriptionManager::start`] wires a Bayeux client to the shared
//! [`TokenManager`] and the replay cursors, then subscribes every requested
//! channel. The returned [`SubscriptionHandle`] is the stop signal.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use sfbus_oauth::TokenManager;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::client::{
    AUTHORIZATION, BayeuxClient, ClientFactory, MessageHandler, TransportEvent, streaming_endpoint,
};
use crate::extension::ReplayExtension;
use crate::message::Message;
use crate::replay::{CursorSource, ReplayCursorStore, ReplayId};
use crate::{StreamError, StreamResult};

/// A channel to subscribe, where to start it, and who receives its events.
#[derive(Clone)]
pub struct Subscription {
    channel: String,
    replay: CursorSource,
    handler: MessageHandler,
}

impl Subscription {
    /// Subscribe `channel`, starting from new events only.
    pub fn new(channel: impl Into<String>, handler: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        Self {
            channel: channel.into(),
            replay: CursorSource::default(),
            handler: Arc::new(handler),
        }
    }

    /// Builder: start from `replay_id`, then follow deliveries.
    #[must_use]
    pub const fn replay_from(mut self, replay_id: ReplayId) -> Self {
        self.replay = CursorSource::Tracked(replay_id);
        self
    }

    /// Builder: always resume from `replay_id`, ignoring deliveries.
    #[must_use]
    pub const fn pinned(mut self, replay_id: ReplayId) -> Self {
        self.replay = CursorSource::Fixed(replay_id);
        self
    }

    /// Channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Replay intent.
    #[must_use]
    pub const fn replay(&self) -> CursorSource {
        self.replay
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("replay", &self.replay)
            .finish_non_exhaustive()
    }
}

/// Starts subscriptions against the streaming endpoint.
#[derive(Debug)]
pub struct SubscriptionManager {
    tokens: Arc<TokenManager>,
    factory: Arc<dyn ClientFactory>,
    api_version: String,
    cursors: ReplayCursorStore,
}

impl SubscriptionManager {
    /// Create a manager with an empty cursor store.
    pub fn new(
        tokens: Arc<TokenManager>,
        factory: Arc<dyn ClientFactory>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            factory,
            api_version: api_version.into(),
            cursors: ReplayCursorStore::new(),
        }
    }

    /// Builder: use an existing cursor store (e.g. restored from a snapshot).
    #[must_use]
    pub fn with_cursors(mut self, cursors: ReplayCursorStore) -> Self {
        self.cursors = cursors;
        self
    }

    /// The replay cursors this manager records into.
    #[must_use]
    pub const fn cursors(&self) -> &ReplayCursorStore {
        &self.cursors
    }

    /// Connect and subscribe every channel in `subscriptions`, in order.
    ///
    /// # Errors
    /// Returns [`StreamError::Authentication`] if no session can be obtained,
    /// [`StreamError::MissingInstanceUrl`] if the session has no instance
    /// URL, or the first subscribe failure. On a subscribe failure the client
    /// is disconnected before returning.
    #[instrument(skip_all, fields(api_version = %self.api_version, channels = subscriptions.len()))]
    pub async fn start(&self, subscriptions: Vec<Subscription>) -> StreamResult<SubscriptionHandle> {
        let runtime = current_runtime()?;
        let session = self.tokens.valid_session().await?;
        // The token manager only checks for a non-blank value; a bare "/"
        // still trims to nothing here.
        if session.instance_url().trim().is_empty() {
            return Err(StreamError::MissingInstanceUrl);
        }

        let endpoint = streaming_endpoint(session.instance_url(), &self.api_version);
        info!(%endpoint, "Connecting to streaming endpoint");

        let client = self.factory.create(&endpoint)?;
        client.set_header(AUTHORIZATION, &session.authorization_header());
        self.bind_lifecycle(&client, &endpoint, runtime);
        client.add_extension(Arc::new(ReplayExtension::new(self.cursors.clone())));

        let mut channels = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            self.cursors
                .record_replay_intent(&subscription.channel, subscription.replay);
            debug!(
                channel = %subscription.channel,
                replay = %subscription.replay.current(),
                "Subscribing"
            );

            if let Err(e) = client
                .subscribe(&subscription.channel, subscription.handler)
                .await
            {
                warn!(channel = %subscription.channel, error = %e, "Subscribe failed");
                if let Err(disconnect_err) = client.disconnect().await {
                    debug!(error = %disconnect_err, "Disconnect after failed subscribe also failed");
                }
                return Err(e);
            }
            channels.push(subscription.channel);
        }

        info!(channels = channels.len(), "Subscriptions active");
        Ok(SubscriptionHandle {
            client,
            channels,
            cursors: self.cursors.clone(),
            endpoint,
        })
    }

    fn bind_lifecycle(&self, client: &Arc<dyn BayeuxClient>, endpoint: &str, runtime: Handle) {
        let weak: Weak<dyn BayeuxClient> = Arc::downgrade(client);
        let tokens = Arc::clone(&self.tokens);
        let down_endpoint = endpoint.to_string();

        client.bind(
            TransportEvent::Down,
            Arc::new(move || {
                warn!(endpoint = %down_endpoint, "Streaming connection lost");
                let Some(client) = weak.upgrade() else {
                    return;
                };

                // The client reconnects by itself; it must do so with a live token.
                if let Some(session) = tokens.session() {
                    client.set_header(AUTHORIZATION, &session.authorization_header());
                    return;
                }

                let tokens = Arc::clone(&tokens);
                let weak = Arc::downgrade(&client);
                runtime.spawn(async move {
                    match tokens.valid_session().await {
                        Ok(session) => {
                            if let Some(client) = weak.upgrade() {
                                client.set_header(AUTHORIZATION, &session.authorization_header());
                                info!("Re-attached refreshed token to streaming client");
                            }
                        }
                        Err(e) => warn!(error = %e, "Token refresh after disconnect failed"),
                    }
                });
            }),
        );

        let up_endpoint = endpoint.to_string();
        client.bind(
            TransportEvent::Up,
            Arc::new(move || info!(endpoint = %up_endpoint, "Streaming connection established")),
        );
    }
}

/// Runtime the disconnect hook spawns token refreshes on.
fn current_runtime() -> StreamResult<Handle> {
    Handle::try_current().map_err(|e| {
        StreamError::InvalidState(format!("subscriptions need a tokio runtime: {e}"))
    })
}

/// Running subscriptions. Dropping the handle leaves them running; call
/// [`SubscriptionHandle::stop`] to shut down cleanly.
#[derive(Debug)]
pub struct SubscriptionHandle {
    client: Arc<dyn BayeuxClient>,
    channels: Vec<String>,
    cursors: ReplayCursorStore,
    endpoint: String,
}

impl SubscriptionHandle {
    /// Subscribed channels, in subscribe order.
    #[must_use]
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Replay cursors, e.g. to snapshot before shutdown.
    #[must_use]
    pub const fn cursors(&self) -> &ReplayCursorStore {
        &self.cursors
    }

    /// Streaming endpoint this handle is connected to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &Arc<dyn BayeuxClient> {
        &self.client
    }

    /// Unsubscribe every channel, then disconnect.
    ///
    /// Every step is attempted even if an earlier one fails.
    ///
    /// # Errors
    /// Returns the first failure encountered.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn stop(self) -> StreamResult<()> {
        let mut first_error = None;

        for channel in &self.channels {
            if let Err(e) = self.client.unsubscribe(channel).await {
                warn!(%channel, error = %e, "Unsubscribe failed");
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "Disconnect failed");
            first_error.get_or_insert(e);
        }

        info!("Subscriptions stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Wait for `shutdown`, then [`stop`](Self::stop).
    ///
    /// # Errors
    /// See [`SubscriptionHandle::stop`].
    pub async fn run_until<F>(self, shutdown: F) -> StreamResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        shutdown.await;
        info!("Shutdown requested");
        self.stop().await
    }
}
