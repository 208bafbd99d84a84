//! In-memory Bayeux client.
//!
//! Runs messages through installed extensions exactly the way a real client
//! would, without a server. Tests drive deliveries, reconnects and lifecycle
//! events by hand.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sfbus_streaming::{
    BayeuxClient, ClientFactory, Extension, Message, MessageHandler, StreamError, StreamResult,
    TransportEvent, TransportHook,
};

/// Bayeux client double that records everything it is asked to do.
#[derive(Default)]
pub struct MemoryBayeuxClient {
    endpoint: String,
    headers: Mutex<HashMap<String, String>>,
    extensions: Mutex<Vec<Arc<dyn Extension>>>,
    hooks: Mutex<Vec<(TransportEvent, TransportHook)>>,
    subscriptions: Mutex<Vec<(String, MessageHandler)>>,
    sent: Mutex<Vec<Message>>,
    unsubscribed: Mutex<Vec<String>>,
    rejected: HashSet<String>,
    disconnects: Mutex<u32>,
}

impl MemoryBayeuxClient {
    /// Create a client for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Builder: make subscribes to `channel` fail.
    #[must_use]
    pub fn rejecting(mut self, channel: impl Into<String>) -> Self {
        self.rejected.insert(channel.into());
        self
    }

    /// Endpoint the client was created for.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.lock().get(name).cloned()
    }

    /// Number of installed extensions.
    #[must_use]
    pub fn extension_count(&self) -> usize {
        self.extensions.lock().len()
    }

    /// Number of hooks bound for `event`.
    #[must_use]
    pub fn hook_count(&self, event: TransportEvent) -> usize {
        self.hooks.lock().iter().filter(|(e, _)| *e == event).count()
    }

    /// Active subscriptions, in subscribe order.
    #[must_use]
    pub fn subscribed_channels(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Every outbound `/meta/subscribe` message, after extensions ran.
    #[must_use]
    pub fn sent_subscribes(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Most recent outbound subscribe for `channel`.
    #[must_use]
    pub fn last_subscribe(&self, channel: &str) -> Option<Message> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|m| m.subscription.as_deref() == Some(channel))
            .cloned()
    }

    /// Channels unsubscribed so far.
    #[must_use]
    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }

    /// Number of `disconnect` calls.
    #[must_use]
    pub fn disconnects(&self) -> u32 {
        *self.disconnects.lock()
    }

    /// Push an inbound message through the extensions to matching handlers.
    /// Returns how many handlers saw it.
    pub fn deliver(&self, message: Message) -> usize {
        let extensions = self.extensions.lock().clone();
        let handlers: Vec<MessageHandler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(channel, _)| *channel == message.channel)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        let mut delivered = 0;
        run_incoming(&extensions, message, &mut |m| {
            for handler in &handlers {
                handler(&m);
                delivered += 1;
            }
        });
        delivered
    }

    /// Invoke every hook bound for `event`.
    pub fn fire(&self, event: TransportEvent) {
        let hooks: Vec<TransportHook> = self
            .hooks
            .lock()
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        for hook in hooks {
            hook();
        }
    }

    /// Re-send a subscribe for every active channel, as a client does after
    /// re-handshaking. Returns the messages as sent.
    pub fn resubscribe_all(&self) -> Vec<Message> {
        self.subscribed_channels()
            .into_iter()
            .filter_map(|channel| self.send_subscribe(&channel))
            .collect()
    }

    /// Connection drop followed by automatic reconnect.
    pub fn simulate_reconnect(&self) -> Vec<Message> {
        self.fire(TransportEvent::Down);
        let sent = self.resubscribe_all();
        self.fire(TransportEvent::Up);
        sent
    }

    fn send_subscribe(&self, channel: &str) -> Option<Message> {
        let extensions = self.extensions.lock().clone();
        let mut current = Some(Message::subscribe(channel));
        for extension in &extensions {
            let Some(message) = current.take() else {
                break;
            };
            extension.outgoing(message, &mut |m| current = Some(m));
        }

        if let Some(message) = &current {
            self.sent.lock().push(message.clone());
        }
        current
    }
}

fn run_incoming(
    extensions: &[Arc<dyn Extension>],
    message: Message,
    deliver: &mut dyn FnMut(Message),
) {
    match extensions.split_first() {
        Some((first, rest)) => first.incoming(message, &mut |m| run_incoming(rest, m, deliver)),
        None => deliver(message),
    }
}

impl fmt::Debug for MemoryBayeuxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBayeuxClient")
            .field("endpoint", &self.endpoint)
            .field("channels", &self.subscribed_channels())
            .field("extensions", &self.extension_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BayeuxClient for MemoryBayeuxClient {
    fn set_header(&self, name: &str, value: &str) {
        self.headers.lock().insert(name.to_string(), value.to_string());
    }

    fn add_extension(&self, extension: Arc<dyn Extension>) {
        self.extensions.lock().push(extension);
    }

    fn bind(&self, event: TransportEvent, hook: TransportHook) {
        self.hooks.lock().push((event, hook));
    }

    async fn subscribe(&self, channel: &str, handler: MessageHandler) -> StreamResult<()> {
        self.send_subscribe(channel);
        if self.rejected.contains(channel) {
            return Err(StreamError::SubscribeFailed {
                channel: channel.to_string(),
                reason: "403::Unknown channel".into(),
            });
        }
        self.subscriptions.lock().push((channel.to_string(), handler));
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> StreamResult<()> {
        self.subscriptions.lock().retain(|(c, _)| c != channel);
        self.unsubscribed.lock().push(channel.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> StreamResult<()> {
        *self.disconnects.lock() += 1;
        Ok(())
    }
}

/// Factory handing out [`MemoryBayeuxClient`]s and keeping them for
/// inspection.
#[derive(Debug, Default)]
pub struct MemoryClientFactory {
    clients: Mutex<Vec<Arc<MemoryBayeuxClient>>>,
    rejected: Vec<String>,
}

impl MemoryClientFactory {
    /// Create a factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: clients reject subscribes to `channel`.
    #[must_use]
    pub fn rejecting(mut self, channel: impl Into<String>) -> Self {
        self.rejected.push(channel.into());
        self
    }

    /// Every client created so far.
    #[must_use]
    pub fn clients(&self) -> Vec<Arc<MemoryBayeuxClient>> {
        self.clients.lock().clone()
    }

    /// The most recently created client.
    #[must_use]
    pub fn last_client(&self) -> Option<Arc<MemoryBayeuxClient>> {
        self.clients.lock().last().cloned()
    }
}

impl ClientFactory for MemoryClientFactory {
    fn create(&self, endpoint: &str) -> StreamResult<Arc<dyn BayeuxClient>> {
        let client = self
            .rejected
            .iter()
            .fold(MemoryBayeuxClient::new(endpoint), |client, channel| {
                client.rejecting(channel.clone())
            });
        let client = Arc::new(client);
        self.clients.lock().push(Arc::clone(&client));
        Ok(client)
    }
}
