//! Message extensions.
//!
//! An [`Extension`] sits in the Bayeux client's message pipeline and sees
//! every inbound and outbound message. Each hook must pass the message on via
//! `next` exactly once (possibly modified).

use std::fmt;

use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::message::Message;
use crate::replay::ReplayCursorStore;

/// Continuation of the message pipeline.
pub type Next<'a> = &'a mut dyn FnMut(Message);

/// Pipeline interceptor installed on a Bayeux client.
pub trait Extension: Send + Sync + fmt::Debug {
    /// Inbound message from the server. `next` delivers it to subscribers.
    fn incoming(&self, message: Message, next: Next<'_>) {
        next(message);
    }

    /// Outbound message to the server. `next` sends it.
    fn outgoing(&self, message: Message, next: Next<'_>) {
        next(message);
    }
}

/// Records replay ids from deliveries and stamps them on re-subscribes.
#[derive(Debug, Clone)]
pub struct ReplayExtension {
    cursors: ReplayCursorStore,
}

impl ReplayExtension {
    /// Create an extension backed by `cursors`.
    #[must_use]
    pub const fn new(cursors: ReplayCursorStore) -> Self {
        Self { cursors }
    }

    /// The backing store.
    #[must_use]
    pub const fn cursors(&self) -> &ReplayCursorStore {
        &self.cursors
    }
}

impl Extension for ReplayExtension {
    fn incoming(&self, message: Message, next: Next<'_>) {
        let replay_id = message.replay_id();
        let channel = replay_id.map(|_| message.channel.clone());

        // Handler first: a crash before the bookkeeping below means the
        // event is redelivered after restart, never skipped.
        next(message);

        if let (Some(channel), Some(replay_id)) = (channel, replay_id) {
            if self.cursors.record_delivery(&channel, replay_id) {
                trace!(%channel, replay_id, "Recorded replay id");
            }
        }
    }

    fn outgoing(&self, mut message: Message, next: Next<'_>) {
        if message.is_subscribe() {
            if let Some(channel) = message.subscription.clone() {
                if let Some(replay_id) = self.cursors.resolve(&channel) {
                    debug!(%channel, %replay_id, "Attaching replay id to subscribe");
                    message
                        .ext
                        .get_or_insert_with(Map::new)
                        .insert("replay".into(), json!({ channel: i64::from(replay_id) }));
                }
            }
        }

        next(message);
    }
}

/// Extract the replay map from a subscribe message, if any.
#[must_use]
pub fn replay_ext(message: &Message) -> Option<&Map<String, Value>> {
    message.ext.as_ref()?.get("replay")?.as_object()
}
