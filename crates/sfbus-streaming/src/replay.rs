//! Replay cursors.
//!
//! The server stamps every delivered event with a replay id. Remembering the
//! newest id per channel and sending it back on re-subscribe makes the server
//! resume the stream where this client left off, instead of at "now".

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Wire value asking for new events only.
pub const REPLAY_FROM_NOW: i64 = -1;
/// Wire value asking for every event still retained by the server.
pub const REPLAY_FROM_START: i64 = -2;

/// Position to resume a channel from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ReplayId {
    /// Only events published after the subscribe.
    FromNow,
    /// All events in the retention window.
    FromStart,
    /// Events after this server-issued id.
    Id(i64),
}

impl From<i64> for ReplayId {
    fn from(value: i64) -> Self {
        match value {
            REPLAY_FROM_NOW => Self::FromNow,
            REPLAY_FROM_START => Self::FromStart,
            id => Self::Id(id),
        }
    }
}

impl From<ReplayId> for i64 {
    fn from(value: ReplayId) -> Self {
        match value {
            ReplayId::FromNow => REPLAY_FROM_NOW,
            ReplayId::FromStart => REPLAY_FROM_START,
            ReplayId::Id(id) => id,
        }
    }
}

impl fmt::Display for ReplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromNow => write!(f, "from-now"),
            Self::FromStart => write!(f, "from-start"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Where a channel's cursor comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorSource {
    /// Always resume from this value; deliveries do not move it.
    Fixed(ReplayId),
    /// Start from this value, then follow every delivered replay id.
    Tracked(ReplayId),
}

impl CursorSource {
    /// Value to send on the next subscribe.
    #[must_use]
    pub const fn current(&self) -> ReplayId {
        match self {
            Self::Fixed(id) | Self::Tracked(id) => *id,
        }
    }
}

impl Default for CursorSource {
    fn default() -> Self {
        Self::Tracked(ReplayId::FromNow)
    }
}

/// Per-channel replay cursors, shared between the subscription manager and
/// the replay extension. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct ReplayCursorStore {
    cursors: Arc<RwLock<HashMap<String, CursorSource>>>,
}

impl ReplayCursorStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with previously persisted cursors. Seeded
    /// channels are tracked from the given ids.
    #[must_use]
    pub fn from_snapshot(snapshot: impl IntoIterator<Item = (String, ReplayId)>) -> Self {
        let cursors = snapshot
            .into_iter()
            .map(|(channel, id)| (channel, CursorSource::Tracked(id)))
            .collect();
        Self {
            cursors: Arc::new(RwLock::new(cursors)),
        }
    }

    /// Record where `channel` should start. Last write wins.
    pub fn record_replay_intent(&self, channel: &str, source: CursorSource) {
        self.cursors.write().insert(channel.to_string(), source);
    }

    /// Record a delivered replay id. Only tracked channels move; returns
    /// true if the stored cursor changed.
    pub fn record_delivery(&self, channel: &str, replay_id: i64) -> bool {
        let mut cursors = self.cursors.write();
        match cursors.get_mut(channel) {
            Some(source) if matches!(source, CursorSource::Tracked(_)) => {
                *source = CursorSource::Tracked(ReplayId::Id(replay_id));
                true
            }
            _ => false,
        }
    }

    /// Cursor to send for `channel` right now.
    #[must_use]
    pub fn resolve(&self, channel: &str) -> Option<ReplayId> {
        self.cursors.read().get(channel).map(CursorSource::current)
    }

    /// Stored source for `channel`.
    #[must_use]
    pub fn source(&self, channel: &str) -> Option<CursorSource> {
        self.cursors.read().get(channel).copied()
    }

    /// Current cursor of every channel, for persisting across restarts.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ReplayId> {
        self.cursors
            .read()
            .iter()
            .map(|(channel, source)| (channel.clone(), source.current()))
            .collect()
    }

    /// Number of channels with a cursor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.read().len()
    }

    /// Check if no channel has a cursor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.read().is_empty()
    }
}
