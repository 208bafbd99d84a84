//! sfbus streaming - resumable platform-event subscriptions
//!
//! Subscriptions ride a Bayeux/CometD client supplied by the host (see
//! [`BayeuxClient`]). This crate adds what the server needs to resume a
//! stream after a reconnect:
//!
//! - [`ReplayCursorStore`]: newest replay id per channel
//! - [`ReplayExtension`]: records ids on delivery, stamps them on re-subscribe
//! - [`SubscriptionManager`]: token, header, hooks and subscribes in one call
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = SubscriptionManager::new(tokens, factory, "58.0");
//! let handle = manager
//!     .start(vec![
//!         Subscription::new(event_channel("Address_Request__e"), |msg| {
//!             println!("{:?}", msg.payload());
//!         })
//!         .replay_from(ReplayId::FromStart),
//!     ])
//!     .await?;
//!
//! handle.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod error;
mod extension;
mod message;
mod replay;
mod subscription;

pub use client::*;
pub use error::*;
pub use extension::*;
pub use message::*;
pub use replay::*;
pub use subscription::*;
