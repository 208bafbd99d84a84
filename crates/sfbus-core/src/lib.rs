//! sfbus core - shared plumbing for the platform-event client.
//!
//! - [`retry::RetryPolicy`]: bounded, fixed-delay retry used by both the
//!   authentication and publish paths
//! - [`HttpTransport`]: the "send a request, get status + body" boundary,
//!   with a `reqwest` implementation in [`ReqwestTransport`]
//! - [`TransportError`]: transport failures, of which only timeouts are
//!   retried

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod http;
pub mod retry;

pub use error::*;
pub use http::*;
pub use retry::RetryPolicy;
