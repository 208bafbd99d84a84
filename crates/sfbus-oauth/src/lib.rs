//! sfbus OAuth - session management for the platform-event client
//!
//! - **Password grant**: [`Credentials`] builds the token request
//! - **Session lifecycle**: [`TokenManager`] moves between
//!   [`SessionState::NoSession`], [`SessionState::Valid`] and
//!   [`SessionState::Invalidated`]
//! - **Single flight**: concurrent callers share one authentication request
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sfbus_core::ReqwestTransport;
//! use sfbus_oauth::{Credentials, TokenManager};
//!
//! let http = Arc::new(ReqwestTransport::new(Duration::from_secs(30))?);
//! let tokens = Arc::new(TokenManager::new(
//!     http,
//!     Credentials::new("login.salesforce.com", id, secret, user, password),
//! ));
//!
//! let session = tokens.valid_session().await?;
//! // after a 401:
//! tokens.invalidate();
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod credentials;
mod error;
mod manager;
mod session;

pub use credentials::*;
pub use error::*;
pub use manager::*;
pub use session::*;
