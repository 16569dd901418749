//! webai-bridge library crate.
//!
//! A REST bridge over a cookie-authenticated web AI session. The
//! [`session::SessionClient`] owns the upstream session,
//! [`scheduler::RefreshScheduler`] keeps it fresh, and
//! [`translator::RequestTranslator`] turns REST requests into upstream calls.

pub mod api;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod translator;
pub mod upstream;

pub use error::{Error, Result};
