//! Session and refresh lifecycle.
//!
//! [`SessionClient`] owns the one live [`Session`], tracks its
//! [`SessionHealth`], and is the only path to the upstream.

mod client;
mod error;
mod health;
mod state;
mod tracker;

pub use client::{RefreshOutcome, SessionClient};
pub use error::SessionError;
pub use health::{HealthEvent, SessionHealth};
pub use state::Session;
pub use tracker::{FailureInfo, RefreshFailureTracker};
