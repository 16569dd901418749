//! Credential holding.
//!
//! - [`CredentialSet`]: the three session cookies plus the refresh interval
//! - [`CredentialStore`]: the current set, with rotation-token updates

mod store;
mod types;

pub use store::CredentialStore;
pub use types::{CredentialSet, DEFAULT_REFRESH_INTERVAL_MINUTES, MaskedCredentials};
