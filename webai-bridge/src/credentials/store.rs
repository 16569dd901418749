//! In-memory holder of the current credential set.
//!
//! Persisting rotated cookies across restarts is out of scope; the config
//! file stays the source for a fresh process.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::types::CredentialSet;

/// Single source of truth for the [`CredentialSet`].
///
/// Reads hand out an `Arc` snapshot and never wait on I/O. Writes are
/// serialized by the lock; the last writer wins.
#[derive(Debug)]
pub struct CredentialStore {
    current: RwLock<Arc<CredentialSet>>,
}

impl CredentialStore {
    pub fn new(initial: CredentialSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Current credential set.
    pub fn get(&self) -> Arc<CredentialSet> {
        Arc::clone(&self.current.read())
    }

    /// Replace only the rotation token. Empty or unchanged values are ignored.
    pub fn update(&self, rotation_token: &str) {
        let rotation_token = rotation_token.trim();
        if rotation_token.is_empty() {
            debug!("Ignoring empty rotation token");
            return;
        }

        let mut current = self.current.write();
        if current.rotation_token() == rotation_token {
            return;
        }
        *current = Arc::new(current.with_rotation_token(rotation_token));
        debug!("Rotation token updated");
    }

    /// Replace the whole set, e.g. after a configuration reload.
    ///
    /// Returns `true` if the secrets changed.
    pub fn replace(&self, credentials: CredentialSet) -> bool {
        let mut current = self.current.write();
        let changed = !current.same_secrets(&credentials);
        *current = Arc::new(credentials);
        if changed {
            info!("Credential set replaced");
        }
        changed
    }
}
