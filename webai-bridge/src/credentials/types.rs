//! Core credential types.

use std::time::Duration;

use gemini_web::cookies::mask;
use serde::Serialize;
use utoipa::ToSchema;

/// Refresh interval used when the configured one is missing or not positive.
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u32 = 5;

/// The cookie-derived secrets for one upstream account.
///
/// Immutable: every change produces a new value.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    identity_token: String,
    timestamp_token: String,
    rotation_token: String,
    refresh_interval_minutes: u32,
}

impl CredentialSet {
    /// Create a credential set. A `refresh_interval_minutes` that is zero or
    /// negative falls back to [`DEFAULT_REFRESH_INTERVAL_MINUTES`].
    pub fn new(
        identity_token: impl Into<String>,
        timestamp_token: impl Into<String>,
        rotation_token: impl Into<String>,
        refresh_interval_minutes: i64,
    ) -> Self {
        let refresh_interval_minutes = u32::try_from(refresh_interval_minutes)
            .ok()
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_MINUTES);

        Self {
            identity_token: identity_token.into(),
            timestamp_token: timestamp_token.into(),
            rotation_token: rotation_token.into(),
            refresh_interval_minutes,
        }
    }

    #[inline]
    pub fn identity_token(&self) -> &str {
        &self.identity_token
    }

    #[inline]
    pub fn timestamp_token(&self) -> &str {
        &self.timestamp_token
    }

    #[inline]
    pub fn rotation_token(&self) -> &str {
        &self.rotation_token
    }

    #[inline]
    pub fn refresh_interval_minutes(&self) -> u32 {
        self.refresh_interval_minutes
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_interval_minutes) * 60)
    }

    /// Names of the secret fields that are empty.
    pub fn missing_tokens(&self) -> Vec<&'static str> {
        [
            ("identity_token", &self.identity_token),
            ("timestamp_token", &self.timestamp_token),
            ("rotation_token", &self.rotation_token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// All three secrets are present.
    pub fn is_initializable(&self) -> bool {
        self.missing_tokens().is_empty()
    }

    /// Same secrets, ignoring the refresh interval.
    pub fn same_secrets(&self, other: &CredentialSet) -> bool {
        self.identity_token == other.identity_token
            && self.timestamp_token == other.timestamp_token
            && self.rotation_token == other.rotation_token
    }

    /// Copy with a new rotation token; the other fields are preserved.
    pub fn with_rotation_token(&self, rotation_token: impl Into<String>) -> Self {
        Self {
            rotation_token: rotation_token.into(),
            ..self.clone()
        }
    }

    pub fn masked(&self) -> MaskedCredentials {
        MaskedCredentials {
            identity: mask(&self.identity_token),
            timestamp: mask(&self.timestamp_token),
            rotation: mask(&self.rotation_token),
        }
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("identity_token", &mask(&self.identity_token))
            .field("timestamp_token", &mask(&self.timestamp_token))
            .field("rotation_token", &mask(&self.rotation_token))
            .field("refresh_interval_minutes", &self.refresh_interval_minutes)
            .finish()
    }
}

/// Credential values safe to log or return from the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MaskedCredentials {
    pub identity: String,
    pub timestamp: String,
    pub rotation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_interval_defaults() {
        assert_eq!(CredentialSet::new("a", "b", "c", 0).refresh_interval_minutes(), 5);
        assert_eq!(CredentialSet::new("a", "b", "c", -3).refresh_interval_minutes(), 5);
        assert_eq!(CredentialSet::new("a", "b", "c", 12).refresh_interval_minutes(), 12);
        assert_eq!(
            CredentialSet::new("a", "b", "c", 2).refresh_interval(),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_initializable() {
        assert!(CredentialSet::new("a", "b", "c", 5).is_initializable());

        let partial = CredentialSet::new("a", "", " ", 5);
        assert!(!partial.is_initializable());
        assert_eq!(
            partial.missing_tokens(),
            vec!["timestamp_token", "rotation_token"]
        );
    }

    #[test]
    fn test_with_rotation_token_preserves_other_fields() {
        let original = CredentialSet::new("id", "ts", "cc", 7);
        let rotated = original.with_rotation_token("cc2");

        assert_eq!(rotated.identity_token(), "id");
        assert_eq!(rotated.timestamp_token(), "ts");
        assert_eq!(rotated.rotation_token(), "cc2");
        assert_eq!(rotated.refresh_interval_minutes(), 7);
        assert!(!rotated.same_secrets(&original));
    }

    #[test]
    fn test_same_secrets_ignores_interval() {
        let a = CredentialSet::new("id", "ts", "cc", 5);
        let b = CredentialSet::new("id", "ts", "cc", 30);
        assert!(a.same_secrets(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_is_masked() {
        let set = CredentialSet::new("g.a000verysecretidentity", "sidts-verysecret", "cc", 5);
        let debug = format!("{set:?}");
        assert!(!debug.contains("verysecret"));
    }
}
