//! Session health state machine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health of the active upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionHealth {
    /// No handshake has succeeded yet.
    #[default]
    Uninitialized,
    /// Last exchange succeeded.
    Healthy,
    /// A recent exchange failed recoverably; still used.
    Degraded,
    /// The upstream rejected the credentials.
    Expired,
}

/// Something that happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    HandshakeSucceeded,
    CallSucceeded,
    RecoverableFailure,
    UnrecoverableFailure,
}

impl HealthEvent {
    pub const ALL: [HealthEvent; 4] = [
        HealthEvent::HandshakeSucceeded,
        HealthEvent::CallSucceeded,
        HealthEvent::RecoverableFailure,
        HealthEvent::UnrecoverableFailure,
    ];
}

impl SessionHealth {
    pub const ALL: [SessionHealth; 4] = [
        SessionHealth::Uninitialized,
        SessionHealth::Healthy,
        SessionHealth::Degraded,
        SessionHealth::Expired,
    ];

    /// Whether calls may be attempted.
    #[inline]
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    /// Next state for `event`, or `None` when the event does not apply in
    /// this state.
    ///
    /// `Expired -> Healthy` on a handshake is only ever driven with a
    /// different credential set; the client refuses to re-handshake with a
    /// set the upstream already rejected.
    pub fn next(self, event: HealthEvent) -> Option<SessionHealth> {
        use HealthEvent::*;
        use SessionHealth::*;

        match (self, event) {
            (Uninitialized | Degraded | Expired, HandshakeSucceeded) => Some(Healthy),
            (Healthy, HandshakeSucceeded | CallSucceeded) => Some(Healthy),
            (Degraded, CallSucceeded) => Some(Healthy),
            (Healthy | Degraded, RecoverableFailure) => Some(Degraded),
            (Healthy | Degraded, UnrecoverableFailure) => Some(Expired),
            _ => None,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Healthy => 1,
            Self::Degraded => 2,
            Self::Expired => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Healthy,
            2 => Self::Degraded,
            3 => Self::Expired,
            _ => Self::Uninitialized,
        }
    }
}

impl std::fmt::Display for SessionHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionHealth::Uninitialized => write!(f, "uninitialized"),
            SessionHealth::Healthy => write!(f, "healthy"),
            SessionHealth::Degraded => write!(f, "degraded"),
            SessionHealth::Expired => write!(f, "expired"),
        }
    }
}
