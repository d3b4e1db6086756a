//! Core transport types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// Created, `start` not yet called.
    #[default]
    Idle,
    /// `start` was called; outbound sends are allowed.
    Started,
    /// Started and the inbound stream is open.
    Active,
    /// Started and waiting to reopen a dropped inbound stream.
    Reconnecting,
    /// Closed; terminal.
    Closed,
}

impl TransportState {
    /// Returns `true` if messages may be sent in this state.
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Started | Self::Active | Self::Reconnecting)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Started => write!(f, "started"),
            Self::Active => write!(f, "active"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
