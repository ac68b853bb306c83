//! Deployment flow discriminator

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Whether the form is installing a new release or upgrading a deployed one
///
/// Deployed values are only consulted during an upgrade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEvent {
    /// Fresh install
    #[default]
    Install,
    /// Upgrade of an existing release
    Upgrade,
}

impl DeploymentEvent {
    /// Check if this is an upgrade
    #[inline]
    #[must_use]
    pub fn is_upgrade(self) -> bool {
        matches!(self, Self::Upgrade)
    }
}

impl Display for DeploymentEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => f.write_str("install"),
            Self::Upgrade => f.write_str("upgrade"),
        }
    }
}

impl FromStr for DeploymentEvent {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "upgrade" => Ok(Self::Upgrade),
            other => Err(EventError::UnknownEvent(other.to_string())),
        }
    }
}

/// Errors when reading a deployment event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// Event name not recognised
    #[error("unknown deployment event: '{0}'")]
    UnknownEvent(String),
}
