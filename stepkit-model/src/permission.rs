//! Permissions a handler may demand from its isolation grant.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Individual capability an isolation grant may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    // Granted inside the sandbox
    Serialization,
    Execution,
    RestrictedMemberAccess,
    WebAccess,

    // Full trust only
    FileIo,
    NetworkInformation,
    Environment,
    Registry,
    EventLog,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Self::Serialization,
        Self::Execution,
        Self::RestrictedMemberAccess,
        Self::WebAccess,
        Self::FileIo,
        Self::NetworkInformation,
        Self::Environment,
        Self::Registry,
        Self::EventLog,
    ];

    /// Policy-file name of this permission.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Serialization => "serialization",
            Self::Execution => "execution",
            Self::RestrictedMemberAccess => "restricted-member-access",
            Self::WebAccess => "web-access",
            Self::FileIo => "file-io",
            Self::NetworkInformation => "network-information",
            Self::Environment => "environment",
            Self::Registry => "registry",
            Self::EventLog => "event-log",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trust requested by a registration, derived from its isolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustLevel {
    Partial,
    Full,
}

/// A demand the active grant does not satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantError {
    #[error("permission denied: '{0}' is not granted")]
    PermissionDenied(Permission),

    #[error("web request to '{url}' denied: {reason}")]
    WebRequestDenied { url: String, reason: String },
}

/// Why a web fetch made through the host did not return a body.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebError {
    /// The grant refused the URL or one of its redirect targets.
    #[error(transparent)]
    Denied(#[from] GrantError),

    #[error("web request to '{url}' failed: {reason}")]
    Failed { url: String, reason: String },
}
