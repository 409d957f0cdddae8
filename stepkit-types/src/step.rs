//! Step vocabulary shared by declarations, descriptors and the host.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stage at which a handler step runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    PreValidation,
    #[default]
    PreOperation,
    MainOperation,
    PostOperation,
}

impl Stage {
    /// Numeric stage code used by hosts that number their pipeline.
    pub fn code(self) -> u32 {
        match self {
            Self::PreValidation => 10,
            Self::PreOperation => 20,
            Self::MainOperation => 30,
            Self::PostOperation => 40,
        }
    }
}

/// Whether the step runs inside the triggering operation or after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    #[default]
    Synchronous,
    Asynchronous,
}

/// Where a handler instance is allowed to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// Full trust, in the caller's context.
    None,
    /// Inside a restricted isolation domain.
    #[default]
    Sandbox,
}

impl FromStr for IsolationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(Error::UnknownVariant {
                kind: "isolation mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Messages the host raises for built-in operations.
///
/// Handlers may also register for free-form custom messages; both forms
/// normalize to the message name string returned by [`WellKnownMessage::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellKnownMessage {
    Assign,
    Associate,
    Create,
    Delete,
    Disassociate,
    Merge,
    Retrieve,
    RetrieveMultiple,
    SetState,
    SetStateDynamicEntity,
    Update,
    Upsert,
}

impl WellKnownMessage {
    pub const ALL: [WellKnownMessage; 12] = [
        Self::Assign,
        Self::Associate,
        Self::Create,
        Self::Delete,
        Self::Disassociate,
        Self::Merge,
        Self::Retrieve,
        Self::RetrieveMultiple,
        Self::SetState,
        Self::SetStateDynamicEntity,
        Self::Update,
        Self::Upsert,
    ];

    /// Canonical message name as the host spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "Assign",
            Self::Associate => "Associate",
            Self::Create => "Create",
            Self::Delete => "Delete",
            Self::Disassociate => "Disassociate",
            Self::Merge => "Merge",
            Self::Retrieve => "Retrieve",
            Self::RetrieveMultiple => "RetrieveMultiple",
            Self::SetState => "SetState",
            Self::SetStateDynamicEntity => "SetStateDynamicEntity",
            Self::Update => "Update",
            Self::Upsert => "Upsert",
        }
    }
}

impl fmt::Display for WellKnownMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellKnownMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|message| message.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::UnknownVariant {
                kind: "message",
                value: trimmed.to_string(),
            })
    }
}
