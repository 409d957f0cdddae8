//! Error types for the handler host.

use crate::messages;
use serde::{Deserialize, Serialize};
use stepkit_config::ConfigFormat;
use stepkit_model::{DuplicateRegistrationError, ServiceFault};
use thiserror::Error;

/// Terminal outcome of one handler execution.
///
/// Serializable because body outcomes are produced inside the isolation
/// domain and shipped back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExecutionError {
    #[error("{}", messages::no_service_provider(.handler))]
    NoServiceProvider { handler: String },

    #[error("{}", messages::invalid_entity(.entity, .handler))]
    InvalidEntity { entity: String, handler: String },

    #[error("{}", messages::invalid_message_name(.message, .handler))]
    InvalidMessageName { message: String, handler: String },

    #[error("{}", messages::invalid_message_entity_combination(.message, .entity, .handler))]
    InvalidMessageEntityCombination {
        message: String,
        entity: String,
        handler: String,
    },

    #[error("{}", messages::duplicate_registration_names(.names))]
    DuplicateRegistration { names: Vec<String> },

    /// Only ever traced; execution continues without configuration.
    #[error("{}", messages::error_loading_config(.message))]
    ConfigDeserialization { format: ConfigFormat, message: String },

    /// A fault raised by the entity service, passed through unmodified.
    #[error("{fault}")]
    RemoteServiceFault {
        #[source]
        fault: ServiceFault,
    },

    /// A terminal error the handler raised on purpose.
    #[error("{message}")]
    HandlerAborted { message: String },

    #[error("{}", messages::forced_abort(.handler))]
    ForcedAbort { handler: String },

    #[error("{}", messages::organization_service_fault(.handler))]
    UnclassifiedHandlerFault {
        handler: String,
        #[source]
        cause: FaultCause,
    },
}

impl From<DuplicateRegistrationError> for ExecutionError {
    fn from(err: DuplicateRegistrationError) -> Self {
        Self::DuplicateRegistration { names: err.names }
    }
}

/// A serializable snapshot of an error chain, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct FaultCause {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[source]
    pub source: Option<Box<FaultCause>>,
}

impl FaultCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Captures `error` and every error in its source chain.
    pub fn capture(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut messages = Vec::new();
        let mut current = Some(error);
        while let Some(error) = current {
            messages.push(error.to_string());
            current = error.source();
        }

        messages
            .into_iter()
            .rev()
            .fold(None, |source, message| {
                Some(FaultCause {
                    message,
                    source: source.map(Box::new),
                })
            })
            .unwrap_or_else(|| FaultCause::new(String::new()))
    }

    pub fn chain(&self) -> impl Iterator<Item = &FaultCause> {
        std::iter::successors(Some(self), |cause| cause.source.as_deref())
    }
}

/// Failures of the isolation boundary and the host around it.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("isolation domain has been disposed")]
    DomainDisposed,

    #[error("a handler is already instantiated in this isolation domain")]
    AlreadyInstantiated,

    #[error("no handler is instantiated in this isolation domain")]
    NotInstantiated,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),
}

/// Any failure surfaced by [`crate::HandlerContainer`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl Error {
    pub fn as_execution(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(err) => Some(err),
            Self::Host(_) => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostError> {
        match self {
            Self::Host(err) => Some(err),
            Self::Execution(_) => None,
        }
    }
}

impl From<DuplicateRegistrationError> for Error {
    fn from(err: DuplicateRegistrationError) -> Self {
        Self::Execution(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_cause_captures_the_whole_chain() {
        let error = anyhow::anyhow!("root cause").context("middle").context("outer");
        let cause = FaultCause::capture(error.as_ref());
        let messages: Vec<&str> = cause.chain().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["outer", "middle", "root cause"]);
    }

    #[test]
    fn unclassified_fault_exposes_its_cause() {
        let err = ExecutionError::UnclassifiedHandlerFault {
            handler: "Plugin".to_string(),
            cause: FaultCause::new("boom"),
        };
        assert_eq!(
            err.to_string(),
            "There was an organization service fault.  Plugin is unable to execute successfully."
        );
        assert_eq!(std::error::Error::source(&err).unwrap().to_string(), "boom");
    }

    #[test]
    fn execution_errors_round_trip_through_json() {
        let err = ExecutionError::RemoteServiceFault {
            fault: ServiceFault::new(42, "denied").with_detail("entity", "account"),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"remote-service-fault\""));
        let back: ExecutionError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
