//! Failure shapes a handler body can produce.

use crate::WebError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured fault raised by the entity service.
///
/// Faults nest: `inner` holds the fault that caused this one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ServiceFault {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[source]
    pub inner: Option<Box<ServiceFault>>,
}

impl ServiceFault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_trace_text(mut self, trace_text: impl Into<String>) -> Self {
        self.trace_text = Some(trace_text.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    pub fn with_inner(mut self, inner: ServiceFault) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// This fault followed by its inner faults, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ServiceFault> {
        std::iter::successors(Some(self), |fault| fault.inner.as_deref())
    }
}

/// Outcome tag a handler attaches to its failure.
///
/// The execution contract classifies on this tag alone:
/// - `Service` is rethrown unchanged as a remote service fault
/// - `Aborted` is a deliberate terminal error, surfaced unchanged
/// - `Other` is wrapped as an unclassified handler fault
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Service(#[from] ServiceFault),

    #[error("{0}")]
    Aborted(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<WebError> for HandlerError {
    fn from(err: WebError) -> Self {
        Self::Other(err.into())
    }
}

impl HandlerError {
    /// Terminal, handler-authored error with a user-facing message.
    pub fn abort(message: impl Into<String>) -> Self {
        Self::Aborted(message.into())
    }
}
