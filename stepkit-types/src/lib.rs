//! Core type definitions for stepkit.
//!
//! This crate defines the plugin-agnostic types every other stepkit crate
//! depends on:
//! - Correlation, principal and record identifiers (UUID)
//! - The step vocabulary (stage, execution mode, isolation mode, messages)
//! - The immutable [`InvocationDescriptor`] the host supplies per event
//! - [`EntityRecord`] and [`ImageSet`], the minimal business-data carriers
//!   used for inline targets and pre/post images

mod descriptor;
mod ids;
mod record;
mod step;

pub use descriptor::{InvocationDescriptor, InvocationDescriptorBuilder};
pub use ids::{CorrelationId, PrincipalId, RecordId};
pub use record::{EntityRecord, ImageSet};
pub use step::{ExecutionMode, IsolationMode, Stage, WellKnownMessage};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
