//! Wire schema spoken across the isolation boundary.
//!
//! Only these types cross the boundary: the caller sends [`Request`]s, the
//! domain answers with [`Reply`]s. While an `Invoke` is in flight the domain
//! may interleave `Trace`, `ServiceCall` and `WebRequest` replies; each
//! `ServiceCall` is answered with exactly one `ServiceReply` request and each
//! `WebRequest` with exactly one `WebReply`.

use crate::{ExecutionError, HostError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use stepkit_config::HandlerConfig;
use stepkit_model::{ServiceFault, WebError};
use stepkit_types::{EntityRecord, ImageSet, InvocationDescriptor, RecordId};

/// Everything the handler body needs for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    pub descriptor: InvocationDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EntityRecord>,
    #[serde(default)]
    pub pre_images: ImageSet,
    #[serde(default)]
    pub post_images: ImageSet,
    #[serde(default)]
    pub input_parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HandlerConfig>,
}

/// Outcome of the handler body, already classified.
pub type Outcome = Result<(), ExecutionError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "kebab-case")]
pub enum Request {
    Instantiate { unsecure: String, secure: String },
    Invoke(Box<InvocationEnvelope>),
    ServiceReply(ServiceReply),
    WebReply(WebReply),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "kebab-case")]
pub enum Reply {
    /// First frame a domain sends once it is ready to serve requests.
    Ready,
    Instantiated,
    Trace(String),
    ServiceCall(ServiceCall),
    /// URL the handler asked the host to fetch.
    WebRequest(String),
    Completed(Outcome),
    Fault(DomainFault),
}

/// An entity-service call made by handler code inside the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ServiceCall {
    Create {
        record: EntityRecord,
    },
    Retrieve {
        logical_name: String,
        id: RecordId,
        columns: Vec<String>,
    },
    Update {
        record: EntityRecord,
    },
    Delete {
        logical_name: String,
        id: RecordId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceValue {
    Created(RecordId),
    Retrieved(EntityRecord),
    Done,
}

pub type ServiceReply = Result<ServiceValue, ServiceFault>;

/// Response body fetched by the caller, or why it was not.
pub type WebReply = Result<Vec<u8>, WebError>;

/// Failure reported by the domain instead of a regular reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fault", content = "detail", rename_all = "kebab-case")]
pub enum DomainFault {
    AlreadyInstantiated,
    NotInstantiated,
    Panicked(String),
    Unavailable(String),
    Protocol(String),
}

impl From<DomainFault> for HostError {
    fn from(fault: DomainFault) -> Self {
        match fault {
            DomainFault::AlreadyInstantiated => HostError::AlreadyInstantiated,
            DomainFault::NotInstantiated => HostError::NotInstantiated,
            DomainFault::Panicked(message) => HostError::HandlerPanicked(message),
            DomainFault::Unavailable(message) => HostError::SandboxUnavailable(message),
            DomainFault::Protocol(message) => HostError::Protocol(message),
        }
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, HostError> {
    serde_json::to_vec(message).map_err(|e| HostError::Protocol(format!("encode failed: {e}")))
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, HostError> {
    serde_json::from_slice(frame).map_err(|e| HostError::Protocol(format!("decode failed: {e}")))
}
