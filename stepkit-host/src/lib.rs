//! Handler host for stepkit.
//!
//! Runs third-party handlers against domain events:
//! - [`HandlerContainer`] wraps every invocation in the execution contract
//!   (trace entry/exit, configuration autoload, dispatch validation,
//!   failure classification)
//! - [`IsolationDomain`] constructs and invokes a handler inside a forked,
//!   seccomp-filtered child process or a dedicated thread, with a minimal
//!   [`CapabilityGrant`]
//! - [`PolicyEngine`] applies admin-managed restrictions from
//!   `~/.stepkit/policy.toml`

mod container;
mod context;
mod error;
mod executor;
mod grant;
mod logging;
pub mod messages;
mod policy;
pub mod protocol;
mod sandbox;
mod trace;
pub mod transport;
mod validator;
mod web;

pub use container::{HandlerContainer, HandlerInstance};
pub use context::{HostContext, LocalContext};
pub use error::{Error, ExecutionError, FaultCause, HostError};
pub use executor::run_body;
pub use grant::CapabilityGrant;
pub use logging::init_tracing;
pub use policy::{PolicyConfig, PolicyEngine, PolicyMode};
pub use protocol::{InvocationEnvelope, Outcome};
pub use sandbox::{BoundaryKind, DomainOptions, HandlerHandle, IsolationDomain, LoaderSettings};
pub use trace::{LogTraceSink, MemoryTraceSink, TraceSink, Tracer};
pub use validator::{DispatchRejection, validate};
pub use web::{GrantedWebClient, MAX_RESPONSE_BYTES, WebClient};
