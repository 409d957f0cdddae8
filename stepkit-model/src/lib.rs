//! Handler contract and capability declarations for stepkit.
//!
//! Defines what a handler author writes against:
//! - [`Handler`] and [`HandlerContext`]: the body and what it can see per call
//! - [`HandlerError`] and [`ServiceFault`]: tagged failure outcomes
//! - [`EntityService`]: entity store callbacks into the host
//! - [`HandlerDeclaration`] and [`Registration`]: static capability
//!   declarations, normalized by [`resolve`] into [`ResolvedCapabilities`]
//! - [`HandlerType`]: a declaration plus factory with a compute-once
//!   resolution cache

mod declaration;
mod fault;
mod handler;
mod handler_type;
mod permission;
mod resolver;
mod service;

pub use declaration::{
    CapabilityRegistration, ConfigPolicy, HandlerDeclaration, HandlerDeclarationBuilder,
    ImageKind, ImageRequirement, MessageName, Registration, WILDCARD_ENTITY,
};
pub use fault::{HandlerError, ServiceFault};
pub use handler::{Handler, HandlerContext, input_parameter_as};
pub use handler_type::{HandlerFactory, HandlerType};
pub use permission::{GrantError, Permission, TrustLevel, WebError};
pub use resolver::{DuplicateRegistrationError, ResolvedCapabilities, resolve};
pub use service::EntityService;
