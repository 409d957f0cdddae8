//! Per-invocation contexts.
//!
//! [`HostContext`] is what the host hands to [`crate::HandlerContainer::execute`];
//! [`LocalContext`] is what the handler body sees, wherever it runs.

use crate::grant::CapabilityGrant;
use crate::protocol::InvocationEnvelope;
use crate::trace::{TraceSink, Tracer};
use crate::web::WebClient;
use serde_json::Value;
use std::collections::BTreeMap;
use stepkit_config::HandlerConfig;
use stepkit_model::{
    EntityService, GrantError, HandlerContext, Permission, ServiceFault, WebError,
};
use stepkit_types::{EntityRecord, ImageSet, InvocationDescriptor};

/// The execution context a host supplies for one event.
pub struct HostContext<'a> {
    descriptor: InvocationDescriptor,
    target: Option<EntityRecord>,
    pre_images: ImageSet,
    post_images: ImageSet,
    input_parameters: BTreeMap<String, Value>,
    trace: &'a dyn TraceSink,
    service: &'a dyn EntityService,
}

impl<'a> HostContext<'a> {
    pub fn new(
        descriptor: InvocationDescriptor,
        trace: &'a dyn TraceSink,
        service: &'a dyn EntityService,
    ) -> Self {
        Self {
            descriptor,
            target: None,
            pre_images: ImageSet::new(),
            post_images: ImageSet::new(),
            input_parameters: BTreeMap::new(),
            trace,
            service,
        }
    }

    pub fn with_target(mut self, target: EntityRecord) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_pre_image(mut self, name: impl Into<String>, image: EntityRecord) -> Self {
        self.pre_images.insert(name, image);
        self
    }

    pub fn with_post_image(mut self, name: impl Into<String>, image: EntityRecord) -> Self {
        self.post_images.insert(name, image);
        self
    }

    pub fn with_input_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input_parameters.insert(name.into(), value.into());
        self
    }

    pub fn descriptor(&self) -> &InvocationDescriptor {
        &self.descriptor
    }

    pub fn trace_sink(&self) -> &'a dyn TraceSink {
        self.trace
    }

    pub fn service(&self) -> &'a dyn EntityService {
        self.service
    }

    /// Snapshot of the invocation data, ready to cross the boundary.
    pub(crate) fn envelope(&self, config: Option<HandlerConfig>) -> InvocationEnvelope {
        InvocationEnvelope {
            descriptor: self.descriptor.clone(),
            target: self.target.clone(),
            pre_images: self.pre_images.clone(),
            post_images: self.post_images.clone(),
            input_parameters: self.input_parameters.clone(),
            config,
        }
    }
}

/// The context a handler body executes against.
pub struct LocalContext<'a> {
    envelope: &'a InvocationEnvelope,
    tracer: Tracer<'a>,
    service: &'a dyn EntityService,
    web: &'a dyn WebClient,
    grant: &'a CapabilityGrant,
}

impl<'a> LocalContext<'a> {
    pub fn new(
        envelope: &'a InvocationEnvelope,
        trace: &'a dyn TraceSink,
        service: &'a dyn EntityService,
        web: &'a dyn WebClient,
        grant: &'a CapabilityGrant,
    ) -> Self {
        Self {
            envelope,
            tracer: Tracer::new(trace, &envelope.descriptor),
            service,
            web,
            grant,
        }
    }

    pub fn grant(&self) -> &CapabilityGrant {
        self.grant
    }

    pub fn tracer(&self) -> &Tracer<'a> {
        &self.tracer
    }

    pub fn input_parameters(&self) -> &BTreeMap<String, Value> {
        &self.envelope.input_parameters
    }
}

impl HandlerContext for LocalContext<'_> {
    fn descriptor(&self) -> &InvocationDescriptor {
        &self.envelope.descriptor
    }

    fn config(&self) -> Option<&HandlerConfig> {
        self.envelope.config.as_ref()
    }

    fn target(&self) -> Option<&EntityRecord> {
        self.envelope.target.as_ref()
    }

    fn pre_images(&self) -> &ImageSet {
        &self.envelope.pre_images
    }

    fn post_images(&self) -> &ImageSet {
        &self.envelope.post_images
    }

    fn input_parameter(&self, name: &str) -> Option<&Value> {
        self.envelope.input_parameters.get(name)
    }

    fn service(&self) -> &dyn EntityService {
        self.service
    }

    fn trace(&self, message: &str) {
        self.tracer.trace(message);
    }

    fn trace_fault(&self, fault: &ServiceFault) {
        self.tracer.trace_fault(fault);
    }

    fn demand(&self, permission: Permission) -> Result<(), GrantError> {
        self.grant.demand(permission)
    }

    fn authorize_web_request(&self, url: &str) -> Result<(), GrantError> {
        self.grant.authorize_web_request(url)
    }

    fn fetch_url(&self, url: &str) -> Result<Vec<u8>, WebError> {
        self.web.fetch(url)
    }
}
