//! Handler containers: one configured handler instance, placed either in
//! the caller's context or inside an isolation domain, behind the
//! execution contract.

use crate::context::{HostContext, LocalContext};
use crate::error::{Error, HostError};
use crate::executor::{self, Body, run_body_guarded};
use crate::grant::CapabilityGrant;
use crate::policy::PolicyEngine;
use crate::protocol::{InvocationEnvelope, Outcome};
use crate::sandbox::{DomainOptions, HandlerHandle, IsolationDomain};
use crate::trace::TraceSink;
use crate::web::GrantedWebClient;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use stepkit_config::{ConfigError, ConfigFormat, HandlerConfig};
use stepkit_model::{
    DuplicateRegistrationError, EntityService, Handler, HandlerType, ResolvedCapabilities,
};
use stepkit_types::IsolationMode;
use tracing::info;

/// A handler type bound to its two configuration strings.
#[derive(Debug)]
pub struct HandlerInstance {
    handler_type: HandlerType,
    unsecure: String,
    secure: String,
    config: RwLock<Option<Arc<HandlerConfig>>>,
}

impl HandlerInstance {
    pub fn new(
        handler_type: HandlerType,
        unsecure: impl Into<String>,
        secure: impl Into<String>,
    ) -> Self {
        Self {
            handler_type,
            unsecure: unsecure.into(),
            secure: secure.into(),
            config: RwLock::new(None),
        }
    }

    pub fn handler_type(&self) -> &HandlerType {
        &self.handler_type
    }

    pub fn unsecure_config(&self) -> &str {
        &self.unsecure
    }

    pub fn secure_config(&self) -> &str {
        &self.secure
    }

    /// The string configuration is decoded from: the secure string unless
    /// it is empty, else the unsecure one.
    pub fn config_string(&self) -> &str {
        if self.secure.is_empty() {
            &self.unsecure
        } else {
            &self.secure
        }
    }

    pub fn capabilities(&self) -> Result<&ResolvedCapabilities, DuplicateRegistrationError> {
        self.handler_type.capabilities()
    }

    /// Decodes the configuration string and replaces the loaded configuration.
    ///
    /// `format` overrides the declared format.
    pub fn load_config(
        &self,
        format: Option<ConfigFormat>,
    ) -> Result<Arc<HandlerConfig>, ConfigError> {
        let format = format.unwrap_or_else(|| self.handler_type.declaration().config().format);
        let config = Arc::new(stepkit_config::parse(Some(self.config_string()), format)?);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&config));
        Ok(config)
    }

    /// The configuration from the last successful load, if any.
    pub fn loaded_config(&self) -> Option<Arc<HandlerConfig>> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loaded configuration, decoding it with the declared format on first use.
    pub(crate) fn autoload(&self) -> Result<Arc<HandlerConfig>, ConfigError> {
        match self.loaded_config() {
            Some(config) => Ok(config),
            None => self.load_config(None),
        }
    }
}

enum Placement {
    Direct {
        handler: Box<dyn Handler>,
        grant: CapabilityGrant,
    },
    Isolated {
        domain: IsolationDomain,
        handle: HandlerHandle,
    },
}

/// Hosts one handler instance and runs invocations against it.
pub struct HandlerContainer {
    instance: HandlerInstance,
    placement: Placement,
    mirror_trace: bool,
}

impl HandlerContainer {
    /// Places the handler in a domain when any of its registrations asks for
    /// sandbox isolation, otherwise directly in the caller's context.
    pub fn new(
        handler_type: HandlerType,
        unsecure: impl Into<String>,
        secure: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::with_policy(handler_type, unsecure, secure, &PolicyEngine::default())
    }

    /// Like [`new`](Self::new), with host policy applied on top: handler
    /// allowlists, forced isolation, boundary choice and revoked permissions.
    pub fn with_policy(
        handler_type: HandlerType,
        unsecure: impl Into<String>,
        secure: impl Into<String>,
        policy: &PolicyEngine,
    ) -> Result<Self, Error> {
        if !policy.is_handler_allowed(handler_type.name()) {
            return Err(HostError::PolicyDenied(format!(
                "handler '{}' blocked by policy",
                handler_type.name()
            ))
            .into());
        }

        let declared = if handler_type.capabilities()?.requires_isolation() {
            IsolationMode::Sandbox
        } else {
            IsolationMode::None
        };
        let mode = policy.forced_isolation().unwrap_or(declared);
        Self::place(
            HandlerInstance::new(handler_type, unsecure, secure),
            mode,
            policy,
        )
    }

    /// Places the handler according to `mode`, ignoring the isolation its
    /// registrations ask for. Duplicate registrations are still rejected.
    pub fn with_mode(
        handler_type: HandlerType,
        mode: IsolationMode,
        unsecure: impl Into<String>,
        secure: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::place(
            HandlerInstance::new(handler_type, unsecure, secure),
            mode,
            &PolicyEngine::default(),
        )
    }

    /// Instantiates the handler in the caller's context with full trust.
    pub fn direct(
        handler_type: HandlerType,
        unsecure: impl Into<String>,
        secure: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::with_mode(handler_type, IsolationMode::None, unsecure, secure)
    }

    fn place(
        instance: HandlerInstance,
        mode: IsolationMode,
        policy: &PolicyEngine,
    ) -> Result<Self, Error> {
        let handler_type = instance.handler_type();
        handler_type.capabilities()?;
        let placement = match mode {
            IsolationMode::None => {
                let handler = panic::catch_unwind(AssertUnwindSafe(|| {
                    handler_type.instantiate(&instance.unsecure, &instance.secure)
                }))
                .map_err(|payload| {
                    HostError::HandlerPanicked(executor::panic_message(payload.as_ref()))
                })?;
                Placement::Direct {
                    handler,
                    grant: policy.restrict(CapabilityGrant::full_trust()),
                }
            }
            IsolationMode::Sandbox => {
                let domain = IsolationDomain::create(
                    handler_type,
                    DomainOptions {
                        boundary: policy.boundary(),
                        grant: policy.restrict(CapabilityGrant::sandbox()),
                    },
                )?;
                let handle = domain.instantiate(&instance.unsecure, &instance.secure)?;
                Placement::Isolated { domain, handle }
            }
        };

        info!(handler = %handler_type.display_name(), mode = ?mode, "Handler container ready");
        Ok(Self {
            instance,
            placement,
            mirror_trace: policy.mirror_trace(),
        })
    }

    pub fn instance(&self) -> &HandlerInstance {
        &self.instance
    }

    pub fn mode(&self) -> IsolationMode {
        match self.placement {
            Placement::Direct { .. } => IsolationMode::None,
            Placement::Isolated { .. } => IsolationMode::Sandbox,
        }
    }

    pub fn is_isolated(&self) -> bool {
        self.mode() == IsolationMode::Sandbox
    }

    pub fn domain(&self) -> Option<&IsolationDomain> {
        match &self.placement {
            Placement::Isolated { domain, .. } => Some(domain),
            Placement::Direct { .. } => None,
        }
    }

    /// The grant the handler body runs under.
    pub fn grant(&self) -> &CapabilityGrant {
        match &self.placement {
            Placement::Direct { grant, .. } => grant,
            Placement::Isolated { domain, .. } => domain.grant(),
        }
    }

    /// Runs one invocation through the execution contract.
    pub fn execute(&self, host: Option<&HostContext<'_>>) -> Result<(), Error> {
        executor::execute(&self.instance, self, host, self.mirror_trace)
    }

    /// Releases the isolation domain, if any. Later invocations fail with
    /// [`HostError::DomainDisposed`].
    pub fn dispose(&self) {
        if let Placement::Isolated { domain, .. } = &self.placement {
            domain.dispose();
        }
    }
}

impl Body for HandlerContainer {
    fn run(
        &self,
        envelope: InvocationEnvelope,
        trace: &dyn TraceSink,
        service: &dyn EntityService,
    ) -> Result<Outcome, HostError> {
        match &self.placement {
            Placement::Direct { handler, grant } => {
                let web = GrantedWebClient::new(grant);
                let context = LocalContext::new(&envelope, trace, service, &web, grant);
                run_body_guarded(
                    handler.as_ref(),
                    &context,
                    self.instance.handler_type().display_name(),
                )
                .map_err(HostError::HandlerPanicked)
            }
            Placement::Isolated { domain, handle } => {
                domain.invoke(handle, envelope, trace, service)
            }
        }
    }
}

impl std::fmt::Debug for HandlerContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContainer")
            .field("handler", &self.instance.handler_type().name())
            .field("mode", &self.mode())
            .finish()
    }
}
