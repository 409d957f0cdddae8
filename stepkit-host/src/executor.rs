//! The execution contract wrapped around every handler invocation.
//!
//! `Entered -> ConfigLoaded -> Validated -> Invoked -> {Succeeded, Failed} -> Exited`
//!
//! The body itself may run in the caller's context or inside an isolation
//! domain; either way it is classified by [`run_body`], so the outcome the
//! caller sees does not depend on where the handler ran.

use crate::container::HandlerInstance;
use crate::context::{HostContext, LocalContext};
use crate::error::{Error, ExecutionError, FaultCause, HostError};
use crate::messages;
use crate::protocol::{InvocationEnvelope, Outcome};
use crate::trace::{MirroredSink, TraceSink, Tracer};
use crate::validator;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use stepkit_config::HandlerConfig;
use stepkit_model::{EntityService, Handler, HandlerContext, HandlerError};
use tracing::{debug, warn};

/// Where a handler body runs.
pub(crate) trait Body {
    fn run(
        &self,
        envelope: InvocationEnvelope,
        trace: &dyn TraceSink,
        service: &dyn EntityService,
    ) -> Result<Outcome, HostError>;
}

/// Invokes `handler` and classifies its failure by tag.
///
/// Every failure first traces the organization-fault line, then the
/// failure itself: service faults as the full cascade, anything else as a
/// single `Exception:` line.
pub fn run_body(handler: &dyn Handler, context: &LocalContext<'_>, handler_name: &str) -> Outcome {
    let error = match handler.execute(context) {
        Ok(()) => return Ok(()),
        Err(error) => error,
    };

    context.trace(&messages::organization_service_fault(handler_name));
    match error {
        HandlerError::Service(fault) => {
            context.trace_fault(&fault);
            Err(ExecutionError::RemoteServiceFault { fault })
        }
        HandlerError::Aborted(message) => {
            context.trace(&format!("Exception: {message}"));
            Err(ExecutionError::HandlerAborted { message })
        }
        HandlerError::Other(error) => {
            context.trace(&format!("Exception: {error:#}"));
            Err(ExecutionError::UnclassifiedHandlerFault {
                handler: handler_name.to_string(),
                cause: FaultCause::capture(error.as_ref()),
            })
        }
    }
}

/// [`run_body`] with handler panics caught and reported as their message.
pub(crate) fn run_body_guarded(
    handler: &dyn Handler,
    context: &LocalContext<'_>,
    handler_name: &str,
) -> Result<Outcome, String> {
    panic::catch_unwind(AssertUnwindSafe(|| run_body(handler, context, handler_name)))
        .map_err(|payload| panic_message(payload.as_ref()))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

/// Runs the full contract for one invocation.
pub(crate) fn execute(
    instance: &HandlerInstance,
    body: &dyn Body,
    host: Option<&HostContext<'_>>,
    mirror_trace: bool,
) -> Result<(), Error> {
    let handler = instance.handler_type().display_name();

    let Some(host) = host else {
        warn!(handler = %handler, "Invocation arrived without an execution context");
        return Err(ExecutionError::NoServiceProvider {
            handler: handler.to_string(),
        }
        .into());
    };

    let mirrored = MirroredSink {
        inner: host.trace_sink(),
    };
    let sink: &dyn TraceSink = if mirror_trace {
        &mirrored
    } else {
        host.trace_sink()
    };
    let tracer = Tracer::new(sink, host.descriptor());

    debug!(
        handler = %handler,
        message = %host.descriptor().message_name(),
        entity = %host.descriptor().primary_entity(),
        "Executing handler"
    );

    tracer.trace(&messages::entering(handler));
    let result = run_stages(instance, body, host, sink, &tracer);
    tracer.trace(&messages::exiting(handler));

    if let Err(error) = &result {
        warn!(handler = %handler, error = %error, "Handler execution failed");
    }
    result
}

fn run_stages(
    instance: &HandlerInstance,
    body: &dyn Body,
    host: &HostContext<'_>,
    sink: &dyn TraceSink,
    tracer: &Tracer<'_>,
) -> Result<(), Error> {
    let capabilities = instance.capabilities()?;
    let handler = capabilities.handler();
    let policy = capabilities.config();

    let config = if policy.autoload {
        match instance.autoload() {
            Ok(config) => Some(HandlerConfig::clone(&config)),
            Err(error) => {
                let traced = ExecutionError::ConfigDeserialization {
                    format: error.format().unwrap_or(policy.format),
                    message: error.to_string(),
                };
                warn!(handler = %handler, error = %error, "Configuration failed to load");
                tracer.trace(&traced.to_string());
                None
            }
        }
    } else {
        instance
            .loaded_config()
            .map(|config| HandlerConfig::clone(&config))
    };

    validator::validate(host.descriptor(), capabilities).map_err(ExecutionError::from)?;

    body.run(host.envelope(config), sink, host.service())??;

    if policy.force_error_on_completion {
        let error = ExecutionError::ForcedAbort {
            handler: handler.to_string(),
        };
        tracer.trace(&messages::organization_service_fault(handler));
        tracer.trace(&format!("Exception: {error}"));
        return Err(error.into());
    }

    Ok(())
}
