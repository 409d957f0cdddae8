//! Host trace sinks and the line formatting applied to handler traces.

use std::sync::Mutex;
use stepkit_model::ServiceFault;
use stepkit_types::{CorrelationId, InvocationDescriptor, PrincipalId};
use tracing::{debug, info};

/// Receives fully formatted trace lines from handler executions.
pub trait TraceSink {
    fn trace(&self, line: &str);
}

impl<F: Fn(&str)> TraceSink for F {
    fn trace(&self, line: &str) {
        self(line)
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// True when any recorded line starts with `prefix`.
    pub fn has_line_starting_with(&self, prefix: &str) -> bool {
        self.lines().iter().any(|line| line.starts_with(prefix))
    }
}

impl TraceSink for MemoryTraceSink {
    fn trace(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Forwards lines to the process log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn trace(&self, line: &str) {
        info!(target: "stepkit::trace", "{line}");
    }
}

/// Wraps a host sink and mirrors each line to the process log.
pub(crate) struct MirroredSink<'a> {
    pub(crate) inner: &'a dyn TraceSink,
}

impl TraceSink for MirroredSink<'_> {
    fn trace(&self, line: &str) {
        debug!(target: "stepkit::trace", "{line}");
        self.inner.trace(line);
    }
}

/// Formats handler trace calls for one invocation.
///
/// Every line carries the correlation id and initiating principal; blank
/// messages are dropped.
#[derive(Clone, Copy)]
pub struct Tracer<'a> {
    sink: &'a dyn TraceSink,
    correlation_id: CorrelationId,
    initiating_principal: PrincipalId,
}

impl<'a> Tracer<'a> {
    pub fn new(sink: &'a dyn TraceSink, descriptor: &InvocationDescriptor) -> Self {
        Self {
            sink,
            correlation_id: descriptor.correlation_id(),
            initiating_principal: descriptor.initiating_principal(),
        }
    }

    pub fn trace(&self, message: &str) {
        if message.trim().is_empty() {
            return;
        }
        self.sink.trace(&format!(
            "{message}, Correlation Id: {}, Initiating User: {}",
            self.correlation_id, self.initiating_principal
        ));
    }

    /// Writes the cascade for `fault`, then for each inner fault in turn.
    pub fn trace_fault(&self, fault: &ServiceFault) {
        for fault in fault.chain() {
            self.trace(&format!("Exception: {}", fault.message));
            self.trace(&format!("Error Code: {}", fault.code));
            self.trace(&format!("Detail Message: {}", fault.message));

            if let Some(text) = fault.trace_text.as_deref().filter(|text| !text.is_empty()) {
                self.trace("Trace: ");
                self.trace(text);
            }

            if !fault.details.is_empty() {
                self.trace("Error Details: ");
            }
            for (key, value) in &fault.details {
                self.trace(&format!("{key:>20} = {value}"));
            }
        }
    }
}
