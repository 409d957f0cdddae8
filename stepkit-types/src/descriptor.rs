//! The per-event invocation descriptor.
//!
//! A descriptor is created by the host for exactly one invocation and is
//! read-only to the core: fields are private and only getters are exposed.

use crate::{CorrelationId, IsolationMode, PrincipalId, Stage};
use serde::{Deserialize, Serialize};

/// Immutable metadata describing what triggered an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationDescriptor {
    message_name: String,
    primary_entity: String,
    correlation_id: CorrelationId,
    initiating_principal: PrincipalId,
    depth: u32,
    stage: Stage,
    in_transaction: bool,
    isolation_mode: IsolationMode,
}

impl InvocationDescriptor {
    /// Starts a descriptor for `message` raised against `primary_entity`.
    pub fn builder(
        message_name: impl Into<String>,
        primary_entity: impl Into<String>,
    ) -> InvocationDescriptorBuilder {
        InvocationDescriptorBuilder {
            inner: InvocationDescriptor {
                message_name: message_name.into(),
                primary_entity: primary_entity.into(),
                correlation_id: CorrelationId::new(),
                initiating_principal: PrincipalId::nil(),
                depth: 1,
                stage: Stage::default(),
                in_transaction: false,
                isolation_mode: IsolationMode::default(),
            },
        }
    }

    pub fn message_name(&self) -> &str {
        &self.message_name
    }

    /// Logical name of the primary entity the message targets.
    pub fn primary_entity(&self) -> &str {
        &self.primary_entity
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn initiating_principal(&self) -> PrincipalId {
        self.initiating_principal
    }

    /// Nesting depth of the triggering call chain (1 for a top-level call).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn isolation_mode(&self) -> IsolationMode {
        self.isolation_mode
    }
}

/// Consuming builder for [`InvocationDescriptor`].
#[derive(Debug, Clone)]
pub struct InvocationDescriptorBuilder {
    inner: InvocationDescriptor,
}

impl InvocationDescriptorBuilder {
    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.inner.correlation_id = id;
        self
    }

    pub fn initiating_principal(mut self, id: PrincipalId) -> Self {
        self.inner.initiating_principal = id;
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.inner.depth = depth;
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.inner.stage = stage;
        self
    }

    pub fn in_transaction(mut self, in_transaction: bool) -> Self {
        self.inner.in_transaction = in_transaction;
        self
    }

    pub fn isolation_mode(mut self, mode: IsolationMode) -> Self {
        self.inner.isolation_mode = mode;
        self
    }

    pub fn build(self) -> InvocationDescriptor {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let descriptor = InvocationDescriptor::builder("Create", "account").build();
        assert_eq!(descriptor.message_name(), "Create");
        assert_eq!(descriptor.primary_entity(), "account");
        assert_eq!(descriptor.depth(), 1);
        assert_eq!(descriptor.stage(), Stage::PreOperation);
        assert!(!descriptor.in_transaction());
        assert_eq!(descriptor.initiating_principal(), PrincipalId::nil());
    }

    #[test]
    fn serde_round_trip_preserves_every_field() {
        let descriptor = InvocationDescriptor::builder("Update", "contact")
            .depth(3)
            .stage(Stage::PostOperation)
            .in_transaction(true)
            .isolation_mode(IsolationMode::None)
            .initiating_principal(PrincipalId::new())
            .build();

        let json = serde_json::to_string(&descriptor).unwrap();
        let back: InvocationDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }
}
