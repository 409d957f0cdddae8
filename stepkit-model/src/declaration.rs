//! Static capability declarations.
//!
//! A handler type states up front which (message, entity) pairs it handles
//! and how its configuration is encoded. Declarations are plain values built
//! at startup; [`crate::resolve`] normalizes and checks them.

use crate::TrustLevel;
use serde::{Deserialize, Serialize};
use stepkit_config::ConfigFormat;
use stepkit_types::{ExecutionMode, IsolationMode, Stage, WellKnownMessage};

/// Entity name matching every entity.
pub const WILDCARD_ENTITY: &str = "*";

/// How a handler's configuration strings are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPolicy {
    pub format: ConfigFormat,
    /// Decode the configuration before every invocation.
    pub autoload: bool,
    /// Turn a successful run into a forced abort (used to test rollback paths).
    pub force_error_on_completion: bool,
}

impl Default for ConfigPolicy {
    fn default() -> Self {
        Self {
            format: ConfigFormat::Json,
            autoload: true,
            force_error_on_completion: false,
        }
    }
}

/// Message a registration subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageName {
    WellKnown(WellKnownMessage),
    Custom(String),
}

impl MessageName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::WellKnown(message) => message.as_str(),
            Self::Custom(name) => name,
        }
    }
}

/// Which snapshot an image requirement asks the host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageKind {
    Pre,
    Post,
    Both,
}

/// A named pre/post snapshot a registration needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequirement {
    pub name: String,
    pub kind: ImageKind,
    /// Attributes to capture; empty captures every attribute.
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// One declared step, before normalization.
///
/// Two shapes exist: [`Registration::message`] for well-known messages and
/// [`Registration::custom`] for free-form message names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    message: MessageName,
    entity: String,
    name: String,
    friendly_name: Option<String>,
    description: Option<String>,
    stage: Stage,
    execution_mode: ExecutionMode,
    isolation_mode: IsolationMode,
    filtering_attributes: Vec<String>,
    images: Vec<ImageRequirement>,
    priority: i32,
    delete_async_operation: bool,
    unsecure_config: Option<String>,
    secure_config: Option<String>,
}

impl Registration {
    /// A step for a well-known message.
    pub fn message(
        message: WellKnownMessage,
        entity: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::with_message(MessageName::WellKnown(message), entity.into(), name.into())
    }

    /// A step for a free-form message name.
    pub fn custom(message: &str, entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_message(
            MessageName::Custom(message.to_string()),
            entity.into(),
            name.into(),
        )
    }

    fn with_message(message: MessageName, entity: String, name: String) -> Self {
        Self {
            message,
            entity,
            name,
            friendly_name: None,
            description: None,
            stage: Stage::default(),
            execution_mode: ExecutionMode::default(),
            isolation_mode: IsolationMode::default(),
            filtering_attributes: Vec::new(),
            images: Vec::new(),
            priority: 1,
            delete_async_operation: false,
            unsecure_config: None,
            secure_config: None,
        }
    }

    pub fn friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = Some(friendly_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn isolation_mode(mut self, mode: IsolationMode) -> Self {
        self.isolation_mode = mode;
        self
    }

    /// Comma-separated list, as hosts usually store it.
    pub fn filtering_attributes(mut self, attributes: &str) -> Self {
        self.filtering_attributes = split_list(attributes);
        self
    }

    pub fn image(mut self, kind: ImageKind, name: impl Into<String>, attributes: &str) -> Self {
        self.images.push(ImageRequirement {
            name: name.into(),
            kind,
            attributes: split_list(attributes),
        });
        self
    }

    pub fn pre_image(self, name: impl Into<String>, attributes: &str) -> Self {
        self.image(ImageKind::Pre, name, attributes)
    }

    pub fn post_image(self, name: impl Into<String>, attributes: &str) -> Self {
        self.image(ImageKind::Post, name, attributes)
    }

    /// Execution order among steps on the same message and stage.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn delete_async_operation(mut self, delete: bool) -> Self {
        self.delete_async_operation = delete;
        self
    }

    pub fn unsecure_config(mut self, config: impl Into<String>) -> Self {
        self.unsecure_config = Some(config.into());
        self
    }

    pub fn secure_config(mut self, config: impl Into<String>) -> Self {
        self.secure_config = Some(config.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn normalize(self) -> CapabilityRegistration {
        let entity = match self.entity.trim() {
            "" | WILDCARD_ENTITY => WILDCARD_ENTITY.to_string(),
            entity => entity.to_string(),
        };
        let trust_level = match self.isolation_mode {
            IsolationMode::Sandbox => TrustLevel::Partial,
            IsolationMode::None => TrustLevel::Full,
        };
        CapabilityRegistration {
            friendly_name: self.friendly_name.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            description: self.description.unwrap_or_default(),
            message: self.message,
            entity,
            stage: self.stage,
            execution_mode: self.execution_mode,
            isolation_mode: self.isolation_mode,
            trust_level,
            filtering_attributes: self.filtering_attributes,
            images: self.images,
            priority: self.priority,
            delete_async_operation: self.delete_async_operation,
            unsecure_config: self.unsecure_config,
            secure_config: self.secure_config,
        }
    }
}

/// A normalized, validated registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRegistration {
    pub name: String,
    pub friendly_name: String,
    pub description: String,
    pub message: MessageName,
    /// Entity logical name, or [`WILDCARD_ENTITY`].
    pub entity: String,
    pub stage: Stage,
    pub execution_mode: ExecutionMode,
    pub isolation_mode: IsolationMode,
    pub trust_level: TrustLevel,
    pub filtering_attributes: Vec<String>,
    pub images: Vec<ImageRequirement>,
    pub priority: i32,
    pub delete_async_operation: bool,
    pub unsecure_config: Option<String>,
    pub secure_config: Option<String>,
}

impl CapabilityRegistration {
    pub fn is_wildcard(&self) -> bool {
        self.entity == WILDCARD_ENTITY
    }

    pub fn matches_entity(&self, entity: &str) -> bool {
        self.is_wildcard() || self.entity.eq_ignore_ascii_case(entity)
    }

    pub fn matches_message(&self, message: &str) -> bool {
        self.message.as_str().eq_ignore_ascii_case(message)
    }
}

/// Everything a handler type declares about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDeclaration {
    name: String,
    display_name: Option<String>,
    config: ConfigPolicy,
    registrations: Vec<Registration>,
}

impl HandlerDeclaration {
    pub fn builder(name: impl Into<String>) -> HandlerDeclarationBuilder {
        HandlerDeclarationBuilder {
            inner: HandlerDeclaration {
                name: name.into(),
                display_name: None,
                config: ConfigPolicy::default(),
                registrations: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in trace lines and error messages.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn config(&self) -> ConfigPolicy {
        self.config
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }
}

/// Consuming builder for [`HandlerDeclaration`].
#[derive(Debug, Clone)]
pub struct HandlerDeclarationBuilder {
    inner: HandlerDeclaration,
}

impl HandlerDeclarationBuilder {
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.inner.display_name = Some(display_name.into());
        self
    }

    pub fn configuration(mut self, config: ConfigPolicy) -> Self {
        self.inner.config = config;
        self
    }

    pub fn register(mut self, registration: Registration) -> Self {
        self.inner.registrations.push(registration);
        self
    }

    pub fn build(self) -> HandlerDeclaration {
        self.inner
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
