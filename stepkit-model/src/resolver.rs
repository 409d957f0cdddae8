//! Normalizes a [`HandlerDeclaration`] into the registration set the
//! dispatch validator checks invocations against.

use crate::{CapabilityRegistration, ConfigPolicy, HandlerDeclaration};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use stepkit_types::IsolationMode;
use thiserror::Error;
use tracing::debug;

/// Two or more registrations of one handler type share a name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Found types with duplicate attributes of the same name(s) {}", .names.join(", "))]
pub struct DuplicateRegistrationError {
    /// Every occurrence after the first of each repeated name, grouped by
    /// the order in which each name first appears.
    pub names: Vec<String>,
}

/// The validated, immutable capability set of one handler type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCapabilities {
    handler: String,
    config: ConfigPolicy,
    registrations: Vec<CapabilityRegistration>,
}

impl ResolvedCapabilities {
    /// Display name of the handler type.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn config(&self) -> ConfigPolicy {
        self.config
    }

    pub fn registrations(&self) -> &[CapabilityRegistration] {
        &self.registrations
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityRegistration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    pub fn is_entity_registered(&self, entity: &str) -> bool {
        self.registrations.iter().any(|r| r.matches_entity(entity))
    }

    pub fn is_message_registered(&self, message: &str) -> bool {
        self.registrations.iter().any(|r| r.matches_message(message))
    }

    pub fn is_message_and_entity_registered(&self, message: &str, entity: &str) -> bool {
        self.registrations
            .iter()
            .any(|r| r.matches_message(message) && r.matches_entity(entity))
    }

    /// True when any registration asks to run inside an isolation domain.
    pub fn requires_isolation(&self) -> bool {
        self.registrations
            .iter()
            .any(|r| r.isolation_mode == IsolationMode::Sandbox)
    }
}

/// Resolves `declaration`, failing on any repeated registration name.
pub fn resolve(
    declaration: &HandlerDeclaration,
) -> Result<ResolvedCapabilities, DuplicateRegistrationError> {
    let duplicates = duplicate_names(declaration);

    if !duplicates.is_empty() {
        return Err(DuplicateRegistrationError { names: duplicates });
    }

    let registrations: Vec<CapabilityRegistration> = declaration
        .registrations()
        .iter()
        .cloned()
        .map(|registration| registration.normalize())
        .collect();

    debug!(
        handler = %declaration.name(),
        registrations = registrations.len(),
        "Resolved handler capabilities"
    );

    Ok(ResolvedCapabilities {
        handler: declaration.display_name().to_string(),
        config: declaration.config(),
        registrations,
    })
}

/// Repeated names grouped by first occurrence: for each name declared `n`
/// times, `n - 1` copies.
fn duplicate_names(declaration: &HandlerDeclaration) -> Vec<String> {
    let mut groups: Vec<(&str, usize)> = Vec::new();
    let mut seen = HashSet::new();
    for registration in declaration.registrations() {
        let name = registration.name();
        if seen.insert(name) {
            groups.push((name, 1));
        } else if let Some(group) = groups.iter_mut().find(|(existing, _)| *existing == name) {
            group.1 += 1;
        }
    }

    groups
        .into_iter()
        .flat_map(|(name, count)| std::iter::repeat_n(name.to_string(), count - 1))
        .collect()
}
