//! Dispatch validation: checks an inbound invocation against the handler's
//! declared capabilities before any business logic runs.

use crate::ExecutionError;
use crate::messages;
use stepkit_model::ResolvedCapabilities;
use stepkit_types::InvocationDescriptor;
use thiserror::Error;

/// Why an invocation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchRejection {
    #[error("{}", messages::invalid_entity(.entity, .handler))]
    InvalidEntity { entity: String, handler: String },

    #[error("{}", messages::invalid_message_name(.message, .handler))]
    InvalidMessageName { message: String, handler: String },

    #[error("{}", messages::invalid_message_entity_combination(.message, .entity, .handler))]
    InvalidMessageEntityCombination {
        message: String,
        entity: String,
        handler: String,
    },
}

impl From<DispatchRejection> for ExecutionError {
    fn from(rejection: DispatchRejection) -> Self {
        match rejection {
            DispatchRejection::InvalidEntity { entity, handler } => {
                Self::InvalidEntity { entity, handler }
            }
            DispatchRejection::InvalidMessageName { message, handler } => {
                Self::InvalidMessageName { message, handler }
            }
            DispatchRejection::InvalidMessageEntityCombination {
                message,
                entity,
                handler,
            } => Self::InvalidMessageEntityCombination {
                message,
                entity,
                handler,
            },
        }
    }
}

/// Accepts or rejects `descriptor`. The entity is checked first, then the
/// message, then the pair; the first failing check decides.
pub fn validate(
    descriptor: &InvocationDescriptor,
    capabilities: &ResolvedCapabilities,
) -> Result<(), DispatchRejection> {
    let entity = descriptor.primary_entity();
    let message = descriptor.message_name();
    let handler = capabilities.handler();

    if !capabilities.is_entity_registered(entity) {
        return Err(DispatchRejection::InvalidEntity {
            entity: entity.to_string(),
            handler: handler.to_string(),
        });
    }

    if !capabilities.is_message_registered(message) {
        return Err(DispatchRejection::InvalidMessageName {
            message: message.to_string(),
            handler: handler.to_string(),
        });
    }

    if !capabilities.is_message_and_entity_registered(message, entity) {
        return Err(DispatchRejection::InvalidMessageEntityCombination {
            message: message.to_string(),
            entity: entity.to_string(),
            handler: handler.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stepkit_model::{HandlerDeclaration, Registration, resolve};
    use stepkit_types::WellKnownMessage;

    fn capabilities() -> ResolvedCapabilities {
        let declaration = HandlerDeclaration::builder("AccountHandler")
            .register(Registration::message(WellKnownMessage::Create, "account", "CreateAccount"))
            .register(Registration::message(WellKnownMessage::Update, "contact", "UpdateContact"))
            .build();
        resolve(&declaration).unwrap()
    }

    #[test]
    fn entity_is_checked_before_message() {
        let descriptor = InvocationDescriptor::builder("Explode", "lead").build();
        assert!(matches!(
            validate(&descriptor, &capabilities()),
            Err(DispatchRejection::InvalidEntity { entity, .. }) if entity == "lead"
        ));
    }

    #[test]
    fn pair_is_checked_last() {
        let descriptor = InvocationDescriptor::builder("Update", "account").build();
        let rejection = validate(&descriptor, &capabilities()).unwrap_err();
        assert_eq!(
            rejection.to_string(),
            "The message \"Update\" is not supported for entity \"account\" by AccountHandler."
        );
    }

    #[test]
    fn rejection_maps_onto_execution_error() {
        let rejection = DispatchRejection::InvalidMessageName {
            message: "Explode".to_string(),
            handler: "AccountHandler".to_string(),
        };
        let text = rejection.to_string();
        assert_eq!(ExecutionError::from(rejection).to_string(), text);
    }

    proptest! {
        #[test]
        fn registered_pairs_accept_any_casing(upper in proptest::collection::vec(any::<bool>(), 13)) {
            let flip = |text: &str, offset: usize| -> String {
                text.chars()
                    .zip(upper.iter().skip(offset).chain(std::iter::repeat(&false)))
                    .map(|(c, &up)| if up { c.to_ascii_uppercase() } else { c })
                    .collect()
            };
            let descriptor =
                InvocationDescriptor::builder(flip("Create", 0), flip("account", 6)).build();
            prop_assert!(validate(&descriptor, &capabilities()).is_ok());
        }
    }
}
