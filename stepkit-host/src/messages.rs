//! User-facing and trace message catalog.
//!
//! Hosts match on these strings, so the wording and spacing (including the
//! double spaces after full stops) are fixed.

pub fn no_service_provider(handler: &str) -> String {
    format!("There was no Service Provider.  {handler} is unable to execute.")
}

pub fn invalid_entity(entity: &str, handler: &str) -> String {
    format!("The entity {entity} is not support by {handler}.")
}

pub fn invalid_message_name(message: &str, handler: &str) -> String {
    format!("The message \"{message}\" is not support by {handler}.")
}

pub fn invalid_message_entity_combination(message: &str, entity: &str, handler: &str) -> String {
    format!("The message \"{message}\" is not supported for entity \"{entity}\" by {handler}.")
}

pub fn organization_service_fault(handler: &str) -> String {
    format!("There was an organization service fault.  {handler} is unable to execute successfully.")
}

pub fn forced_abort(handler: &str) -> String {
    format!("{handler} Aborted.  Forced error at the end of execution.")
}

pub fn duplicate_registration_names(names: &[String]) -> String {
    format!(
        "Found types with duplicate attributes of the same name(s) {}",
        names.join(", ")
    )
}

// Trace lines

pub fn entering(handler: &str) -> String {
    format!("Entered {handler}.Execute()")
}

pub fn exiting(handler: &str) -> String {
    format!("Exiting {handler}.Execute()")
}

pub fn error_loading_config(reason: &str) -> String {
    format!("Error Loading Configuration: {reason}")
}
