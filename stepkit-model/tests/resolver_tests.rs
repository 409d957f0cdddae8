use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stepkit_config::ConfigFormat;
use stepkit_model::{
    ConfigPolicy, Handler, HandlerContext, HandlerDeclaration, HandlerError, HandlerType,
    Registration, resolve,
};
use stepkit_types::{IsolationMode, WellKnownMessage};

fn account_handler() -> HandlerDeclaration {
    HandlerDeclaration::builder("AccountHandler")
        .configuration(ConfigPolicy {
            format: ConfigFormat::Xml,
            ..ConfigPolicy::default()
        })
        .register(Registration::message(
            WellKnownMessage::Create,
            "account",
            "PreCreate Account",
        ))
        .register(
            Registration::message(WellKnownMessage::Update, "account", "PreUpdate Account")
                .pre_image("pre", ""),
        )
        .build()
}

// ── Duplicate detection ──────────────────────────────────────────

#[test]
fn unique_names_resolve() {
    let resolved = resolve(&account_handler()).unwrap();
    assert_eq!(resolved.handler(), "AccountHandler");
    assert_eq!(resolved.registrations().len(), 2);
    assert_eq!(resolved.config().format, ConfigFormat::Xml);
}

#[test]
fn duplicate_names_fail_with_every_repeat() {
    let declaration = HandlerDeclaration::builder("Dupes")
        .register(Registration::message(WellKnownMessage::Create, "account", "Step1"))
        .register(Registration::message(WellKnownMessage::Update, "account", "Step1"))
        .register(Registration::custom("sample_Action", "", "Step1"))
        .build();

    let err = resolve(&declaration).unwrap_err();
    assert_eq!(err.names, vec!["Step1", "Step1"]);
    assert_eq!(
        err.to_string(),
        "Found types with duplicate attributes of the same name(s) Step1, Step1"
    );
}

#[test]
fn duplicates_are_grouped_by_first_occurrence() {
    let declaration = HandlerDeclaration::builder("Dupes")
        .register(Registration::custom("a", "x", "A"))
        .register(Registration::custom("b", "x", "B"))
        .register(Registration::custom("c", "x", "A"))
        .register(Registration::custom("d", "x", "B"))
        .register(Registration::custom("e", "x", "A"))
        .build();

    let err = resolve(&declaration).unwrap_err();
    assert_eq!(err.names, vec!["A", "A", "B"]);
}

#[test]
fn duplicate_check_is_ordinal() {
    let declaration = HandlerDeclaration::builder("Cased")
        .register(Registration::custom("a", "x", "step"))
        .register(Registration::custom("b", "x", "Step"))
        .build();
    assert!(resolve(&declaration).is_ok());
}

// ── Predicates ───────────────────────────────────────────────────

#[test]
fn predicates_are_case_insensitive() {
    let resolved = resolve(&account_handler()).unwrap();

    assert!(resolved.is_entity_registered("ACCOUNT"));
    assert!(!resolved.is_entity_registered("contact"));
    assert!(resolved.is_message_registered("create"));
    assert!(!resolved.is_message_registered("Delete"));
    assert!(resolved.is_message_and_entity_registered("UPDATE", "Account"));
    assert!(!resolved.is_message_and_entity_registered("Delete", "account"));
}

#[test]
fn wildcard_entity_matches_any_entity() {
    let declaration = HandlerDeclaration::builder("Wildcard")
        .register(Registration::custom("sample_Action", "*", "Any Entity"))
        .build();
    let resolved = resolve(&declaration).unwrap();

    assert!(resolved.is_entity_registered("contact"));
    assert!(resolved.is_message_and_entity_registered("sample_action", "lead"));
    assert!(!resolved.is_message_and_entity_registered("Create", "lead"));
}

#[test]
fn isolation_requirement() {
    assert!(resolve(&account_handler()).unwrap().requires_isolation());

    let trusted = HandlerDeclaration::builder("Trusted")
        .register(
            Registration::message(WellKnownMessage::Create, "account", "Create")
                .isolation_mode(IsolationMode::None),
        )
        .build();
    assert!(!resolve(&trusted).unwrap().requires_isolation());
}

// ── HandlerType ──────────────────────────────────────────────────

struct Noop;

impl Handler for Noop {
    fn execute(&self, _context: &dyn HandlerContext) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[test]
fn handler_type_resolves_once() {
    let handler_type = HandlerType::new(account_handler(), |_, _| Box::new(Noop));
    let clone = handler_type.clone();
    assert!(std::ptr::eq(
        handler_type.capabilities().unwrap(),
        clone.capabilities().unwrap()
    ));
}

#[test]
fn handler_type_reports_duplicates_every_time() {
    let declaration = HandlerDeclaration::builder("Dupes")
        .register(Registration::custom("a", "x", "A"))
        .register(Registration::custom("b", "x", "A"))
        .build();
    let handler_type = HandlerType::new(declaration, |_, _| Box::new(Noop));
    assert!(handler_type.capabilities().is_err());
    assert!(handler_type.capabilities().is_err());
}

#[test]
fn concurrent_first_access_is_safe() {
    let handler_type = HandlerType::new(account_handler(), |_, _| Box::new(Noop));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let handler_type = handler_type.clone();
            std::thread::spawn(move || handler_type.capabilities().unwrap().registrations().len())
        })
        .collect();
    for thread in threads {
        assert_eq!(thread.join().unwrap(), 2);
    }
}

#[test]
fn instantiate_passes_both_configuration_strings() {
    struct Recording;
    impl Handler for Recording {
        fn execute(&self, _context: &dyn HandlerContext) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_type = {
        let seen = seen.clone();
        let calls = calls.clone();
        HandlerType::new(account_handler(), move |unsecure, secure| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push((unsecure.to_string(), secure.to_string()));
            Box::new(Recording)
        })
    };

    let _handler = handler_type.instantiate("open", "hidden");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[("open".to_string(), "hidden".to_string())]
    );
}
