use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use stepkit_host::{
    BoundaryKind, CapabilityGrant, DomainOptions, Error, ExecutionError, HandlerContainer,
    HostContext, HostError, InvocationEnvelope, IsolationDomain, MemoryTraceSink, PolicyConfig,
    PolicyEngine,
};
use stepkit_model::{
    EntityService, GrantError, Handler, HandlerContext, HandlerDeclaration, HandlerError,
    HandlerType, Permission, Registration, ServiceFault, WebError,
};
use stepkit_types::{EntityRecord, InvocationDescriptor, RecordId, WellKnownMessage};

// ── Fixtures ────────────────────────────────────────────────────

type BodyFn = dyn Fn(&dyn HandlerContext) -> Result<(), HandlerError> + Send + Sync;

struct FnHandler(Arc<BodyFn>);

impl Handler for FnHandler {
    fn execute(&self, context: &dyn HandlerContext) -> Result<(), HandlerError> {
        (self.0)(context)
    }
}

fn declaration() -> HandlerDeclaration {
    HandlerDeclaration::builder("IsolatedHandler")
        .register(Registration::message(
            WellKnownMessage::Create,
            "account",
            "Create of account",
        ))
        .build()
}

fn handler_type<F>(body: F) -> HandlerType
where
    F: Fn(&dyn HandlerContext) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    let body: Arc<BodyFn> = Arc::new(body);
    HandlerType::new(declaration(), move |_, _| {
        Box::new(FnHandler(Arc::clone(&body))) as Box<dyn Handler>
    })
}

fn thread_options() -> DomainOptions {
    DomainOptions {
        boundary: BoundaryKind::Thread,
        grant: CapabilityGrant::sandbox(),
    }
}

fn envelope() -> InvocationEnvelope {
    InvocationEnvelope {
        descriptor: InvocationDescriptor::builder("Create", "account").build(),
        target: Some(EntityRecord::new("account").with("name", "Contoso")),
        pre_images: Default::default(),
        post_images: Default::default(),
        input_parameters: Default::default(),
        config: None,
    }
}

#[derive(Default)]
struct CountingService {
    created: Mutex<Vec<String>>,
}

impl EntityService for CountingService {
    fn create(&self, record: &EntityRecord) -> Result<RecordId, ServiceFault> {
        self.created
            .lock()
            .unwrap()
            .push(record.logical_name.clone());
        Ok(RecordId::new())
    }

    fn retrieve(
        &self,
        logical_name: &str,
        id: RecordId,
        _columns: &[String],
    ) -> Result<EntityRecord, ServiceFault> {
        Ok(EntityRecord::new(logical_name).with_id(id))
    }

    fn update(&self, _record: &EntityRecord) -> Result<(), ServiceFault> {
        Ok(())
    }

    fn delete(&self, _logical_name: &str, _id: RecordId) -> Result<(), ServiceFault> {
        Err(ServiceFault::new(-1, "delete refused"))
    }
}

fn ok_body(_: &dyn HandlerContext) -> Result<(), HandlerError> {
    Ok(())
}

// ── Domain lifecycle ────────────────────────────────────────────

#[test]
fn dispose_is_idempotent_and_invoke_after_dispose_fails() {
    let domain = IsolationDomain::create(&handler_type(ok_body), thread_options()).unwrap();
    let handle = domain.instantiate("", "").unwrap();
    let sink = MemoryTraceSink::new();
    let service = CountingService::default();

    assert_eq!(
        domain.invoke(&handle, envelope(), &sink, &service).unwrap(),
        Ok(())
    );

    domain.dispose();
    domain.dispose();
    assert!(domain.is_disposed());

    assert!(matches!(
        domain.invoke(&handle, envelope(), &sink, &service),
        Err(HostError::DomainDisposed)
    ));
    assert!(matches!(
        domain.instantiate("", ""),
        Err(HostError::DomainDisposed)
    ));
}

#[test]
fn a_domain_hosts_exactly_one_instance() {
    let domain = IsolationDomain::create(&handler_type(ok_body), thread_options()).unwrap();
    domain.instantiate("", "").unwrap();
    assert!(matches!(
        domain.instantiate("", ""),
        Err(HostError::AlreadyInstantiated)
    ));
}

#[test]
fn invoke_needs_an_instance_of_this_domain() {
    let ty = handler_type(ok_body);
    let first = IsolationDomain::create(&ty, thread_options()).unwrap();
    let second = IsolationDomain::create(&ty, thread_options()).unwrap();
    let handle = first.instantiate("", "").unwrap();
    let sink = MemoryTraceSink::new();
    let service = CountingService::default();

    assert!(matches!(
        second.invoke(&handle, envelope(), &sink, &service),
        Err(HostError::NotInstantiated)
    ));
}

#[test]
fn loader_features_stay_disabled() {
    let domain = IsolationDomain::create(&handler_type(ok_body), thread_options()).unwrap();
    let loader = domain.loader_settings();
    assert!(!loader.allows_binding_redirects());
    assert!(!loader.allows_code_download());
    assert!(!loader.allows_publisher_policy());
}

// ── Thread boundary ─────────────────────────────────────────────

#[test]
fn construction_happens_inside_the_domain() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&seen);
    let ty = HandlerType::new(declaration(), move |unsecure, secure| {
        slot.lock().unwrap().push((
            std::thread::current().name().map(str::to_string),
            unsecure.to_string(),
            secure.to_string(),
        ));
        Box::new(FnHandler(Arc::new(ok_body))) as Box<dyn Handler>
    });

    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    domain.instantiate("public", "private").unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (thread, unsecure, secure) = &seen[0];
    assert!(thread.as_deref().unwrap().starts_with("stepkit-domain-"));
    assert_eq!(unsecure, "public");
    assert_eq!(secure, "private");
}

#[test]
fn traces_and_service_calls_are_relayed() {
    let ty = handler_type(|context| {
        context.trace("inside the domain");
        let id = context.service().create(&EntityRecord::new("task"))?;
        let task = context.service().retrieve("task", id, &[])?;
        context.trace(&format!("retrieved {}", task.logical_name));
        Ok(())
    });
    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    let handle = domain.instantiate("", "").unwrap();
    let sink = MemoryTraceSink::new();
    let service = CountingService::default();

    let outcome = domain.invoke(&handle, envelope(), &sink, &service).unwrap();
    assert_eq!(outcome, Ok(()));
    assert!(sink.has_line_starting_with("inside the domain, Correlation Id: "));
    assert!(sink.has_line_starting_with("retrieved task, "));
    assert_eq!(*service.created.lock().unwrap(), vec!["task".to_string()]);
}

#[test]
fn failures_are_classified_inside_the_domain() {
    let ty = handler_type(|context| {
        context.service().delete("account", RecordId::new())?;
        Ok(())
    });
    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    let handle = domain.instantiate("", "").unwrap();
    let sink = MemoryTraceSink::new();
    let service = CountingService::default();

    let outcome = domain.invoke(&handle, envelope(), &sink, &service).unwrap();
    assert_eq!(
        outcome,
        Err(ExecutionError::RemoteServiceFault {
            fault: ServiceFault::new(-1, "delete refused")
        })
    );
    assert!(sink.has_line_starting_with("Error Code: -1"));
}

#[test]
fn sandbox_grant_is_enforced_inside_the_domain() {
    let results = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&results);
    let ty = handler_type(move |context| {
        let mut results = slot.lock().unwrap();
        results.push(context.demand(Permission::FileIo));
        results.push(context.demand(Permission::Environment));
        results.push(context.demand(Permission::Serialization));
        results.push(context.authorize_web_request("https://api.example.com/v1"));
        Ok(())
    });
    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    let handle = domain.instantiate("", "").unwrap();
    domain
        .invoke(&handle, envelope(), &MemoryTraceSink::new(), &CountingService::default())
        .unwrap()
        .unwrap();

    let results = results.lock().unwrap();
    assert_eq!(
        results[..3],
        [
            Err(GrantError::PermissionDenied(Permission::FileIo)),
            Err(GrantError::PermissionDenied(Permission::Environment)),
            Ok(()),
        ]
    );
    assert_eq!(results[3], Ok(()));
}

#[test]
fn local_and_literal_hosts_are_refused() {
    let results = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&results);
    let ty = handler_type(move |context| {
        let mut results = slot.lock().unwrap();
        for url in [
            "http://localhost:8080/",
            "http://127.0.0.1/",
            "http://[::1]/",
            "http://0x7f000001/",
            "ftp://files.example.com/",
        ] {
            results.push(context.authorize_web_request(url).is_err());
        }
        Ok(())
    });
    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    let handle = domain.instantiate("", "").unwrap();
    domain
        .invoke(&handle, envelope(), &MemoryTraceSink::new(), &CountingService::default())
        .unwrap()
        .unwrap();

    assert_eq!(*results.lock().unwrap(), vec![true; 5]);
}

#[test]
fn web_fetches_are_authorized_by_the_caller_with_the_domain_grant() {
    let results = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&results);
    let ty = handler_type(move |context| {
        let mut results = slot.lock().unwrap();
        results.push(context.fetch_url("http://127.0.0.1:9/"));
        results.push(context.fetch_url("https://api.example.com/v1"));
        Ok(())
    });
    let mut grant = CapabilityGrant::sandbox();
    grant.revoke(Permission::WebAccess);
    let domain = IsolationDomain::create(
        &ty,
        DomainOptions {
            boundary: BoundaryKind::Thread,
            grant,
        },
    )
    .unwrap();
    let handle = domain.instantiate("", "").unwrap();
    domain
        .invoke(&handle, envelope(), &MemoryTraceSink::new(), &CountingService::default())
        .unwrap()
        .unwrap();

    let denied = Err(WebError::Denied(GrantError::PermissionDenied(
        Permission::WebAccess,
    )));
    assert_eq!(*results.lock().unwrap(), vec![denied.clone(), denied]);
}

#[test]
fn literal_host_fetches_are_refused_inside_the_domain() {
    let results = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&results);
    let ty = handler_type(move |context| {
        slot.lock()
            .unwrap()
            .push(context.fetch_url("http://127.0.0.1:9/"));
        Ok(())
    });
    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    let handle = domain.instantiate("", "").unwrap();
    domain
        .invoke(&handle, envelope(), &MemoryTraceSink::new(), &CountingService::default())
        .unwrap()
        .unwrap();

    let results = results.lock().unwrap();
    assert!(matches!(
        &results[..],
        [Err(WebError::Denied(GrantError::WebRequestDenied { .. }))]
    ));
}

#[test]
fn a_panic_inside_the_domain_is_an_error_for_the_caller() {
    let ty = handler_type(|context| {
        if context.target().is_some() {
            panic!("handler bug");
        }
        Ok(())
    });
    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    let handle = domain.instantiate("", "").unwrap();
    let sink = MemoryTraceSink::new();
    let service = CountingService::default();

    assert!(matches!(
        domain.invoke(&handle, envelope(), &sink, &service),
        Err(HostError::HandlerPanicked(message)) if message == "handler bug"
    ));

    let mut quiet = envelope();
    quiet.target = None;
    assert_eq!(
        domain.invoke(&handle, quiet, &sink, &service).unwrap(),
        Ok(())
    );
}

#[test]
fn constructor_panics_do_not_escape_the_domain() {
    let ty = HandlerType::new(declaration(), |_, _| -> Box<dyn Handler> {
        panic!("bad configuration")
    });
    let domain = IsolationDomain::create(&ty, thread_options()).unwrap();
    assert!(matches!(
        domain.instantiate("", ""),
        Err(HostError::HandlerPanicked(message)) if message == "bad configuration"
    ));
}

// ── Sandboxed containers ────────────────────────────────────────

fn thread_policy() -> PolicyEngine {
    PolicyEngine::with_config(PolicyConfig {
        boundary: Some(BoundaryKind::Thread),
        ..PolicyConfig::default()
    })
}

#[test]
fn sandbox_registrations_get_an_isolated_container() {
    let container = HandlerContainer::with_policy(handler_type(ok_body), "", "", &thread_policy())
        .unwrap();
    assert!(container.is_isolated());
    assert_eq!(
        container.domain().unwrap().boundary_kind(),
        BoundaryKind::Thread
    );
    assert!(!container.grant().is_granted(Permission::FileIo));
}

#[test]
fn isolated_execution_follows_the_same_contract() {
    let ty = handler_type(|context| {
        context.trace("isolated body");
        Ok(())
    });
    let container = HandlerContainer::with_policy(ty, "", "", &thread_policy()).unwrap();

    let sink = MemoryTraceSink::new();
    let service = CountingService::default();
    let descriptor = InvocationDescriptor::builder("Create", "account").build();
    let host = HostContext::new(descriptor, &sink, &service);
    container.execute(Some(&host)).unwrap();

    let lines = sink.lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Entered IsolatedHandler.Execute(), "));
    assert!(lines[1].starts_with("isolated body, "));
    assert!(lines[2].starts_with("Exiting IsolatedHandler.Execute(), "));
}

#[test]
fn disposed_container_fails_deterministically() {
    let container = HandlerContainer::with_policy(handler_type(ok_body), "", "", &thread_policy())
        .unwrap();
    container.dispose();
    container.dispose();

    let sink = MemoryTraceSink::new();
    let service = CountingService::default();
    let descriptor = InvocationDescriptor::builder("Create", "account").build();
    let host = HostContext::new(descriptor, &sink, &service);
    assert!(matches!(
        container.execute(Some(&host)),
        Err(Error::Host(HostError::DomainDisposed))
    ));
    assert!(sink.has_line_starting_with("Exiting IsolatedHandler.Execute()"));
}

#[test]
fn policy_denials_shrink_the_sandbox_grant() {
    let policy = PolicyEngine::with_config(PolicyConfig {
        boundary: Some(BoundaryKind::Thread),
        denied_permissions: [Permission::WebAccess].into_iter().collect(),
        ..PolicyConfig::default()
    });
    let container = HandlerContainer::with_policy(handler_type(ok_body), "", "", &policy).unwrap();
    assert!(!container.grant().is_granted(Permission::WebAccess));
    assert!(container.grant().is_granted(Permission::Execution));
}

// ── Process boundary ────────────────────────────────────────────

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod process {
    use super::*;
    use pretty_assertions::assert_eq;

    fn process_options() -> DomainOptions {
        DomainOptions {
            boundary: BoundaryKind::Process,
            grant: CapabilityGrant::sandbox(),
        }
    }

    #[test]
    fn filesystem_access_is_denied_in_the_child() {
        let ty = handler_type(|context| {
            let errno = std::fs::File::open("/etc/hosts")
                .err()
                .and_then(|err| err.raw_os_error());
            context.trace(&format!("open errno {errno:?}"));
            Ok(())
        });
        let domain = IsolationDomain::create(&ty, process_options()).unwrap();
        let handle = domain.instantiate("", "").unwrap();
        let sink = MemoryTraceSink::new();

        let outcome = domain
            .invoke(&handle, envelope(), &sink, &CountingService::default())
            .unwrap();
        assert_eq!(outcome, Ok(()));
        assert!(
            sink.has_line_starting_with("open errno Some(1), "),
            "trace: {:?}",
            sink.lines()
        );
    }

    #[test]
    fn environment_is_cleared_in_the_child() {
        let ty = handler_type(|context| {
            context.trace(&format!("vars {}", std::env::vars_os().count()));
            Ok(())
        });
        let domain = IsolationDomain::create(&ty, process_options()).unwrap();
        let handle = domain.instantiate("", "").unwrap();
        let sink = MemoryTraceSink::new();

        domain
            .invoke(&handle, envelope(), &sink, &CountingService::default())
            .unwrap()
            .unwrap();
        assert!(sink.has_line_starting_with("vars 0, "));
    }

    #[test]
    fn service_calls_cross_the_process_boundary() {
        let ty = handler_type(|context| {
            context.service().create(&EntityRecord::new("note"))?;
            Ok(())
        });
        let domain = IsolationDomain::create(&ty, process_options()).unwrap();
        let handle = domain.instantiate("", "").unwrap();
        let service = CountingService::default();

        domain
            .invoke(&handle, envelope(), &MemoryTraceSink::new(), &service)
            .unwrap()
            .unwrap();
        assert_eq!(*service.created.lock().unwrap(), vec!["note".to_string()]);
    }

    #[test]
    fn outcomes_and_panics_cross_the_process_boundary() {
        let ty = handler_type(|context| match context.target() {
            Some(_) => Err(HandlerError::abort("refused in child")),
            None => panic!("child panic"),
        });
        let domain = IsolationDomain::create(&ty, process_options()).unwrap();
        let handle = domain.instantiate("", "").unwrap();
        let sink = MemoryTraceSink::new();
        let service = CountingService::default();

        assert_eq!(
            domain.invoke(&handle, envelope(), &sink, &service).unwrap(),
            Err(ExecutionError::HandlerAborted {
                message: "refused in child".to_string()
            })
        );

        let mut no_target = envelope();
        no_target.target = None;
        assert!(matches!(
            domain.invoke(&handle, no_target, &sink, &service),
            Err(HostError::HandlerPanicked(message)) if message == "child panic"
        ));
    }

    /// Runs `body` once in a fresh process domain and returns its trace lines.
    fn run_in_child<F>(body: F) -> MemoryTraceSink
    where
        F: Fn(&dyn HandlerContext) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let domain = IsolationDomain::create(&handler_type(body), process_options()).unwrap();
        let handle = domain.instantiate("", "").unwrap();
        let sink = MemoryTraceSink::new();
        domain
            .invoke(&handle, envelope(), &sink, &CountingService::default())
            .unwrap()
            .unwrap();
        sink
    }

    fn errno(rc: i64) -> Option<i32> {
        (rc < 0)
            .then(std::io::Error::last_os_error)
            .and_then(|err| err.raw_os_error())
    }

    #[test]
    fn loopback_connect_is_denied_in_the_child() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let sink = run_in_child(move |context| {
            let errno = std::net::TcpStream::connect(addr)
                .err()
                .and_then(|err| err.raw_os_error());
            context.trace(&format!("connect errno {errno:?}"));
            Ok(())
        });
        assert!(
            sink.has_line_starting_with("connect errno Some(1), "),
            "trace: {:?}",
            sink.lines()
        );

        listener.set_nonblocking(true).unwrap();
        assert!(listener.accept().is_err());
    }

    #[test]
    fn web_fetches_from_the_child_go_through_the_caller() {
        let sink = run_in_child(|context| {
            let verdict = match context.fetch_url("http://127.0.0.1:9/") {
                Err(WebError::Denied(GrantError::WebRequestDenied { .. })) => "denied",
                Err(_) => "failed",
                Ok(_) => "fetched",
            };
            context.trace(&format!("fetch {verdict}"));
            Ok(())
        });
        assert!(
            sink.has_line_starting_with("fetch denied, "),
            "trace: {:?}",
            sink.lines()
        );
    }

    #[test]
    fn host_descriptors_are_closed_in_the_child() {
        use std::io::{Read, Seek, SeekFrom, Write};
        use std::os::fd::{AsRawFd, FromRawFd};

        let mut host_file = tempfile::tempfile().unwrap();
        // SAFETY: duplicates a descriptor this test owns.
        let fd = unsafe { libc::fcntl(host_file.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 100) };
        assert!(fd >= 100);

        let sink = run_in_child(move |context| {
            // SAFETY: the number is only borrowed; ManuallyDrop keeps it from being closed.
            let file = std::mem::ManuallyDrop::new(unsafe { std::fs::File::from_raw_fd(fd) });
            let errno = (&*file)
                .write_all(b"leaked")
                .err()
                .and_then(|err| err.raw_os_error());
            context.trace(&format!("write errno {errno:?}"));
            Ok(())
        });
        assert!(
            sink.has_line_starting_with("write errno Some(9), "),
            "trace: {:?}",
            sink.lines()
        );

        let mut contents = String::new();
        host_file.seek(SeekFrom::Start(0)).unwrap();
        host_file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "");
        // SAFETY: `fd` was duplicated above and is not used afterwards.
        unsafe { libc::close(fd) };
    }

    #[test]
    fn stdio_points_at_dev_null_in_the_child() {
        let sink = run_in_child(|context| {
            // SAFETY: writes a static buffer to stdout.
            let rc = unsafe { libc::write(1, b"x".as_ptr().cast(), 1) };
            context.trace(&format!("stdout write {rc}"));
            Ok(())
        });
        assert!(sink.has_line_starting_with("stdout write 1, "));
    }

    #[test]
    fn device_nodes_cannot_be_created_in_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fifo");
        let c_path = std::ffi::CString::new(path.to_str().unwrap()).unwrap();

        let sink = run_in_child(move |context| {
            // SAFETY: `c_path` is a valid NUL-terminated path.
            let rc = unsafe {
                libc::mknodat(libc::AT_FDCWD, c_path.as_ptr(), libc::S_IFIFO | 0o600, 0)
            };
            context.trace(&format!("mknodat errno {:?}", errno(rc.into())));
            Ok(())
        });
        assert!(
            sink.has_line_starting_with("mknodat errno Some(1), "),
            "trace: {:?}",
            sink.lines()
        );
        assert!(!path.exists());
    }

    #[test]
    fn io_uring_and_exec_are_denied_in_the_child() {
        let sink = run_in_child(|context| {
            let mut params = [0u8; 120];
            // SAFETY: `params` is large enough for io_uring_params.
            let rc = unsafe { libc::syscall(libc::SYS_io_uring_setup, 8, params.as_mut_ptr()) };
            context.trace(&format!("io_uring errno {:?}", errno(rc)));

            let program = c"/bin/true";
            let argv = [program.as_ptr(), std::ptr::null()];
            let envp = [std::ptr::null()];
            // SAFETY: argv and envp are NULL-terminated arrays of C strings.
            let rc = unsafe { libc::execve(program.as_ptr(), argv.as_ptr(), envp.as_ptr()) };
            context.trace(&format!("execve errno {:?}", errno(rc.into())));
            Ok(())
        });
        assert!(
            sink.has_line_starting_with("io_uring errno Some(1), "),
            "trace: {:?}",
            sink.lines()
        );
        assert!(sink.has_line_starting_with("execve errno Some(1), "));
    }

    #[test]
    fn x32_syscalls_are_denied_in_the_child() {
        let sink = run_in_child(|context| {
            // SAFETY: getpid through the x32 ABI; takes no arguments.
            let rc = unsafe { libc::syscall(0x4000_0000 | libc::SYS_getpid) };
            context.trace(&format!("x32 errno {:?}", errno(rc)));
            Ok(())
        });
        assert!(
            sink.has_line_starting_with("x32 errno Some(1), "),
            "trace: {:?}",
            sink.lines()
        );
    }

    #[test]
    fn process_domain_dispose_is_idempotent() {
        let domain = IsolationDomain::create(&handler_type(ok_body), process_options()).unwrap();
        let handle = domain.instantiate("", "").unwrap();
        domain.dispose();
        domain.dispose();
        assert!(matches!(
            domain.invoke(
                &handle,
                envelope(),
                &MemoryTraceSink::new(),
                &CountingService::default()
            ),
            Err(HostError::DomainDisposed)
        ));
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
#[test]
fn process_boundary_is_unavailable_elsewhere() {
    let err = IsolationDomain::create(
        &handler_type(ok_body),
        DomainOptions {
            boundary: BoundaryKind::Process,
            grant: CapabilityGrant::sandbox(),
        },
    )
    .unwrap_err();
    assert!(matches!(err, HostError::SandboxUnavailable(_)));
}
