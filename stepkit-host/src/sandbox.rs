//! Isolation domains: restricted execution contexts a handler instance is
//! constructed and invoked in.
//!
//! Two boundary kinds share one request/reply protocol:
//! - [`BoundaryKind::Process`]: a forked child with an empty environment,
//!   no inherited descriptors besides its channel, and a seccomp filter
//!   denying filesystem, socket and process-control syscalls (Linux x86_64
//!   only)
//! - [`BoundaryKind::Thread`]: a dedicated thread; restrictions are
//!   enforced through the capability grant only
//!
//! Web fetches made by the handler cross the boundary as requests and are
//! performed by the caller under the domain's grant.
//!
//! A domain is owned by its creator and torn down by [`IsolationDomain::dispose`]
//! or on drop, whichever comes first.

use crate::context::LocalContext;
use crate::error::HostError;
use crate::executor::{panic_message, run_body_guarded};
use crate::grant::CapabilityGrant;
use crate::protocol::{
    DomainFault, InvocationEnvelope, Outcome, Reply, Request, ServiceCall, ServiceReply,
    ServiceValue,
};
use crate::trace::TraceSink;
use crate::transport::{Channel, ThreadChannel, recv_message, send_message};
use crate::web::{GrantedWebClient, WebClient};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use stepkit_model::{EntityService, Handler, HandlerType, ServiceFault, WebError};
use stepkit_types::{EntityRecord, RecordId};
use tracing::{debug, info, warn};

static NEXT_DOMAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Error code reported to handlers when a service call cannot cross the boundary.
const BOUNDARY_FAULT_CODE: i32 = -2_147_220_970;

/// How an isolation domain is separated from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Process,
    Thread,
}

impl Default for BoundaryKind {
    fn default() -> Self {
        if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
            Self::Process
        } else {
            Self::Thread
        }
    }
}

/// Code-loading features of a domain. Every feature is disabled; a domain
/// only ever runs the handler type it was created for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderSettings {
    binding_redirects: bool,
    code_download: bool,
    publisher_policy: bool,
}

impl LoaderSettings {
    pub fn allows_binding_redirects(&self) -> bool {
        self.binding_redirects
    }

    pub fn allows_code_download(&self) -> bool {
        self.code_download
    }

    pub fn allows_publisher_policy(&self) -> bool {
        self.publisher_policy
    }
}

/// Options for [`IsolationDomain::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOptions {
    pub boundary: BoundaryKind,
    pub grant: CapabilityGrant,
}

impl Default for DomainOptions {
    fn default() -> Self {
        Self {
            boundary: BoundaryKind::default(),
            grant: CapabilityGrant::sandbox(),
        }
    }
}

/// Names the handler instance living inside one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerHandle {
    domain: u64,
}

/// The caller's end of a running domain.
trait Boundary: Send {
    fn channel(&mut self) -> &mut dyn Channel;

    fn shutdown(self: Box<Self>);
}

enum DomainState {
    Live {
        boundary: Box<dyn Boundary>,
        instantiated: bool,
    },
    Disposed,
}

/// A restricted execution context hosting at most one handler instance.
pub struct IsolationDomain {
    id: u64,
    handler: String,
    boundary_kind: BoundaryKind,
    grant: CapabilityGrant,
    loader: LoaderSettings,
    state: Mutex<DomainState>,
}

impl IsolationDomain {
    /// Starts a domain for `handler_type`. No instance exists until
    /// [`instantiate`](Self::instantiate) is called.
    pub fn create(handler_type: &HandlerType, options: DomainOptions) -> Result<Self, HostError> {
        let id = NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed);
        let DomainOptions { boundary, grant } = options;

        let running: Box<dyn Boundary> = match boundary {
            BoundaryKind::Thread => Box::new(ThreadBoundary::spawn(id, handler_type, &grant)?),
            BoundaryKind::Process => spawn_process(handler_type, &grant)?,
        };

        info!(
            domain = id,
            handler = %handler_type.display_name(),
            boundary = ?boundary,
            "Created isolation domain"
        );

        Ok(Self {
            id,
            handler: handler_type.display_name().to_string(),
            boundary_kind: boundary,
            grant,
            loader: LoaderSettings::default(),
            state: Mutex::new(DomainState::Live {
                boundary: running,
                instantiated: false,
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn boundary_kind(&self) -> BoundaryKind {
        self.boundary_kind
    }

    pub fn grant(&self) -> &CapabilityGrant {
        &self.grant
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        self.loader
    }

    pub fn is_disposed(&self) -> bool {
        matches!(*self.lock(), DomainState::Disposed)
    }

    /// Constructs the handler instance inside the domain.
    pub fn instantiate(&self, unsecure: &str, secure: &str) -> Result<HandlerHandle, HostError> {
        let mut state = self.lock();
        let DomainState::Live {
            boundary,
            instantiated,
        } = &mut *state
        else {
            return Err(HostError::DomainDisposed);
        };
        if *instantiated {
            return Err(HostError::AlreadyInstantiated);
        }

        let channel = boundary.channel();
        send_message(
            channel,
            &Request::Instantiate {
                unsecure: unsecure.to_string(),
                secure: secure.to_string(),
            },
        )?;
        match recv_message::<_, Reply>(channel)? {
            Reply::Instantiated => {
                *instantiated = true;
                debug!(domain = self.id, handler = %self.handler, "Instantiated handler in domain");
                Ok(HandlerHandle { domain: self.id })
            }
            Reply::Fault(fault) => Err(fault.into()),
            other => Err(unexpected(&other)),
        }
    }

    /// Runs one invocation inside the domain and blocks until it completes.
    ///
    /// Trace lines and entity-service calls made by the handler are relayed
    /// to `trace` and `service` while the call is in flight. Web fetches are
    /// authorized against the domain's grant and performed here.
    pub fn invoke(
        &self,
        handle: &HandlerHandle,
        envelope: InvocationEnvelope,
        trace: &dyn TraceSink,
        service: &dyn EntityService,
    ) -> Result<Outcome, HostError> {
        let mut state = self.lock();
        let DomainState::Live {
            boundary,
            instantiated,
        } = &mut *state
        else {
            return Err(HostError::DomainDisposed);
        };
        if !*instantiated || handle.domain != self.id {
            return Err(HostError::NotInstantiated);
        }

        let channel = boundary.channel();
        send_message(channel, &Request::Invoke(Box::new(envelope)))?;
        loop {
            match recv_message::<_, Reply>(channel)? {
                Reply::Trace(line) => trace.trace(&line),
                Reply::ServiceCall(call) => {
                    let reply = call_service(service, call);
                    send_message(channel, &Request::ServiceReply(reply))?;
                }
                Reply::WebRequest(url) => {
                    let reply = GrantedWebClient::new(&self.grant).fetch(&url);
                    if let Err(err) = &reply {
                        debug!(
                            domain = self.id,
                            handler = %self.handler,
                            error = %err,
                            "Web request refused or failed"
                        );
                    }
                    send_message(channel, &Request::WebReply(reply))?;
                }
                Reply::Completed(outcome) => return Ok(outcome),
                Reply::Fault(fault) => return Err(fault.into()),
                other => return Err(unexpected(&other)),
            }
        }
    }

    /// Tears the domain down. Safe to call any number of times.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.lock(), DomainState::Disposed);
        if let DomainState::Live { boundary, .. } = previous {
            boundary.shutdown();
            info!(domain = self.id, handler = %self.handler, "Disposed isolation domain");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DomainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IsolationDomain {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for IsolationDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationDomain")
            .field("id", &self.id)
            .field("handler", &self.handler)
            .field("boundary", &self.boundary_kind)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn unexpected(reply: &Reply) -> HostError {
    HostError::Protocol(format!("unexpected reply from isolation domain: {reply:?}"))
}

fn call_service(service: &dyn EntityService, call: ServiceCall) -> ServiceReply {
    match call {
        ServiceCall::Create { record } => service.create(&record).map(ServiceValue::Created),
        ServiceCall::Retrieve {
            logical_name,
            id,
            columns,
        } => service
            .retrieve(&logical_name, id, &columns)
            .map(ServiceValue::Retrieved),
        ServiceCall::Update { record } => service.update(&record).map(|()| ServiceValue::Done),
        ServiceCall::Delete { logical_name, id } => service
            .delete(&logical_name, id)
            .map(|()| ServiceValue::Done),
    }
}

/// Waits for the domain's first frame.
fn handshake(channel: &mut dyn Channel) -> Result<(), HostError> {
    match recv_message::<_, Reply>(channel)? {
        Reply::Ready => Ok(()),
        Reply::Fault(fault) => Err(fault.into()),
        other => Err(unexpected(&other)),
    }
}

// ── Domain side ─────────────────────────────────────────────────

/// Request loop run inside a domain until shutdown or hang-up.
fn serve<C: Channel>(handler_type: &HandlerType, grant: &CapabilityGrant, channel: C) {
    let channel = RefCell::new(channel);
    let name = handler_type.display_name();
    let mut handler: Option<Box<dyn Handler>> = None;

    if send_message(&mut *channel.borrow_mut(), &Reply::Ready).is_err() {
        return;
    }

    loop {
        let request = match recv_message::<_, Request>(&mut *channel.borrow_mut()) {
            Ok(request) => request,
            Err(_) => return,
        };

        let reply = match request {
            Request::Instantiate { unsecure, secure } => {
                if handler.is_some() {
                    Reply::Fault(DomainFault::AlreadyInstantiated)
                } else {
                    match panic::catch_unwind(AssertUnwindSafe(|| {
                        handler_type.instantiate(&unsecure, &secure)
                    })) {
                        Ok(instance) => {
                            handler = Some(instance);
                            Reply::Instantiated
                        }
                        Err(payload) => {
                            Reply::Fault(DomainFault::Panicked(panic_message(payload.as_ref())))
                        }
                    }
                }
            }
            Request::Invoke(envelope) => match handler.as_deref() {
                None => Reply::Fault(DomainFault::NotInstantiated),
                Some(handler) => {
                    let proxy = ChannelProxy { channel: &channel };
                    let context = LocalContext::new(&envelope, &proxy, &proxy, &proxy, grant);
                    match run_body_guarded(handler, &context, name) {
                        Ok(outcome) => Reply::Completed(outcome),
                        Err(message) => Reply::Fault(DomainFault::Panicked(message)),
                    }
                }
            },
            Request::ServiceReply(_) | Request::WebReply(_) => {
                Reply::Fault(DomainFault::Protocol(
                    "reply received outside an invocation".to_string(),
                ))
            }
            Request::Shutdown => return,
        };

        if send_message(&mut *channel.borrow_mut(), &reply).is_err() {
            return;
        }
    }
}

/// Trace sink, entity service and web client that forward over the domain
/// channel.
struct ChannelProxy<'a, C> {
    channel: &'a RefCell<C>,
}

impl<C: Channel> ChannelProxy<'_, C> {
    /// Sends `reply` to the caller and waits for its answer.
    fn exchange(&self, reply: &Reply) -> Result<Request, HostError> {
        let mut channel = self.channel.borrow_mut();
        send_message(&mut *channel, reply)?;
        recv_message(&mut *channel)
    }

    fn call(&self, call: ServiceCall) -> Result<ServiceValue, ServiceFault> {
        match self
            .exchange(&Reply::ServiceCall(call))
            .map_err(boundary_fault)?
        {
            Request::ServiceReply(reply) => reply,
            other => Err(ServiceFault::new(
                BOUNDARY_FAULT_CODE,
                format!("unexpected request while awaiting a service reply: {other:?}"),
            )),
        }
    }
}

fn boundary_fault(err: HostError) -> ServiceFault {
    ServiceFault::new(BOUNDARY_FAULT_CODE, err.to_string())
}

fn mismatched(value: ServiceValue) -> ServiceFault {
    ServiceFault::new(
        BOUNDARY_FAULT_CODE,
        format!("mismatched service reply: {value:?}"),
    )
}

impl<C: Channel> TraceSink for ChannelProxy<'_, C> {
    fn trace(&self, line: &str) {
        let _ = send_message(
            &mut *self.channel.borrow_mut(),
            &Reply::Trace(line.to_string()),
        );
    }
}

impl<C: Channel> EntityService for ChannelProxy<'_, C> {
    fn create(&self, record: &EntityRecord) -> Result<RecordId, ServiceFault> {
        match self.call(ServiceCall::Create {
            record: record.clone(),
        })? {
            ServiceValue::Created(id) => Ok(id),
            other => Err(mismatched(other)),
        }
    }

    fn retrieve(
        &self,
        logical_name: &str,
        id: RecordId,
        columns: &[String],
    ) -> Result<EntityRecord, ServiceFault> {
        match self.call(ServiceCall::Retrieve {
            logical_name: logical_name.to_string(),
            id,
            columns: columns.to_vec(),
        })? {
            ServiceValue::Retrieved(record) => Ok(record),
            other => Err(mismatched(other)),
        }
    }

    fn update(&self, record: &EntityRecord) -> Result<(), ServiceFault> {
        match self.call(ServiceCall::Update {
            record: record.clone(),
        })? {
            ServiceValue::Done => Ok(()),
            other => Err(mismatched(other)),
        }
    }

    fn delete(&self, logical_name: &str, id: RecordId) -> Result<(), ServiceFault> {
        match self.call(ServiceCall::Delete {
            logical_name: logical_name.to_string(),
            id,
        })? {
            ServiceValue::Done => Ok(()),
            other => Err(mismatched(other)),
        }
    }
}

impl<C: Channel> WebClient for ChannelProxy<'_, C> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, WebError> {
        let failed = |reason: String| WebError::Failed {
            url: url.to_string(),
            reason,
        };
        match self.exchange(&Reply::WebRequest(url.to_string())) {
            Ok(Request::WebReply(reply)) => reply,
            Ok(other) => Err(failed(format!(
                "unexpected request while awaiting a web reply: {other:?}"
            ))),
            Err(err) => Err(failed(err.to_string())),
        }
    }
}

// ── Thread boundary ─────────────────────────────────────────────

struct ThreadBoundary {
    channel: ThreadChannel,
    thread: Option<JoinHandle<()>>,
}

impl ThreadBoundary {
    fn spawn(id: u64, handler_type: &HandlerType, grant: &CapabilityGrant) -> Result<Self, HostError> {
        let (mut caller, domain) = ThreadChannel::pair();
        let handler_type = handler_type.clone();
        let grant = grant.clone();
        let thread = thread::Builder::new()
            .name(format!("stepkit-domain-{id}"))
            .spawn(move || serve(&handler_type, &grant, domain))?;

        handshake(&mut caller)?;
        Ok(Self {
            channel: caller,
            thread: Some(thread),
        })
    }
}

impl Boundary for ThreadBoundary {
    fn channel(&mut self) -> &mut dyn Channel {
        &mut self.channel
    }

    fn shutdown(self: Box<Self>) {
        let ThreadBoundary {
            mut channel,
            thread,
        } = *self;
        let _ = send_message(&mut channel, &Request::Shutdown);
        drop(channel);
        if let Some(thread) = thread
            && thread.join().is_err()
        {
            warn!("Isolation domain thread panicked during shutdown");
        }
    }
}

// ── Process boundary ────────────────────────────────────────────

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
fn spawn_process(
    handler_type: &HandlerType,
    grant: &CapabilityGrant,
) -> Result<Box<dyn Boundary>, HostError> {
    Ok(Box::new(process::ProcessBoundary::spawn(handler_type, grant)?))
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
fn spawn_process(
    _handler_type: &HandlerType,
    _grant: &CapabilityGrant,
) -> Result<Box<dyn Boundary>, HostError> {
    Err(HostError::SandboxUnavailable(
        "process isolation requires Linux on x86_64".to_string(),
    ))
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod process {
    use super::{Boundary, handshake, serve};
    use crate::error::HostError;
    use crate::grant::CapabilityGrant;
    use crate::protocol::{DomainFault, Reply, Request};
    use crate::transport::{Channel, FramedChannel, send_message};
    use std::fs::File;
    use std::io;
    use std::os::fd::{FromRawFd, IntoRawFd, OwnedFd, RawFd};
    use std::os::raw::{c_int, c_long, c_uchar, c_uint, c_ulong, c_ushort};
    use stepkit_model::HandlerType;
    use tracing::subscriber::{self, NoSubscriber};
    use tracing::warn;

    const EPERM: c_uint = 1;
    const ENOSYS: c_uint = 38;
    const SECCOMP_SET_MODE_FILTER: c_uint = 1;
    const SECCOMP_RET_ALLOW: c_uint = 0x7fff_0000;
    const SECCOMP_RET_ERRNO: c_uint = 0x0005_0000;
    const SECCOMP_RET_KILL: c_uint = 0x0000_0000;
    const AUDIT_ARCH_X86_64: c_uint = 0xc000_003e;
    /// x32 syscalls share the x86_64 audit arch and set this bit.
    const X32_SYSCALL_BIT: c_uint = 0x4000_0000;
    /// First syscall number this filter does not know about.
    const FIRST_UNKNOWN_SYSCALL: c_uint = 453;

    const BPF_LD: c_ushort = 0x00;
    const BPF_W: c_ushort = 0x00;
    const BPF_ABS: c_ushort = 0x20;
    const BPF_JMP: c_ushort = 0x05;
    const BPF_JEQ: c_ushort = 0x10;
    const BPF_JGE: c_ushort = 0x30;
    const BPF_K: c_ushort = 0x00;
    const BPF_RET: c_ushort = 0x06;

    const SYSCALL_NR_OFFSET: c_uint = 0;
    const ARCH_OFFSET: c_uint = 4;

    /// Descriptors the child reads requests from and writes replies to.
    const CHANNEL_READ_FD: RawFd = 3;
    const CHANNEL_WRITE_FD: RawFd = 4;
    const FIRST_CLOSED_FD: RawFd = 5;

    /// Filesystem syscalls (x86_64 numbers).
    const FILESYSTEM_SYSCALLS: &[c_uint] = &[
        2,   // open
        4,   // stat
        5,   // fstat
        6,   // lstat
        21,  // access
        76,  // truncate
        77,  // ftruncate
        78,  // getdents
        80,  // chdir
        81,  // fchdir
        82,  // rename
        83,  // mkdir
        84,  // rmdir
        85,  // creat
        86,  // link
        87,  // unlink
        88,  // symlink
        89,  // readlink
        90,  // chmod
        91,  // fchmod
        92,  // chown
        93,  // fchown
        94,  // lchown
        132, // utime
        133, // mknod
        137, // statfs
        138, // fstatfs
        155, // pivot_root
        161, // chroot
        163, // acct
        165, // mount
        166, // umount2
        167, // swapon
        168, // swapoff
        179, // quotactl
        188, // setxattr
        189, // lsetxattr
        190, // fsetxattr
        191, // getxattr
        192, // lgetxattr
        193, // fgetxattr
        194, // listxattr
        195, // llistxattr
        196, // flistxattr
        197, // removexattr
        198, // lremovexattr
        199, // fremovexattr
        217, // getdents64
        235, // utimes
        253, // inotify_init
        254, // inotify_add_watch
        257, // openat
        258, // mkdirat
        259, // mknodat
        260, // fchownat
        261, // futimesat
        262, // newfstatat
        263, // unlinkat
        264, // renameat
        265, // linkat
        266, // symlinkat
        267, // readlinkat
        268, // fchmodat
        269, // faccessat
        280, // utimensat
        294, // inotify_init1
        300, // fanotify_init
        301, // fanotify_mark
        303, // name_to_handle_at
        304, // open_by_handle_at
        316, // renameat2
        332, // statx
        425, // io_uring_setup
        426, // io_uring_enter
        427, // io_uring_register
        428, // open_tree
        429, // move_mount
        430, // fsopen
        431, // fsconfig
        432, // fsmount
        433, // fspick
        437, // openat2
        439, // faccessat2
        442, // mount_setattr
        443, // quotactl_fd
        452, // fchmodat2
    ];

    /// Socket syscalls. Web requests go through the caller instead.
    const NETWORK_SYSCALLS: &[c_uint] = &[
        41,  // socket
        42,  // connect
        43,  // accept
        44,  // sendto
        45,  // recvfrom
        46,  // sendmsg
        47,  // recvmsg
        48,  // shutdown
        49,  // bind
        50,  // listen
        51,  // getsockname
        52,  // getpeername
        53,  // socketpair
        54,  // setsockopt
        55,  // getsockopt
        288, // accept4
        299, // recvmmsg
        307, // sendmmsg
    ];

    /// Syscalls that start programs or reach into other processes, keys or
    /// the kernel.
    const PROCESS_SYSCALLS: &[c_uint] = &[
        59,  // execve
        62,  // kill
        101, // ptrace
        169, // reboot
        175, // init_module
        176, // delete_module
        200, // tkill
        246, // kexec_load
        248, // add_key
        249, // request_key
        250, // keyctl
        272, // unshare
        298, // perf_event_open
        308, // setns
        310, // process_vm_readv
        311, // process_vm_writev
        313, // finit_module
        320, // kexec_file_load
        321, // bpf
        322, // execveat
        424, // pidfd_send_signal
        434, // pidfd_open
        438, // pidfd_getfd
    ];

    #[repr(C)]
    struct SockFilter {
        code: c_ushort,
        jt: c_uchar,
        jf: c_uchar,
        k: c_uint,
    }

    #[repr(C)]
    struct SockFprog {
        len: c_ushort,
        filter: *const SockFilter,
    }

    fn stmt(code: c_ushort, k: c_uint) -> SockFilter {
        SockFilter {
            code,
            jt: 0,
            jf: 0,
            k,
        }
    }

    fn jump(code: c_ushort, k: c_uint, jt: c_uchar, jf: c_uchar) -> SockFilter {
        SockFilter { code, jt, jf, k }
    }

    fn os_error(what: &str) -> String {
        format!("{what} failed: {}", io::Error::last_os_error())
    }

    /// Filter program: foreign architectures are killed, x32 and denied
    /// syscalls fail with `EPERM`, syscalls newer than the lists fail with
    /// `ENOSYS`, everything else is allowed.
    fn filter_program() -> Vec<SockFilter> {
        let deny = SECCOMP_RET_ERRNO | EPERM;
        let mut filters = vec![
            stmt(BPF_LD | BPF_W | BPF_ABS, ARCH_OFFSET),
            jump(BPF_JMP | BPF_JEQ | BPF_K, AUDIT_ARCH_X86_64, 1, 0),
            stmt(BPF_RET | BPF_K, SECCOMP_RET_KILL),
            stmt(BPF_LD | BPF_W | BPF_ABS, SYSCALL_NR_OFFSET),
            jump(BPF_JMP | BPF_JGE | BPF_K, X32_SYSCALL_BIT, 0, 1),
            stmt(BPF_RET | BPF_K, deny),
            jump(BPF_JMP | BPF_JGE | BPF_K, FIRST_UNKNOWN_SYSCALL, 0, 1),
            stmt(BPF_RET | BPF_K, SECCOMP_RET_ERRNO | ENOSYS),
        ];
        let denied = FILESYSTEM_SYSCALLS
            .iter()
            .chain(NETWORK_SYSCALLS)
            .chain(PROCESS_SYSCALLS);
        for nr in denied {
            filters.push(jump(BPF_JMP | BPF_JEQ | BPF_K, *nr, 0, 1));
            filters.push(stmt(BPF_RET | BPF_K, deny));
        }
        filters.push(stmt(BPF_RET | BPF_K, SECCOMP_RET_ALLOW));
        filters
    }

    /// Clears the environment and installs the syscall filter. Runs in the
    /// child before any handler code.
    fn harden() -> Result<(), String> {
        // SAFETY: only the forking thread survives in the child, so nothing
        // else reads the environment concurrently.
        if unsafe { libc::clearenv() } != 0 {
            return Err(os_error("clearenv"));
        }

        // SAFETY: plain prctl call with integer arguments.
        let rc = unsafe {
            libc::prctl(
                libc::PR_SET_NO_NEW_PRIVS,
                1 as c_ulong,
                0 as c_ulong,
                0 as c_ulong,
                0 as c_ulong,
            )
        };
        if rc != 0 {
            return Err(os_error("PR_SET_NO_NEW_PRIVS"));
        }

        let filters = filter_program();
        let prog = SockFprog {
            len: filters.len() as c_ushort,
            filter: filters.as_ptr(),
        };

        // SAFETY: `prog` and `filters` outlive the call; the kernel copies the program.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_seccomp,
                SECCOMP_SET_MODE_FILTER,
                0 as c_uint,
                &prog as *const SockFprog,
            )
        };
        if rc != 0 {
            return Err(os_error("seccomp"));
        }
        Ok(())
    }

    /// Moves the channel pipes onto fds 3 and 4, points stdio at `/dev/null`
    /// and closes every other descriptor inherited from the host.
    fn isolate_descriptors(read: OwnedFd, write: OwnedFd) -> Result<(File, File), String> {
        let (read, write) = (read.into_raw_fd(), write.into_raw_fd());

        // SAFETY: the child owns every descriptor it touches here; the
        // pipes are first copied above the target range so the dup2 calls
        // below cannot clobber them.
        unsafe {
            let high_read = libc::fcntl(read, libc::F_DUPFD, FIRST_CLOSED_FD);
            let high_write = libc::fcntl(write, libc::F_DUPFD, FIRST_CLOSED_FD);
            if high_read < 0 || high_write < 0 {
                return Err(os_error("F_DUPFD"));
            }

            let null = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
            if null < 0 {
                return Err(os_error("open /dev/null"));
            }
            for stdio in 0..3 {
                if libc::dup2(null, stdio) < 0 {
                    return Err(os_error("dup2 stdio"));
                }
            }

            if libc::dup2(high_read, CHANNEL_READ_FD) < 0
                || libc::dup2(high_write, CHANNEL_WRITE_FD) < 0
            {
                return Err(os_error("dup2 channel"));
            }

            close_from(FIRST_CLOSED_FD);
            Ok((
                File::from_raw_fd(CHANNEL_READ_FD),
                File::from_raw_fd(CHANNEL_WRITE_FD),
            ))
        }
    }

    /// Closes every descriptor numbered `first` or above.
    fn close_from(first: RawFd) {
        // SAFETY: close_range only closes descriptors.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_close_range,
                first as c_uint,
                c_uint::MAX,
                0 as c_uint,
            )
        };
        if rc == 0 {
            return;
        }

        // Kernels before 5.9 lack close_range.
        // SAFETY: sysconf has no preconditions.
        let limit: c_long = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
        let limit = if limit > 0 {
            limit.min(1 << 20) as RawFd
        } else {
            1024
        };
        for fd in first..limit {
            // SAFETY: closing an unused descriptor number is harmless.
            unsafe { libc::close(fd) };
        }
    }

    fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        let mut fds = [0 as c_int; 2];
        // SAFETY: `fds` has room for the two descriptors pipe2 writes.
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: both descriptors were just created and are owned by nobody else.
        Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
    }

    pub(super) struct ProcessBoundary {
        channel: FramedChannel<File, File>,
        pid: libc::pid_t,
    }

    impl ProcessBoundary {
        /// Forks the domain process.
        ///
        /// Only the calling thread exists in the child. Locks other host
        /// threads held at the moment of the fork stay held there forever,
        /// so the child never logs through the host's global tracing
        /// dispatcher and relies on the allocator being fork-safe, which the
        /// glibc allocator is. Hosts should create process domains before
        /// starting threads that keep other process-wide locks.
        pub(super) fn spawn(
            handler_type: &HandlerType,
            grant: &CapabilityGrant,
        ) -> Result<Self, HostError> {
            let (parent_read, child_write) = pipe()?;
            let (child_read, parent_write) = pipe()?;

            // SAFETY: the child sets up its descriptors and filter, serves
            // requests on its own pipes and leaves via `_exit`.
            let pid = unsafe { libc::fork() };
            if pid < 0 {
                return Err(io::Error::last_os_error().into());
            }

            if pid == 0 {
                let _quiet = subscriber::set_default(NoSubscriber::default());
                drop(parent_read);
                drop(parent_write);
                let status = match isolate_descriptors(child_read, child_write) {
                    Ok((reader, writer)) => {
                        let mut channel = FramedChannel::new(reader, writer);
                        match harden() {
                            Ok(()) => {
                                serve(handler_type, grant, channel);
                                0
                            }
                            Err(reason) => {
                                let _ = send_message(
                                    &mut channel,
                                    &Reply::Fault(DomainFault::Unavailable(reason)),
                                );
                                1
                            }
                        }
                    }
                    Err(_) => 2,
                };
                // SAFETY: terminates the child without running the parent's atexit handlers.
                unsafe { libc::_exit(status) }
            }

            drop(child_read);
            drop(child_write);
            let mut boundary = Self {
                channel: FramedChannel::new(File::from(parent_read), File::from(parent_write)),
                pid,
            };
            if let Err(err) = handshake(&mut boundary.channel) {
                Box::new(boundary).shutdown();
                return Err(err);
            }
            Ok(boundary)
        }
    }

    impl Boundary for ProcessBoundary {
        fn channel(&mut self) -> &mut dyn Channel {
            &mut self.channel
        }

        fn shutdown(self: Box<Self>) {
            let ProcessBoundary { mut channel, pid } = *self;
            let _ = send_message(&mut channel, &Request::Shutdown);
            drop(channel);

            let mut status: c_int = 0;
            loop {
                // SAFETY: `pid` is our own child and `status` is a valid out pointer.
                let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
                if rc >= 0 {
                    break;
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    warn!(pid, error = %err, "Failed to reap isolation domain process");
                    break;
                }
            }
        }
    }

}
