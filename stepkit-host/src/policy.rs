//! Host policy engine: reads `~/.stepkit/policy.toml` and applies
//! admin-managed handler allowlists, isolation overrides and permission
//! restrictions.

use crate::grant::CapabilityGrant;
use crate::sandbox::BoundaryKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use stepkit_model::Permission;
use stepkit_types::IsolationMode;
use tracing::{info, warn};

/// Which handler types may be hosted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Only listed handlers run.
    Allowlist,
    /// Every handler except the listed ones runs.
    Denylist,
    #[default]
    Unrestricted,
}

/// Policy configuration parsed from `policy.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub mode: PolicyMode,
    /// Handler names the mode applies to.
    #[serde(default)]
    pub handlers: Vec<String>,
    /// Overrides the isolation choice of every container.
    #[serde(default)]
    pub forced_isolation: Option<IsolationMode>,
    /// Boundary used for sandboxed handlers.
    #[serde(default)]
    pub boundary: Option<BoundaryKind>,
    /// Permissions stripped from every grant.
    #[serde(default)]
    pub denied_permissions: BTreeSet<Permission>,
    /// Mirror every handler trace line to the process log at debug level.
    #[serde(default)]
    pub mirror_trace: bool,
}

/// Enforces host policy decisions.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    config: PolicyConfig,
    policy_path: Option<PathBuf>,
}

impl PolicyEngine {
    /// Loads policy from `~/.stepkit/policy.toml` if it exists.
    /// Falls back to unrestricted mode with a warning on read or parse errors.
    pub fn load() -> Self {
        Self::load_from(dirs_path().join("policy.toml"))
    }

    /// Loads policy from `policy_path`. A missing file means no policy; an
    /// unreadable or malformed one is logged and treated as unrestricted.
    pub fn load_from(policy_path: PathBuf) -> Self {
        if !policy_path.exists() {
            info!(path = %policy_path.display(), "No host policy file, handlers run unrestricted");
            return Self::default();
        }

        let parsed = std::fs::read_to_string(&policy_path)
            .map_err(|e| format!("unreadable: {e}"))
            .and_then(|contents| {
                toml::from_str::<PolicyFile>(&contents).map_err(|e| format!("malformed: {e}"))
            });

        let config = match parsed {
            Ok(file) => {
                info!(path = %policy_path.display(), "Loaded host policy");
                file.into_config()
            }
            Err(reason) => {
                warn!(
                    path = %policy_path.display(),
                    "Host policy file {reason}; falling back to unrestricted mode"
                );
                PolicyConfig::default()
            }
        };

        Self {
            config,
            policy_path: Some(policy_path),
        }
    }

    /// Creates a policy engine with explicit config.
    pub fn with_config(config: PolicyConfig) -> Self {
        Self {
            config,
            policy_path: None,
        }
    }

    pub fn is_handler_allowed(&self, handler: &str) -> bool {
        let listed = self.config.handlers.iter().any(|name| name == handler);
        match self.config.mode {
            PolicyMode::Unrestricted => true,
            PolicyMode::Allowlist => listed,
            PolicyMode::Denylist => !listed,
        }
    }

    pub fn forced_isolation(&self) -> Option<IsolationMode> {
        self.config.forced_isolation
    }

    pub fn boundary(&self) -> BoundaryKind {
        self.config.boundary.unwrap_or_default()
    }

    pub fn is_permission_denied(&self, permission: Permission) -> bool {
        self.config.denied_permissions.contains(&permission)
    }

    /// Strips every policy-denied permission from `grant`.
    pub fn restrict(&self, mut grant: CapabilityGrant) -> CapabilityGrant {
        for permission in &self.config.denied_permissions {
            grant.revoke(*permission);
        }
        grant
    }

    pub fn mirror_trace(&self) -> bool {
        self.config.mirror_trace
    }

    /// Returns whether a policy file was found.
    pub fn has_policy_file(&self) -> bool {
        self.policy_path.is_some()
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

/// On-disk layout: everything lives under `[policy]`.
#[derive(Deserialize)]
struct PolicyFile {
    #[serde(default)]
    policy: PolicySection,
}

#[derive(Deserialize, Default)]
struct PolicySection {
    #[serde(default)]
    mode: PolicyMode,
    #[serde(default)]
    handlers: HandlerList,
    #[serde(default)]
    isolation: IsolationSection,
    #[serde(default, rename = "denied-permissions")]
    denied_permissions: DeniedPermissions,
    #[serde(default)]
    trace: TraceSection,
}

#[derive(Deserialize, Default)]
struct HandlerList {
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Deserialize, Default)]
struct IsolationSection {
    #[serde(default)]
    mode: Option<IsolationMode>,
    #[serde(default)]
    boundary: Option<BoundaryKind>,
}

#[derive(Deserialize, Default)]
struct DeniedPermissions {
    #[serde(default)]
    network: bool,
    #[serde(default)]
    filesystem: bool,
    #[serde(default)]
    environment: bool,
    #[serde(default)]
    registry: bool,
    #[serde(default, rename = "event-log")]
    event_log: bool,
    #[serde(default, rename = "network-information")]
    network_information: bool,
}

#[derive(Deserialize, Default)]
struct TraceSection {
    #[serde(default)]
    mirror: bool,
}

impl PolicyFile {
    fn into_config(self) -> PolicyConfig {
        let flags = &self.policy.denied_permissions;
        let denied_permissions = [
            (flags.network, Permission::WebAccess),
            (flags.filesystem, Permission::FileIo),
            (flags.environment, Permission::Environment),
            (flags.registry, Permission::Registry),
            (flags.event_log, Permission::EventLog),
            (flags.network_information, Permission::NetworkInformation),
        ]
        .into_iter()
        .filter_map(|(denied, permission)| denied.then_some(permission))
        .collect();

        PolicyConfig {
            mode: self.policy.mode,
            handlers: self.policy.handlers.names,
            forced_isolation: self.policy.isolation.mode,
            boundary: self.policy.isolation.boundary,
            denied_permissions,
            mirror_trace: self.policy.trace.mirror,
        }
    }
}

/// `$HOME/.stepkit`, falling back to `USERPROFILE` on hosts without `HOME`.
fn dirs_path() -> PathBuf {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .find_map(|var| std::env::var_os(var))
        .map(|home| Path::new(&home).join(".stepkit"))
        .unwrap_or_else(|| PathBuf::from(".stepkit"))
}
