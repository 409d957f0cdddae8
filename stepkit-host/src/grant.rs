//! Capability grants attached to an execution domain.
//!
//! Two presets:
//! - [`CapabilityGrant::sandbox`]: serialization, execution, restricted
//!   member access and outbound HTTP/HTTPS to named, non-local hosts
//! - [`CapabilityGrant::full_trust`]: everything, used by the direct path

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use stepkit_model::{GrantError, Permission};
use url::{Host, Url};

/// The explicit permission set of one execution domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGrant {
    permissions: BTreeSet<Permission>,
    /// Outbound requests are limited to named, non-local hosts.
    restrict_web_hosts: bool,
}

impl CapabilityGrant {
    pub fn sandbox() -> Self {
        Self {
            permissions: [
                Permission::Serialization,
                Permission::Execution,
                Permission::RestrictedMemberAccess,
                Permission::WebAccess,
            ]
            .into_iter()
            .collect(),
            restrict_web_hosts: true,
        }
    }

    pub fn full_trust() -> Self {
        Self {
            permissions: Permission::ALL.into_iter().collect(),
            restrict_web_hosts: false,
        }
    }

    pub fn is_granted(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_full_trust(&self) -> bool {
        !self.restrict_web_hosts && Permission::ALL.iter().all(|p| self.is_granted(*p))
    }

    pub fn permissions(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }

    /// Removes `permission` from the grant.
    pub fn revoke(&mut self, permission: Permission) {
        self.permissions.remove(&permission);
    }

    pub fn demand(&self, permission: Permission) -> Result<(), GrantError> {
        if self.is_granted(permission) {
            Ok(())
        } else {
            Err(GrantError::PermissionDenied(permission))
        }
    }

    /// Checks an outbound request against the grant.
    ///
    /// Under the sandbox preset only `http`/`https` URLs whose host is a DNS
    /// name are allowed, and the name must not be `localhost` or a
    /// `.localhost` subdomain. IP literals are refused in every spelling
    /// (bracketed IPv6, dotted, bare decimal or hex IPv4).
    pub fn authorize_web_request(&self, url: &str) -> Result<(), GrantError> {
        self.demand(Permission::WebAccess)?;
        if !self.restrict_web_hosts {
            return Ok(());
        }

        let deny = |reason: &str| GrantError::WebRequestDenied {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|err| deny(&err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(deny("only http and https are allowed"));
        }

        match parsed.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                if domain == "localhost" || domain.ends_with(".localhost") {
                    Err(deny("local hosts are not allowed"))
                } else {
                    Ok(())
                }
            }
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => Err(deny("IP address hosts are not allowed")),
            None => Err(deny("a host name is required")),
        }
    }
}

impl Default for CapabilityGrant {
    fn default() -> Self {
        Self::sandbox()
    }
}
