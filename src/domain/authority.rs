//! # Authority Resolver
//!
//! Parses and normalizes device identifiers and decides whether the local
//! node is authoritative for a given id, or which gateway is. Stateless:
//! reads only the node's gateway table and configuration.

use std::sync::Arc;

use super::gateway_port::{GatewayAdapter, GatewayLookup};
use super::identifier::normalize_device_id;

/// The computed authority for a device id.
#[derive(Clone)]
pub struct AuthorityRecord {
    /// The normalized device id (`<domain>:<name>`, lowercased).
    pub deviceid: String,
    /// The normalized domain, lowercased.
    pub domain: String,
    /// Whether this node is authoritative for `deviceid`.
    pub is_local: bool,
    /// Whether `deviceid` can be routed to a remote node at all (empty-domain
    /// ids never are).
    pub is_routable: bool,
    /// The gateway to delegate to, if this node is not authoritative.
    pub gateway: Option<Arc<dyn GatewayAdapter>>,
    /// Whether resolution succeeded.
    pub is_valid: bool,
    /// Error text, set only when `is_valid` is false.
    pub err: Option<String>,
}

impl std::fmt::Debug for AuthorityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityRecord")
            .field("deviceid", &self.deviceid)
            .field("domain", &self.domain)
            .field("is_local", &self.is_local)
            .field("is_routable", &self.is_routable)
            .field("has_gateway", &self.gateway.is_some())
            .field("is_valid", &self.is_valid)
            .field("err", &self.err)
            .finish()
    }
}

impl AuthorityRecord {
    fn invalid(raw: &str, err: impl Into<String>) -> Self {
        Self {
            deviceid: raw.to_string(),
            domain: String::new(),
            is_local: true,
            is_routable: false,
            gateway: None,
            is_valid: false,
            err: Some(err.into()),
        }
    }
}

/// Resolves a raw device id to an [`AuthorityRecord`].
///
/// Stateless beyond the `default_domain`/`claim_unowned_domains`
/// configuration and the gateway table it is handed at construction.
pub struct AuthorityResolver {
    default_domain: String,
    claim_unowned_domains: bool,
    gateways: Arc<dyn GatewayLookup>,
}

impl AuthorityResolver {
    /// Build a resolver over the given gateway table.
    #[must_use]
    pub fn new(
        default_domain: impl Into<String>,
        claim_unowned_domains: bool,
        gateways: Arc<dyn GatewayLookup>,
    ) -> Self {
        Self {
            default_domain: default_domain.into(),
            claim_unowned_domains,
            gateways,
        }
    }

    /// Resolve a raw device id.
    ///
    /// Empty-domain ids (raw id started with `:`) are always local and
    /// non-routable. Otherwise the domain is looked up in the gateway
    /// table, falling back to the wildcard `*` entry; if a gateway is
    /// found the node is non-authoritative; if none is found, the node is
    /// authoritative only when configured to claim unowned domains.
    #[must_use]
    pub fn resolve(&self, raw_id: &str) -> AuthorityRecord {
        if raw_id.is_empty() {
            return AuthorityRecord::invalid(raw_id, "device id must not be empty");
        }

        let normalized = normalize_device_id(raw_id, &self.default_domain);

        if normalized.is_empty_domain() {
            return AuthorityRecord {
                deviceid: normalized.id,
                domain: normalized.domain,
                is_local: true,
                is_routable: false,
                gateway: None,
                is_valid: true,
                err: None,
            };
        }

        let gateway = self
            .gateways
            .lookup(&normalized.domain)
            .or_else(|| self.gateways.lookup("*"));

        let is_local = gateway.is_none() && self.claim_unowned_domains;

        AuthorityRecord {
            deviceid: normalized.id,
            domain: normalized.domain,
            is_local,
            is_routable: true,
            gateway,
            is_valid: true,
            err: None,
        }
    }
}
