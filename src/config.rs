//! # Node Configuration
//!
//! Recognized options, matching the peer wire protocol's expectations of a
//! node: the domains a node claims authority for, the default domain
//! applied to colon-less device ids, and whether the node claims domains
//! that have no registered gateway.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::Node`].
///
/// Built with [`NodeConfig::builder`], mirroring the builder pattern used
/// throughout this codebase's service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Domains this node claims authority for.
    ///
    /// Currently advisory: the resolver falls back on the
    /// claim-if-no-gateway rule regardless of this list's contents.
    pub domains: Vec<String>,
    /// Domain prepended to a raw device id that has no colon.
    pub default_domain: String,
    /// Whether this node is authoritative for any domain that has no
    /// registered gateway.
    pub claim_unowned_domains: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            default_domain: ".".to_string(),
            claim_unowned_domains: true,
        }
    }
}

impl NodeConfig {
    /// Start building a new configuration.
    #[must_use]
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }
}

/// Builder for [`NodeConfig`].
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    domains: Vec<String>,
    default_domain: Option<String>,
    claim_unowned_domains: Option<bool>,
}

impl NodeConfigBuilder {
    /// Add a domain this node claims authority for.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }

    /// Set the default domain applied to colon-less device ids.
    #[must_use]
    pub fn default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = Some(domain.into());
        self
    }

    /// Set whether this node claims domains with no registered gateway.
    #[must_use]
    pub fn claim_unowned_domains(mut self, claim: bool) -> Self {
        self.claim_unowned_domains = Some(claim);
        self
    }

    /// Build the final configuration.
    #[must_use]
    pub fn build(self) -> NodeConfig {
        let defaults = NodeConfig::default();
        NodeConfig {
            domains: self.domains,
            default_domain: self.default_domain.unwrap_or(defaults.default_domain),
            claim_unowned_domains: self
                .claim_unowned_domains
                .unwrap_or(defaults.claim_unowned_domains),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_domain_defaults_to_dot() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.default_domain, ".");
        assert!(cfg.claim_unowned_domains);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = NodeConfig::builder()
            .domain("kitchen")
            .default_domain("home")
            .claim_unowned_domains(false)
            .build();
        assert_eq!(cfg.domains, vec!["kitchen".to_string()]);
        assert_eq!(cfg.default_domain, "home");
        assert!(!cfg.claim_unowned_domains);
    }
}
