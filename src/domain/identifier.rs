//! Device identifier normalization.
//!
//! A device id is a string `<domain>:<name>`. The domain part is optional:
//! if no colon appears, the configured default domain is prepended; if the
//! string starts with a colon, the domain is empty and denotes a local,
//! non-routed namespace. All ids are normalized to lowercase.

/// A normalized device id, split into its domain and name parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedId {
    /// The full `<domain>:<name>` string, lowercased.
    pub id: String,
    /// The domain part, lowercased. Empty for a local, non-routed id.
    pub domain: String,
    /// The name part, lowercased.
    pub name: String,
}

impl NormalizedId {
    /// Whether this id denotes a local, non-routed namespace (the raw id
    /// started with a colon, so the domain is empty).
    #[must_use]
    pub fn is_empty_domain(&self) -> bool {
        self.domain.is_empty()
    }
}

/// Normalize a raw device id.
///
/// Normalization is idempotent: calling this again on an already
/// normalized id's `id` field yields the same `NormalizedId`.
#[must_use]
pub fn normalize_device_id(raw: &str, default_domain: &str) -> NormalizedId {
    let lowered = raw.to_lowercase();

    let (domain, name) = match lowered.split_once(':') {
        // "<domain>:<name>" — use the given domain verbatim (possibly empty
        // when the raw id started with a colon, e.g. ":local-name").
        Some((domain, name)) => (domain.to_string(), name.to_string()),
        // No colon at all — prepend the default domain.
        None => (default_domain.to_lowercase(), lowered.clone()),
    };

    let id = format!("{domain}:{name}");
    NormalizedId { id, domain, name }
}
