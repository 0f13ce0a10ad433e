//! Per-entity access configuration.

use std::time::Duration;

use plaza_core::SortOrder;

use crate::whitelist::AccessWhitelist;

/// Key for HMAC-signed cursors. Debug output never prints the bytes.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// How cursors are encoded for the wire.
///
/// `Plain` cursors degrade gracefully: a malformed token means "first
/// page". `Signed` cursors are rejected outright on signature mismatch,
/// which stops clients from fabricating or replaying a modified jump
/// target.
#[derive(Debug, Clone, Default)]
pub enum CursorMode {
    #[default]
    Plain,
    Signed(SigningKey),
}

/// Configuration for one entity's access facade.
///
/// Whether an entity soft-deletes is decided here, once, at construction.
/// The facade never probes the record type at call time.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Cache key prefix, normally the entity name.
    pub cache_prefix: String,
    /// TTL for cached snapshots and pages.
    pub cache_ttl: Duration,
    /// Page size applied when the caller does not specify one.
    pub default_page_size: u32,
    /// Upper bound for caller-supplied page sizes.
    pub max_page_size: u32,
    /// Sort applied when the caller does not specify one.
    pub default_sort: (String, SortOrder),
    /// Capability flag: does this entity soft-delete?
    pub soft_delete: bool,
    /// Cursor encoding for keyset pagination.
    pub cursor_mode: CursorMode,
    /// Allowed relations, fields and sort keys.
    pub whitelist: AccessWhitelist,
}

impl AccessConfig {
    pub fn new(cache_prefix: impl Into<String>) -> Self {
        Self {
            cache_prefix: cache_prefix.into(),
            cache_ttl: Duration::from_secs(300),
            default_page_size: 20,
            max_page_size: 100,
            default_sort: ("created_at".to_string(), SortOrder::Desc),
            soft_delete: false,
            cursor_mode: CursorMode::Plain,
            whitelist: AccessWhitelist::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_page_sizes(mut self, default_size: u32, max: u32) -> Self {
        self.default_page_size = default_size;
        self.max_page_size = max;
        self
    }

    pub fn with_default_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.default_sort = (field.into(), order);
        self
    }

    pub fn with_soft_delete(mut self, supported: bool) -> Self {
        self.soft_delete = supported;
        self
    }

    pub fn with_signed_cursors(mut self, key: SigningKey) -> Self {
        self.cursor_mode = CursorMode::Signed(key);
        self
    }

    pub fn with_whitelist(mut self, whitelist: AccessWhitelist) -> Self {
        self.whitelist = whitelist;
        self
    }
}
