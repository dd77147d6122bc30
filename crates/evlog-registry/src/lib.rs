//! Entity-kind registry.
//!
//! Resolves an entity identifier to the kind string of the type that owns
//! it. Resolution never fails: an identifier no registered type claims
//! yields `None`.

pub mod config;
pub mod ident;

use std::collections::BTreeMap;

use thiserror::Error;

pub use config::{load_registry, parse_registry, KindRecord, RegistryConfig};
pub use ident::{is_portable_data_hash, is_valid_token, EntityUuid};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
    #[error("duplicate prefix: {0}")]
    DuplicatePrefix(String),
    #[error("invalid kind for prefix {prefix}: {reason}")]
    InvalidKind { prefix: String, reason: String },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

pub const DEFAULT_CLUSTER_ID: &str = "zzzzz";

const BUILTIN_KINDS: &[(&str, &str)] = &[
    ("4zz18", "arvados#collection"),
    ("tpzed", "arvados#user"),
    ("j7d0g", "arvados#group"),
    ("o0j2j", "arvados#link"),
    ("57u5n", "arvados#log"),
    ("dz642", "arvados#container"),
    ("xvhdp", "arvados#containerRequest"),
    ("7fd4e", "arvados#workflow"),
    ("gj3su", "arvados#apiClientAuthorization"),
    ("ozdt8", "arvados#apiClient"),
    ("7ekkf", "arvados#node"),
    ("8i9sb", "arvados#job"),
    ("d1hrv", "arvados#pipelineInstance"),
    ("p5p6p", "arvados#pipelineTemplate"),
    ("s0uqq", "arvados#repository"),
    ("2x53u", "arvados#virtualMachine"),
    ("fngyi", "arvados#authorizedKey"),
    ("bi6l4", "arvados#keepService"),
    ("j58dm", "arvados#specimen"),
    ("7a9it", "arvados#human"),
    ("q1cn2", "arvados#trait"),
];

const BUILTIN_CONTENT_PREFIX: &str = "4zz18";

/// Snapshot of the known entity types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindRegistry {
    cluster_id: String,
    kinds: BTreeMap<String, String>,
    content_prefix: Option<String>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KindRegistry {
    pub fn empty(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            kinds: BTreeMap::new(),
            content_prefix: None,
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty(DEFAULT_CLUSTER_ID);
        for (prefix, kind) in BUILTIN_KINDS {
            registry
                .kinds
                .insert((*prefix).to_string(), (*kind).to_string());
        }
        registry.content_prefix = Some(BUILTIN_CONTENT_PREFIX.to_string());
        registry
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn register(&mut self, prefix: &str, kind: &str) -> RegistryResult<()> {
        if !is_valid_token(prefix, ident::PREFIX_LEN) {
            return Err(RegistryError::InvalidPrefix(prefix.to_string()));
        }
        if kind.trim().is_empty() {
            return Err(RegistryError::InvalidKind {
                prefix: prefix.to_string(),
                reason: "kind is empty".to_string(),
            });
        }
        if self.kinds.contains_key(prefix) {
            return Err(RegistryError::DuplicatePrefix(prefix.to_string()));
        }
        self.kinds.insert(prefix.to_string(), kind.to_string());
        Ok(())
    }

    /// Routes bare content hashes to the type registered under `prefix`.
    pub fn set_content_prefix(&mut self, prefix: &str) -> RegistryResult<()> {
        if !self.kinds.contains_key(prefix) {
            return Err(RegistryError::InvalidPrefix(prefix.to_string()));
        }
        self.content_prefix = Some(prefix.to_string());
        Ok(())
    }

    pub fn kind_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.kinds.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind_for_uuid(&self, uuid: &str) -> Option<&str> {
        if let Some(parsed) = EntityUuid::parse(uuid) {
            let kind = self.kind_for_prefix(parsed.type_prefix());
            if kind.is_none() {
                tracing::debug!(uuid, prefix = parsed.type_prefix(), "unregistered type prefix");
            }
            return kind;
        }
        if is_portable_data_hash(uuid) {
            return self
                .content_prefix
                .as_deref()
                .and_then(|prefix| self.kind_for_prefix(prefix));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_standard_types() {
        let registry = KindRegistry::builtin();
        assert_eq!(
            registry.kind_for_uuid("zzzzz-tpzed-000000000000000"),
            Some("arvados#user")
        );
        assert_eq!(
            registry.kind_for_uuid("abcde-xvhdp-0123456789abcde"),
            Some("arvados#containerRequest")
        );
    }

    #[test]
    fn unknown_prefix_is_absent() {
        let registry = KindRegistry::builtin();
        assert_eq!(registry.kind_for_uuid("zzzzz-aaaaa-000000000000000"), None);
        assert_eq!(registry.kind_for_uuid("not a uuid"), None);
        assert_eq!(registry.kind_for_uuid(""), None);
    }

    #[test]
    fn content_hash_resolves_to_collection() {
        let registry = KindRegistry::builtin();
        assert_eq!(
            registry.kind_for_uuid("d41d8cd98f00b204e9800998ecf8427e+0"),
            Some("arvados#collection")
        );
        assert_eq!(
            KindRegistry::empty("zzzzz").kind_for_uuid("d41d8cd98f00b204e9800998ecf8427e+0"),
            None
        );
    }

    #[test]
    fn register_rejects_bad_and_duplicate_prefixes() {
        let mut registry = KindRegistry::empty("zzzzz");
        registry.register("abcde", "test#thing").expect("register");

        assert!(matches!(
            registry.register("abcde", "test#other"),
            Err(RegistryError::DuplicatePrefix(_))
        ));
        assert!(matches!(
            registry.register("ABCDE", "test#thing"),
            Err(RegistryError::InvalidPrefix(_))
        ));
        assert!(matches!(
            registry.register("fghij", "  "),
            Err(RegistryError::InvalidKind { .. })
        ));
    }
}
