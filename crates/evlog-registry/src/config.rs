//! YAML registry configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ident::{is_valid_token, CLUSTER_ID_LEN};
use crate::{KindRegistry, RegistryError, RegistryResult, DEFAULT_CLUSTER_ID};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindRecord {
    pub prefix: String,
    pub kind: String,
    #[serde(default)]
    pub portable_data_hash: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub kinds: Vec<KindRecord>,
}

impl RegistryConfig {
    pub fn into_registry(self) -> RegistryResult<KindRegistry> {
        let schema_version = self.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(RegistryError::Parse(format!(
                "unsupported schema_version: {schema_version}"
            )));
        }

        let cluster_id = self
            .cluster_id
            .unwrap_or_else(|| DEFAULT_CLUSTER_ID.to_string());
        if !is_valid_token(&cluster_id, CLUSTER_ID_LEN) {
            return Err(RegistryError::Parse(format!(
                "invalid cluster_id: {cluster_id}"
            )));
        }

        let mut registry = KindRegistry::empty(cluster_id);
        let mut content_prefix = None;
        for record in self.kinds {
            registry.register(&record.prefix, &record.kind)?;
            if record.portable_data_hash {
                if let Some(previous) = content_prefix.replace(record.prefix.clone()) {
                    return Err(RegistryError::Parse(format!(
                        "portable_data_hash claimed by both {previous} and {}",
                        record.prefix
                    )));
                }
            }
        }
        if let Some(prefix) = content_prefix {
            registry.set_content_prefix(&prefix)?;
        }
        Ok(registry)
    }
}

pub fn load_registry(path: &Path) -> RegistryResult<KindRegistry> {
    let raw = fs::read_to_string(path)
        .map_err(|e| RegistryError::Io(format!("{}: {e}", path.display())))?;
    let registry = parse_registry(&raw)?;
    tracing::debug!(
        path = %path.display(),
        kinds = registry.len(),
        "loaded kind registry"
    );
    Ok(registry)
}

pub fn parse_registry(raw: &str) -> RegistryResult<KindRegistry> {
    let config: RegistryConfig =
        serde_yml::from_str(raw).map_err(|e| RegistryError::Parse(e.to_string()))?;
    config.into_registry()
}
