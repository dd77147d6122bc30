//! The contract a tracked entity exposes to the recorder, plus a generic
//! JSON-backed implementation of it.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::base36;

/// Anything whose mutations are written to the audit log.
///
/// `etag` and `logged_attributes` return `None` once the entity has been
/// deleted.
pub trait Loggable {
    fn uuid(&self) -> &str;
    fn owner_uuid(&self) -> Option<&str>;
    fn created_at(&self) -> DateTime<Utc>;
    fn modified_at(&self) -> DateTime<Utc>;
    fn etag(&self) -> Option<String>;
    fn logged_attributes(&self) -> Option<Value>;

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            etag: self.etag(),
            attributes: self.logged_attributes(),
        }
    }
}

/// Point-in-time copy of an entity's tag and attributes, taken before a
/// mutation so the entry can carry the `old_*` properties.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub etag: Option<String>,
    pub attributes: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uuid: String,
    #[serde(default)]
    pub owner_uuid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(skip)]
    deleted: bool,
}

impl Resource {
    pub fn new(
        uuid: impl Into<String>,
        owner_uuid: Option<String>,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            owner_uuid,
            created_at,
            modified_at,
            attributes: Map::new(),
            deleted: false,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn attribute_document(&self) -> Map<String, Value> {
        let mut doc = self.attributes.clone();
        doc.insert("uuid".to_string(), Value::String(self.uuid.clone()));
        doc.insert(
            "owner_uuid".to_string(),
            self.owner_uuid.clone().map_or(Value::Null, Value::String),
        );
        doc.insert("created_at".to_string(), timestamp(self.created_at));
        doc.insert("modified_at".to_string(), timestamp(self.modified_at));
        doc
    }
}

impl Loggable for Resource {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn owner_uuid(&self) -> Option<&str> {
        self.owner_uuid.as_deref()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    fn etag(&self) -> Option<String> {
        if self.deleted {
            return None;
        }
        let document = Value::Object(self.attribute_document());
        let rendered = serde_json::to_string(&SortedKeys(&document)).ok()?;
        let digest = Sha256::digest(rendered.as_bytes());
        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(&digest[..16]);
        Some(base36(u128::from_be_bytes(prefix)))
    }

    fn logged_attributes(&self) -> Option<Value> {
        if self.deleted {
            return None;
        }
        Some(Value::Object(self.attribute_document()))
    }
}

/// Serializes a document with object keys in sorted order at every depth,
/// whatever ordering the underlying map keeps.
struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => serializer.collect_map(
                map.iter()
                    .map(|(key, value)| (key, SortedKeys(value)))
                    .collect::<BTreeMap<_, _>>(),
            ),
            Value::Array(items) => serializer.collect_seq(items.iter().map(SortedKeys)),
            scalar => scalar.serialize(serializer),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn resource() -> Resource {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single().expect("ts");
        Resource::new(
            "zzzzz-4zz18-000000000000001",
            Some("zzzzz-tpzed-000000000000001".to_string()),
            at,
            at,
        )
        .with_attribute("name", json!("reads"))
    }

    #[test]
    fn etag_tracks_attribute_changes() {
        let a = resource();
        let b = resource().with_attribute("name", json!("reads v2"));

        assert_eq!(a.etag(), resource().etag());
        assert_ne!(a.etag(), b.etag());
    }

    #[test]
    fn etag_ignores_attribute_insertion_order() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single().expect("ts");
        let forward = Resource::new("zzzzz-4zz18-000000000000001", None, at, at)
            .with_attribute("name", json!("reads"))
            .with_attribute("properties", json!({"lane": 1, "flowcell": "A"}));
        let reversed = Resource::new("zzzzz-4zz18-000000000000001", None, at, at)
            .with_attribute("properties", json!({"flowcell": "A", "lane": 1}))
            .with_attribute("name", json!("reads"));

        assert!(forward.etag().is_some());
        assert_eq!(forward.etag(), reversed.etag());
    }

    #[test]
    fn sorted_rendering_orders_nested_keys() {
        let doc = json!({"b": [{"z": 1, "a": 2}], "a": null});
        let rendered = serde_json::to_string(&SortedKeys(&doc)).expect("render");
        assert_eq!(rendered, r#"{"a":null,"b":[{"a":2,"z":1}]}"#);
    }

    #[test]
    fn logged_attributes_include_identity_fields() {
        let attrs = resource().logged_attributes().expect("attrs");
        assert_eq!(attrs["uuid"], json!("zzzzz-4zz18-000000000000001"));
        assert_eq!(attrs["owner_uuid"], json!("zzzzz-tpzed-000000000000001"));
        assert_eq!(attrs["created_at"], json!("2024-05-06T07:08:09.000000Z"));
        assert_eq!(attrs["name"], json!("reads"));
    }

    #[test]
    fn deleted_resource_reports_no_state() {
        let mut gone = resource();
        gone.mark_deleted();

        assert_eq!(gone.snapshot(), StateSnapshot::default());
        assert_eq!(gone.uuid(), "zzzzz-4zz18-000000000000001");
    }

    #[test]
    fn deserializes_extra_fields_as_attributes() {
        let parsed: Resource = serde_json::from_value(json!({
            "uuid": "zzzzz-j7d0g-000000000000001",
            "created_at": "2024-01-01T00:00:00Z",
            "modified_at": "2024-01-02T00:00:00Z",
            "group_class": "project"
        }))
        .expect("resource");

        assert_eq!(parsed.owner_uuid(), None);
        assert_eq!(parsed.attributes.get("group_class"), Some(&json!("project")));
        assert!(!parsed.is_deleted());
    }
}
