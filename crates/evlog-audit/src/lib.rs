//! Log entry model and baseline record types.
//!
//! A [`LogEntry`] describes one mutation of some other entity. Its fields
//! carry their own write rules: `object_uuid`, `summary` and `id` are
//! first-write-wins, `object_owner_uuid` is last-write-wins, and
//! `properties` only ever grows or overwrites single keys.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind reported for log entries themselves.
pub const LOG_KIND: &str = "arvados#log";

/// Type infix used in log entry identifiers.
pub const LOG_TYPE_PREFIX: &str = "57u5n";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Create,
    Update,
    Destroy,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        match value {
            "create" => Self::Create,
            "update" => Self::Update,
            "destroy" => Self::Destroy,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "create" | "update" | "destroy" => Self::from(value.as_str()),
            _ => Self::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single value in the property bag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Text(String),
    Document(Value),
}

impl PropertyValue {
    pub fn text(value: Option<impl Into<String>>) -> Self {
        value.map_or(Self::Null, |v| Self::Text(v.into()))
    }

    /// `None` and JSON `null` both collapse to [`PropertyValue::Null`].
    pub fn document(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Null,
            Some(doc) => Self::Document(doc),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(text) => Value::String(text.clone()),
            Self::Document(doc) => doc.clone(),
        }
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    object_uuid: Option<String>,
    #[serde(default)]
    object_owner_uuid: Option<String>,
    event_type: EventType,
    #[serde(default)]
    event_at: Option<DateTime<Utc>>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    properties: Properties,
}

impl LogEntry {
    pub fn new(event_type: impl Into<EventType>) -> Self {
        Self {
            id: None,
            object_uuid: None,
            object_owner_uuid: None,
            event_type: event_type.into(),
            event_at: None,
            summary: None,
            properties: Properties::new(),
        }
    }

    pub fn with_object_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.default_object_uuid(uuid);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.default_summary(summary);
        self
    }

    pub fn with_event_at(mut self, at: DateTime<Utc>) -> Self {
        self.event_at = Some(at);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn object_uuid(&self) -> Option<&str> {
        self.object_uuid.as_deref()
    }

    pub fn object_owner_uuid(&self) -> Option<&str> {
        self.object_owner_uuid.as_deref()
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn event_at(&self) -> Option<DateTime<Utc>> {
        self.event_at
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Assigns the identifier. Returns `false` and leaves the entry untouched
    /// when an id is already present.
    pub fn assign_id(&mut self, id: impl Into<String>) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id.into());
        true
    }

    /// Sets `object_uuid` only if it is still unset.
    pub fn default_object_uuid(&mut self, uuid: impl Into<String>) {
        if self.object_uuid.is_none() {
            self.object_uuid = Some(uuid.into());
        }
    }

    pub fn set_object_owner_uuid(&mut self, owner: Option<String>) {
        self.object_owner_uuid = owner;
    }

    /// Sets `summary` only if it is still unset.
    pub fn default_summary(&mut self, summary: impl Into<String>) {
        if self.summary.is_none() {
            self.summary = Some(summary.into());
        }
    }

    pub fn set_event_at(&mut self, at: DateTime<Utc>) {
        self.event_at = Some(at);
    }

    /// Sets `event_at` only if it is still unset.
    pub fn default_event_at(&mut self, at: DateTime<Utc>) {
        self.event_at.get_or_insert(at);
    }

    /// Merges `updates` into the property bag key by key.
    pub fn merge_properties<I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (String, PropertyValue)>,
    {
        self.properties.extend(updates);
    }

    /// Public JSON representation. `object_kind` is computed by the caller
    /// at read time and never stored.
    pub fn api_view(&self, object_kind: Option<&str>) -> Value {
        let mut view = Map::new();
        view.insert("uuid".to_string(), opt_string(self.id()));
        view.insert("kind".to_string(), Value::String(LOG_KIND.to_string()));
        view.insert("object_uuid".to_string(), opt_string(self.object_uuid()));
        view.insert(
            "object_owner_uuid".to_string(),
            opt_string(self.object_owner_uuid()),
        );
        view.insert("object_kind".to_string(), opt_string(object_kind));
        view.insert(
            "event_at".to_string(),
            self.event_at.map_or(Value::Null, |at| {
                Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
            }),
        );
        view.insert(
            "event_type".to_string(),
            Value::String(self.event_type.to_string()),
        );
        view.insert("summary".to_string(), opt_string(self.summary()));
        view.insert(
            "properties".to_string(),
            Value::Object(
                self.properties
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        );
        Value::Object(view)
    }
}

fn opt_string(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn event_type_round_trips_through_strings() {
        assert_eq!(EventType::from("create"), EventType::Create);
        assert_eq!(
            EventType::from("stderr".to_string()),
            EventType::Other("stderr".to_string())
        );
        assert_eq!(String::from(EventType::Destroy), "destroy");
    }

    #[test]
    fn object_uuid_and_summary_are_first_write_wins() {
        let mut entry = LogEntry::new("update").with_object_uuid("a").with_summary("custom");
        entry.default_object_uuid("b");
        entry.default_summary("update of b");

        assert_eq!(entry.object_uuid(), Some("a"));
        assert_eq!(entry.summary(), Some("custom"));
    }

    #[test]
    fn id_is_assigned_once() {
        let mut entry = LogEntry::new("create");
        assert!(entry.assign_id("zzzzz-57u5n-000000000000001"));
        assert!(!entry.assign_id("zzzzz-57u5n-000000000000002"));
        assert_eq!(entry.id(), Some("zzzzz-57u5n-000000000000001"));
    }

    #[test]
    fn merge_keeps_unrelated_keys() {
        let mut entry = LogEntry::new("update");
        entry.merge_properties([("a".to_string(), PropertyValue::Text("1".to_string()))]);
        entry.merge_properties([("b".to_string(), PropertyValue::Null)]);

        assert_eq!(entry.properties().len(), 2);
        assert_eq!(
            entry.property("a"),
            Some(&PropertyValue::Text("1".to_string()))
        );
    }

    #[test]
    fn document_collapses_json_null() {
        assert!(PropertyValue::document(Some(Value::Null)).is_null());
        assert!(PropertyValue::document(None).is_null());
        assert!(PropertyValue::text(None::<String>).is_null());
    }

    #[test]
    fn property_values_deserialize_by_shape() {
        let props: Properties =
            serde_json::from_value(json!({"x": null, "y": "etag", "z": {"a": 1}}))
                .expect("properties");

        assert_eq!(props["x"], PropertyValue::Null);
        assert_eq!(props["y"], PropertyValue::Text("etag".to_string()));
        assert_eq!(props["z"], PropertyValue::Document(json!({"a": 1})));
    }

    #[test]
    fn api_view_exposes_computed_kind() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("ts");
        let entry = LogEntry::new("create")
            .with_object_uuid("zzzzz-4zz18-aaaaaaaaaaaaaaa")
            .with_event_at(at);

        let view = entry.api_view(Some("arvados#collection"));
        assert_eq!(view["kind"], json!(LOG_KIND));
        assert_eq!(view["object_kind"], json!("arvados#collection"));
        assert_eq!(view["event_at"], json!("2024-03-01T12:00:00.000000Z"));
        assert_eq!(view["event_type"], json!("create"));
        assert_eq!(view["uuid"], Value::Null);
    }
}
