//! Field derivation for log entries.

use evlog_audit::{EventType, LogEntry, PropertyValue};
use evlog_registry::KindRegistry;
use serde_json::Value;

use crate::clock::Clock;
use crate::subject::Loggable;

/// Resolves the kind of the entity an entry describes. Computed on every
/// read against the given registry snapshot.
pub fn object_kind(entry: &LogEntry, registry: &KindRegistry) -> Option<String> {
    entry
        .object_uuid()
        .and_then(|uuid| registry.kind_for_uuid(uuid))
        .map(str::to_string)
}

/// Pre-persistence validation hook: fills `event_at` when still unset.
pub fn set_default_event_at(entry: &mut LogEntry, clock: &dyn Clock) {
    entry.default_event_at(clock.now());
}

pub struct EventLogRecorder<C: Clock> {
    clock: C,
    registry: KindRegistry,
}

impl<C: Clock> EventLogRecorder<C> {
    pub fn new(clock: C, registry: KindRegistry) -> Self {
        Self { clock, registry }
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Captures identity, ownership and a default summary from `subject`.
    pub fn fill_object<'e>(
        &self,
        entry: &'e mut LogEntry,
        subject: &dyn Loggable,
    ) -> &'e mut LogEntry {
        entry.default_object_uuid(subject.uuid());
        entry.set_object_owner_uuid(subject.owner_uuid().map(str::to_string));
        let summary = format!("{} of {}", entry.event_type(), subject.uuid());
        entry.default_summary(summary);
        tracing::debug!(
            object_uuid = entry.object_uuid().unwrap_or_default(),
            event_type = %entry.event_type(),
            "filled log object"
        );
        entry
    }

    /// Merges `{age}_etag` and `{age}_attributes` into the property bag.
    pub fn fill_properties<'e>(
        &self,
        entry: &'e mut LogEntry,
        age: &str,
        etag: Option<String>,
        attributes: Option<Value>,
    ) -> &'e mut LogEntry {
        entry.merge_properties([
            (format!("{age}_etag"), PropertyValue::text(etag)),
            (
                format!("{age}_attributes"),
                PropertyValue::document(attributes),
            ),
        ]);
        entry
    }

    /// Records the subject's current state as the `new` properties and
    /// derives `event_at` from the event type. A `None` subject stands for
    /// an entity that no longer exists.
    pub fn update_to<'e>(
        &self,
        entry: &'e mut LogEntry,
        subject: Option<&dyn Loggable>,
    ) -> &'e mut LogEntry {
        let etag = subject.and_then(|s| s.etag());
        let attributes = subject.and_then(|s| s.logged_attributes());
        self.fill_properties(entry, "new", etag, attributes);

        let event_type = entry.event_type().clone();
        match (event_type, subject) {
            (EventType::Create, Some(subject)) => entry.set_event_at(subject.created_at()),
            (EventType::Update, Some(subject)) => entry.set_event_at(subject.modified_at()),
            // the subject's own timestamps are stale once it is gone
            (EventType::Destroy, _) => entry.set_event_at(self.clock.now()),
            _ => {}
        }
        entry
    }

    pub fn set_default_event_at(&self, entry: &mut LogEntry) {
        set_default_event_at(entry, &self.clock);
    }

    pub fn object_kind(&self, entry: &LogEntry) -> Option<String> {
        object_kind(entry, &self.registry)
    }

    pub fn api_view(&self, entry: &LogEntry) -> Value {
        entry.api_view(self.object_kind(entry).as_deref())
    }
}
