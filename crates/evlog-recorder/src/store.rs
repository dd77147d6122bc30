//! Persistence layer for log entries.
//!
//! Every mutation is checked against the policy engine first. Creation
//! runs the default-timestamp hook, requires `object_uuid` and assigns the
//! identifier. The referenced object is never checked for existence: an
//! entry routinely outlives the entity it describes.

use std::sync::Mutex;

use evlog_audit::{LogEntry, LOG_TYPE_PREFIX};
use evlog_policy_engine::{Actor, LogAction, PolicyDecision, PolicyEngine};

use crate::clock::Clock;
use crate::recorder::set_default_event_at;
use crate::{base36, RecorderError, RecorderResult};

const SUFFIX_SPACE: u128 = 36u128.pow(15);

/// `<cluster>-57u5n-<15 random base36 chars>`.
pub fn generate_log_id(cluster_id: &str) -> String {
    let suffix = base36(uuid::Uuid::new_v4().as_u128() % SUFFIX_SPACE);
    format!("{cluster_id}-{LOG_TYPE_PREFIX}-{suffix:0>15}")
}

pub trait LogStore: Send + Sync {
    fn insert(&self, entry: LogEntry) -> RecorderResult<()>;
    fn replace(&self, entry: LogEntry) -> RecorderResult<()>;
    fn remove(&self, id: &str) -> RecorderResult<LogEntry>;
    fn get(&self, id: &str) -> RecorderResult<Option<LogEntry>>;
    fn list(&self) -> RecorderResult<Vec<LogEntry>>;
}

/// Insertion-ordered in-memory store.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogStore {
    fn lock(&self) -> RecorderResult<std::sync::MutexGuard<'_, Vec<LogEntry>>> {
        self.entries
            .lock()
            .map_err(|_| RecorderError::Store("log store lock poisoned".to_string()))
    }
}

fn position(entries: &[LogEntry], id: &str) -> Option<usize> {
    entries.iter().position(|entry| entry.id() == Some(id))
}

impl LogStore for MemoryLogStore {
    fn insert(&self, entry: LogEntry) -> RecorderResult<()> {
        let id = entry.id().ok_or(RecorderError::MissingRequiredField("id"))?;
        let mut entries = self.lock()?;
        if position(&entries, id).is_some() {
            return Err(RecorderError::Store(format!("duplicate id: {id}")));
        }
        entries.push(entry);
        Ok(())
    }

    fn replace(&self, entry: LogEntry) -> RecorderResult<()> {
        let id = entry.id().ok_or(RecorderError::MissingRequiredField("id"))?;
        let mut entries = self.lock()?;
        let idx =
            position(&entries, id).ok_or_else(|| RecorderError::NotFound(id.to_string()))?;
        entries[idx] = entry;
        Ok(())
    }

    fn remove(&self, id: &str) -> RecorderResult<LogEntry> {
        let mut entries = self.lock()?;
        let idx =
            position(&entries, id).ok_or_else(|| RecorderError::NotFound(id.to_string()))?;
        Ok(entries.remove(idx))
    }

    fn get(&self, id: &str) -> RecorderResult<Option<LogEntry>> {
        let entries = self.lock()?;
        Ok(position(&entries, id).map(|idx| entries[idx].clone()))
    }

    fn list(&self) -> RecorderResult<Vec<LogEntry>> {
        Ok(self.lock()?.clone())
    }
}

pub struct LogRepository<P, S, C>
where
    P: PolicyEngine,
    S: LogStore,
    C: Clock,
{
    policy: P,
    store: S,
    clock: C,
    cluster_id: String,
}

impl<P, S, C> LogRepository<P, S, C>
where
    P: PolicyEngine,
    S: LogStore,
    C: Clock,
{
    pub fn new(policy: P, store: S, clock: C, cluster_id: impl Into<String>) -> Self {
        Self {
            policy,
            store,
            clock,
            cluster_id: cluster_id.into(),
        }
    }

    fn authorize(&self, actor: &Actor, action: LogAction) -> RecorderResult<()> {
        match self.policy.decide(actor, action)? {
            PolicyDecision::Allow { .. } => Ok(()),
            PolicyDecision::Deny { reason_code } => Err(RecorderError::PermissionDenied {
                action,
                reason: reason_code,
            }),
        }
    }

    fn validate(&self, entry: &mut LogEntry) -> RecorderResult<()> {
        set_default_event_at(entry, &self.clock);
        if entry.object_uuid().is_none() {
            return Err(RecorderError::MissingRequiredField("object_uuid"));
        }
        Ok(())
    }

    pub fn create(&self, actor: &Actor, mut entry: LogEntry) -> RecorderResult<LogEntry> {
        self.authorize(actor, LogAction::Create)?;
        self.validate(&mut entry)?;
        entry.assign_id(generate_log_id(&self.cluster_id));
        self.store.insert(entry.clone())?;
        tracing::info!(
            id = entry.id().unwrap_or_default(),
            object_uuid = entry.object_uuid().unwrap_or_default(),
            event_type = %entry.event_type(),
            "log entry created"
        );
        Ok(entry)
    }

    /// Applies `changes` on top of the stored entry. The stored `id`,
    /// `object_uuid`, `event_type` and `summary` stay; the owner and
    /// `event_at` follow `changes`; properties are merged key by key.
    pub fn update(&self, actor: &Actor, changes: LogEntry) -> RecorderResult<LogEntry> {
        self.authorize(actor, LogAction::Update)?;
        let id = changes.id().ok_or(RecorderError::MissingRequiredField("id"))?;
        let mut entry = self.get(id)?;
        if changes
            .object_uuid()
            .is_some_and(|uuid| Some(uuid) != entry.object_uuid())
        {
            return Err(RecorderError::ImmutableField("object_uuid"));
        }

        entry.set_object_owner_uuid(changes.object_owner_uuid().map(str::to_string));
        if let Some(summary) = changes.summary() {
            entry.default_summary(summary);
        }
        if let Some(at) = changes.event_at() {
            entry.set_event_at(at);
        }
        entry.merge_properties(changes.properties().clone());
        self.validate(&mut entry)?;
        self.store.replace(entry.clone())?;
        tracing::info!(id = entry.id().unwrap_or_default(), "log entry updated");
        Ok(entry)
    }

    pub fn delete(&self, actor: &Actor, id: &str) -> RecorderResult<LogEntry> {
        self.authorize(actor, LogAction::Delete)?;
        let removed = self.store.remove(id)?;
        tracing::info!(id, "log entry deleted");
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> RecorderResult<LogEntry> {
        self.store
            .get(id)?
            .ok_or_else(|| RecorderError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> RecorderResult<Vec<LogEntry>> {
        self.store.list()
    }
}

#[cfg(test)]
mod tests {
    use evlog_registry::EntityUuid;

    use super::*;

    #[test]
    fn generated_ids_are_log_uuids() {
        let id = generate_log_id("abcde");
        let parsed = EntityUuid::parse(&id).expect("well-formed id");

        assert_eq!(parsed.cluster_id(), "abcde");
        assert_eq!(parsed.type_prefix(), LOG_TYPE_PREFIX);
        assert_ne!(id, generate_log_id("abcde"));
    }

    #[test]
    fn memory_store_rejects_duplicates_and_unknown_ids() {
        let store = MemoryLogStore::default();
        let mut entry = LogEntry::new("create").with_object_uuid("x-1");
        entry.assign_id("zzzzz-57u5n-000000000000001");

        store.insert(entry.clone()).expect("insert");
        assert!(matches!(
            store.insert(entry.clone()),
            Err(RecorderError::Store(_))
        ));
        assert!(matches!(
            store.remove("zzzzz-57u5n-000000000000009"),
            Err(RecorderError::NotFound(_))
        ));
        assert!(matches!(
            store.insert(LogEntry::new("create")),
            Err(RecorderError::MissingRequiredField("id"))
        ));
        assert_eq!(store.list().expect("list"), vec![entry]);
    }
}
