//! Change hooks: turn create/update/destroy of a tracked entity into a
//! persisted log entry.

use evlog_audit::{EventType, LogEntry};
use evlog_policy_engine::{Actor, PolicyEngine};

use crate::clock::Clock;
use crate::recorder::EventLogRecorder;
use crate::store::{LogRepository, LogStore};
use crate::subject::{Loggable, StateSnapshot};
use crate::RecorderResult;

/// The entity a hook fires for. Log entries are a variant of their own so
/// the hooks can refuse to log changes to the log.
#[derive(Clone, Copy)]
pub enum Tracked<'a> {
    LogEntry(&'a LogEntry),
    Entity(&'a dyn Loggable),
}

pub struct ChangeLogger<P, S, C>
where
    P: PolicyEngine,
    S: LogStore,
    C: Clock,
{
    recorder: EventLogRecorder<C>,
    repository: LogRepository<P, S, C>,
}

impl<P, S, C> ChangeLogger<P, S, C>
where
    P: PolicyEngine,
    S: LogStore,
    C: Clock,
{
    pub fn new(recorder: EventLogRecorder<C>, repository: LogRepository<P, S, C>) -> Self {
        Self {
            recorder,
            repository,
        }
    }

    pub fn recorder(&self) -> &EventLogRecorder<C> {
        &self.recorder
    }

    pub fn repository(&self) -> &LogRepository<P, S, C> {
        &self.repository
    }

    pub fn log_create(
        &self,
        actor: &Actor,
        tracked: Tracked<'_>,
    ) -> RecorderResult<Option<LogEntry>> {
        self.log_event(actor, LogEntry::new(EventType::Create), None, tracked)
    }

    pub fn log_update(
        &self,
        actor: &Actor,
        old: &StateSnapshot,
        tracked: Tracked<'_>,
    ) -> RecorderResult<Option<LogEntry>> {
        self.log_event(actor, LogEntry::new(EventType::Update), Some(old), tracked)
    }

    pub fn log_destroy(
        &self,
        actor: &Actor,
        old: &StateSnapshot,
        tracked: Tracked<'_>,
    ) -> RecorderResult<Option<LogEntry>> {
        self.log_event(actor, LogEntry::new(EventType::Destroy), Some(old), tracked)
    }

    /// Logs a change starting from `seed`, which may already carry a summary
    /// or object uuid. A `destroy` seed records no new state; every other
    /// event type snapshots the subject as it is now.
    pub fn log_event(
        &self,
        actor: &Actor,
        seed: LogEntry,
        old: Option<&StateSnapshot>,
        tracked: Tracked<'_>,
    ) -> RecorderResult<Option<LogEntry>> {
        let subject = match tracked {
            Tracked::LogEntry(entry) => {
                tracing::debug!(
                    id = entry.id().unwrap_or_default(),
                    event_type = %seed.event_type(),
                    "not logging a change to a log entry"
                );
                return Ok(None);
            }
            Tracked::Entity(subject) => subject,
        };

        let mut entry = seed;
        self.recorder.fill_object(&mut entry, subject);
        if let Some(old) = old {
            self.recorder
                .fill_properties(&mut entry, "old", old.etag.clone(), old.attributes.clone());
        }
        let current = match entry.event_type() {
            EventType::Destroy => None,
            _ => Some(subject),
        };
        self.recorder.update_to(&mut entry, current);
        self.repository.create(actor, entry).map(Some)
    }
}
