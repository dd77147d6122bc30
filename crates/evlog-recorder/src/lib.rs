//! Audit log recording: field derivation for log entries, change hooks for
//! tracked entities and a policy-gated persistence layer.

pub mod clock;
pub mod hooks;
pub mod recorder;
pub mod store;
pub mod subject;

use evlog_policy_engine::{LogAction, PolicyError};
use evlog_registry::RegistryError;
use thiserror::Error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use hooks::{ChangeLogger, Tracked};
pub use recorder::{object_kind, set_default_event_at, EventLogRecorder};
pub use store::{generate_log_id, LogRepository, LogStore, MemoryLogStore};
pub use subject::{Loggable, Resource, StateSnapshot};

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("permission denied: {action} ({reason})")]
    PermissionDenied { action: LogAction, reason: String },
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store failure: {0}")]
    Store(String),
    #[error("field cannot change once set: {0}")]
    ImmutableField(&'static str),
    #[error("policy failure")]
    Policy(#[from] PolicyError),
    #[error("registry failure")]
    Registry(#[from] RegistryError),
}

pub type RecorderResult<T> = Result<T, RecorderError>;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub(crate) fn base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
