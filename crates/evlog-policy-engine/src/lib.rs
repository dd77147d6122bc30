//! Permission policy for log entry mutations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Create,
    Update,
    Delete,
}

impl LogAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The party performing a mutation. An anonymous actor has no uuid.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub uuid: Option<String>,
    pub is_admin: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            is_admin: false,
        }
    }

    pub fn admin(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            is_admin: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow { reason_code: String },
    Deny { reason_code: String },
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

pub trait PolicyEngine: Send + Sync {
    fn decide(&self, actor: &Actor, action: LogAction) -> PolicyResult<PolicyDecision>;
}

/// Append-mostly policy: anyone may write, only administrators may
/// rewrite or remove history.
#[derive(Clone, Debug, Default)]
pub struct AuditTrailPolicy;

impl PolicyEngine for AuditTrailPolicy {
    fn decide(&self, actor: &Actor, action: LogAction) -> PolicyResult<PolicyDecision> {
        if actor.uuid.as_deref().is_some_and(|uuid| uuid.trim().is_empty()) {
            return Err(PolicyError::InvalidRequest(
                "actor uuid must not be blank".to_string(),
            ));
        }

        let decision = match action {
            LogAction::Create => PolicyDecision::Allow {
                reason_code: "log_create_open".to_string(),
            },
            LogAction::Update | LogAction::Delete if actor.is_admin => PolicyDecision::Allow {
                reason_code: "admin_privilege".to_string(),
            },
            LogAction::Update | LogAction::Delete => PolicyDecision::Deny {
                reason_code: "admin_required".to_string(),
            },
        };

        if !decision.is_allowed() {
            tracing::warn!(
                actor = actor.uuid.as_deref().unwrap_or("anonymous"),
                action = action.as_str(),
                "log mutation denied"
            );
        }
        Ok(decision)
    }
}
