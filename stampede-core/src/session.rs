use crate::{TypeMismatch, Value};
use std::collections::HashMap;

/// Mutable per-virtual-user state threaded through a scenario chain.
///
/// Every virtual user gets a fresh `Session` when it spawns and the session is
/// dropped when the chain terminates. Sessions are never shared between users,
/// so no synchronization is involved; values written by one step are visible
/// to every later step of the same user.
#[derive(Debug, Clone)]
pub struct Session {
    user_id: u64,
    scenario: String,
    values: HashMap<String, Value>,
    failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no session key `{0}`")]
    MissingKey(String),
    #[error("session key `{key}`: {source}")]
    TypeMismatch {
        key: String,
        #[source]
        source: TypeMismatch,
    },
}

impl Session {
    pub fn new(user_id: u64, scenario: impl Into<String>) -> Self {
        Self {
            user_id,
            scenario: scenario.into(),
            values: HashMap::new(),
            failed: false,
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn get(&self, key: &str) -> Result<&Value, SessionError> {
        self.values
            .get(key)
            .ok_or_else(|| SessionError::MissingKey(key.to_string()))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, SessionError> {
        self.get(key)?.as_str().map_err(|source| typed(key, source))
    }

    pub fn get_int(&self, key: &str) -> Result<i64, SessionError> {
        self.get(key)?.as_int().map_err(|source| typed(key, source))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, SessionError> {
        self.get(key)?
            .as_bool()
            .map_err(|source| typed(key, source))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Marks the user's chain as failed. Subsequent steps still execute unless
    /// an `exit_here_if_failed` marker is reached.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Clears the failed flag; used by retry blocks before each attempt.
    pub fn mark_succeeded(&mut self) {
        self.failed = false;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

fn typed(key: &str, source: TypeMismatch) -> SessionError {
    SessionError::TypeMismatch {
        key: key.to_string(),
        source,
    }
}
