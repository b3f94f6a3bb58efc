use serde::Serialize;
use std::time::Duration;

/// Terminal status of one executed request step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RequestStatus {
    /// Response received and every check passed.
    Ok(u16),
    /// Response received but a check rejected it.
    CheckFailed(u16),
    /// The request never produced a usable response (connect/timeout
    /// failures, or the request could not be rendered from the session).
    TransportError(String),
}

impl RequestStatus {
    pub fn is_failure(&self) -> bool {
        !matches!(self, RequestStatus::Ok(_))
    }
}

/// One recorded request result. Immutable once emitted; owned by the metrics
/// sink after that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub scenario: String,
    pub step: String,
    pub status: RequestStatus,
    pub latency: Duration,
    /// Offset from run start at the moment the outcome was recorded.
    pub offset: Duration,
}

/// Per-run virtual-user tally. `aborted` covers users cancelled by a global
/// stop signal before reaching a terminal state on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserTally {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub aborted: u64,
}
