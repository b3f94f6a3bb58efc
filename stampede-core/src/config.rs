use std::time::Duration;

/// HTTP protocol binding shared by every request of a population: base URL
/// plus default headers. Immutable once built and handed to the runner.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
    base_url: String,
    default_headers: Vec<(String, String)>,
}

impl Protocol {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn accept_header(self, value: impl Into<String>) -> Self {
        self.header("accept", value)
    }

    pub fn content_type_header(self, value: impl Into<String>) -> Self {
        self.header("content-type", value)
    }

    pub fn user_agent_header(self, value: impl Into<String>) -> Self {
        self.header("user-agent", value)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    /// Joins a request path onto the base URL. Absolute URLs pass through
    /// untouched so a chain can mix APIs when it needs to.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }
}

/// How virtual users for one scenario arrive.
///
/// Open models fix the arrival schedule and let the concurrently-active count
/// float; the closed model fixes the concurrently-active count and replaces
/// each finished user immediately. Feeder mode is deliberately orthogonal to
/// this choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionProfile {
    /// All users start at time zero.
    OpenAtOnce { users: usize },
    /// User start times evenly spaced across `over`.
    OpenRamp { users: usize, over: Duration },
    /// Exactly `concurrent_users` alive for `duration`, then drain.
    Closed {
        concurrent_users: usize,
        duration: Duration,
    },
}

impl InjectionProfile {
    pub fn at_once_users(users: usize) -> Self {
        InjectionProfile::OpenAtOnce { users }
    }

    pub fn ramp_users(users: usize, over: Duration) -> Self {
        InjectionProfile::OpenRamp { users, over }
    }

    pub fn constant_concurrent_users(concurrent_users: usize, duration: Duration) -> Self {
        InjectionProfile::Closed {
            concurrent_users,
            duration,
        }
    }

    /// Start offsets for open models (`start_i = i * duration / n`). The
    /// closed model has no precomputed schedule, so it returns `None`.
    pub fn start_offsets(&self) -> Option<Vec<Duration>> {
        match self {
            InjectionProfile::OpenAtOnce { users } => Some(vec![Duration::ZERO; *users]),
            InjectionProfile::OpenRamp { users, over } => {
                Some((0..*users).map(|i| (*over * i as u32) / *users as u32).collect())
            }
            InjectionProfile::Closed { .. } => None,
        }
    }
}

/// Malformed simulation setup. Always fatal before any virtual user starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("simulation has no populations")]
    NoPopulations,
    #[error("scenario `{0}`: injection profile requires at least one user")]
    NoUsers(String),
    #[error("scenario `{0}`: injection duration must be non-zero")]
    ZeroDuration(String),
    #[error("scenario `{0}`: protocol base URL is empty")]
    EmptyBaseUrl(String),
    #[error("scenario `{0}`: chain has no steps")]
    EmptyChain(String),
    #[error("scenario `{0}`: random switch requires positive weights")]
    InvalidWeights(String),
    #[error("scenario `{0}`: loop and retry counts must be non-zero")]
    ZeroCount(String),
    #[error("assertion quantile {0} must be within (0, 1)")]
    InvalidQuantile(f64),
    #[error("assertion percentage {0} must be within 0..=100")]
    InvalidPercent(f64),
}
