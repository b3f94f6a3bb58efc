//! The transport boundary. The engine never speaks HTTP itself; it renders
//! [`HttpRequest`]s and hands them to whatever [`HttpClient`] the caller
//! plugs in. Connection pooling, TLS, DNS and framing all live behind this
//! trait.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
        };
        write!(f, "{s}")
    }
}

/// A fully rendered request: templates have already been resolved against the
/// session by the time one of these exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Round-trip latency as measured by the transport.
    pub latency: Duration,
}

/// Connection-level failure. Always recorded as a failed outcome, never fatal
/// to the run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Other(String),
}

/// Capability to issue a single HTTP request.
///
/// Implementations must be shareable across all virtual-user tasks; a
/// `reqwest::Client` wrapper is the expected production shape, stub clients
/// are the expected test shape.
pub trait HttpClient: Send + Sync + 'static {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}
