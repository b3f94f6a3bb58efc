use stampede::prelude::*;
use stampede::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        FmtSubscriber::builder()
            .with_env_filter("stampede=debug")
            .init();
    });
}

/// In-memory stand-in for the JSONPlaceholder and ReqRes APIs: routes by
/// method and path, records every request it sees, and can be told to fail
/// the first N requests with a 500.
pub struct ApiStub {
    latency: Duration,
    failures_remaining: AtomicUsize,
    pub requests: Mutex<Vec<HttpRequest>>,
}

#[allow(unused)]
impl ApiStub {
    pub fn new() -> Arc<Self> {
        Self::with_latency(Duration::from_millis(1))
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            failures_remaining: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// The next `n` requests answer 500 regardless of route.
    pub fn fail_next(self: &Arc<Self>, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.body.clone())
            .collect()
    }

    fn route(&self, request: &HttpRequest) -> (u16, String) {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return (500, r#"{"error": "injected failure"}"#.to_string());
        }

        let path = request
            .url
            .splitn(4, '/')
            .nth(3)
            .map(|p| format!("/{p}"))
            .unwrap_or_default();

        match (request.method, path.as_str()) {
            (Method::Get, "/posts") => (
                200,
                r#"[{"id": 1, "title": "t1"}, {"id": 2, "title": "t2"}]"#.to_string(),
            ),
            (Method::Post, "/posts") => (201, r#"{"id": 101}"#.to_string()),
            (Method::Get, p) if p.starts_with("/posts/") => {
                let id = p.trim_start_matches("/posts/");
                (200, format!(r#"{{"id": {id}, "title": "t"}}"#))
            }
            (Method::Put, p) if p.starts_with("/posts/") => {
                let id = p.trim_start_matches("/posts/");
                (200, format!(r#"{{"id": {id}}}"#))
            }
            (Method::Delete, p) if p.starts_with("/posts/") => (200, "{}".to_string()),
            (Method::Post, "/api/login") => {
                (200, r#"{"token": "QpwL5tke4Pnpja7X4"}"#.to_string())
            }
            (Method::Get, "/api/users") => (
                200,
                r#"{"data": [{"id": 1, "email": "george.bluth@reqres.in"}]}"#.to_string(),
            ),
            _ => (404, "{}".to_string()),
        }
    }
}

impl HttpClient for ApiStub {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        let (status, body) = self.route(&request);
        self.requests.lock().unwrap().push(request);
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;
            Ok(HttpResponse {
                status,
                headers: vec![],
                body,
                latency: self.latency,
            })
        })
    }
}

/// Feeder records matching the shape of the original `data/posts.json`.
#[allow(unused)]
pub fn posts_records() -> Vec<FeederRecord> {
    Feeder::records_from_json(&serde_json::json!([
        {"id": 1, "title": "t1", "body": "b1", "userId": 1},
        {"id": 2, "title": "t2", "body": "b2", "userId": 2},
        {"id": 3, "title": "t3", "body": "b3", "userId": 3},
    ]))
    .expect("static records")
}
