//! Lazy request templating.
//!
//! A [`Template`] is a pure function of an immutable session snapshot,
//! evaluated at step-execution time. Nothing is resolved while a chain is
//! being built, so a value a feeder or check writes into the session at step
//! N is visible to step N+1's URL, headers and body.

use stampede_core::{Session, SessionError};
use std::fmt;
use std::sync::Arc;

type RenderFn = dyn Fn(&Session) -> Result<String, SessionError> + Send + Sync;

#[derive(Clone)]
pub struct Template {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Literal(String),
    /// Parsed `#{key}` interpolation, e.g. `/posts/#{id}`.
    Interpolated(Arc<[Segment]>),
    Dynamic(Arc<RenderFn>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Key(String),
}

impl Template {
    /// A fixed string, rendered as-is for every session.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            inner: Inner::Literal(text.into()),
        }
    }

    /// An expression-language string where `#{key}` placeholders are
    /// substituted with session values at execution time. Text without
    /// placeholders behaves exactly like [`Template::fixed`].
    pub fn el(text: impl AsRef<str>) -> Self {
        let segments = parse_el(text.as_ref());
        if segments.iter().all(|s| matches!(s, Segment::Text(_))) {
            Self::fixed(text.as_ref())
        } else {
            Self {
                inner: Inner::Interpolated(segments.into()),
            }
        }
    }

    /// An arbitrary closure over the session, for anything `#{key}`
    /// substitution cannot express.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&Session) -> Result<String, SessionError> + Send + Sync + 'static,
    {
        Self {
            inner: Inner::Dynamic(Arc::new(f)),
        }
    }

    pub fn render(&self, session: &Session) -> Result<String, SessionError> {
        match &self.inner {
            Inner::Literal(text) => Ok(text.clone()),
            Inner::Interpolated(segments) => {
                let mut out = String::new();
                for segment in segments.iter() {
                    match segment {
                        Segment::Text(text) => out.push_str(text),
                        Segment::Key(key) => {
                            let value = session.get(key)?;
                            out.push_str(&value.to_string());
                        }
                    }
                }
                Ok(out)
            }
            Inner::Dynamic(f) => f(session),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Literal(text) => write!(f, "Template::fixed({text:?})"),
            Inner::Interpolated(segments) => write!(f, "Template::el({segments:?})"),
            Inner::Dynamic(_) => write!(f, "Template::dynamic(..)"),
        }
    }
}

/// `&str`/`String` conversions go through EL parsing, matching how string
/// literals behave in the scenario builders.
impl From<&str> for Template {
    fn from(s: &str) -> Self {
        Template::el(s)
    }
}

impl From<String> for Template {
    fn from(s: String) -> Self {
        Template::el(&s)
    }
}

fn parse_el(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        if let Some(len) = rest[start + 2..].find('}') {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            segments.push(Segment::Key(rest[start + 2..start + 2 + len].to_string()));
            rest = &rest[start + 2 + len + 1..];
        } else {
            // Unterminated placeholder; keep the remainder literal.
            break;
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    segments
}
