//! Response checks.
//!
//! A check evaluates one expectation against a response and can extract a
//! value to save into the session. Checks on a request run in declaration
//! order; the first failure short-circuits the rest, but values extracted by
//! earlier checks in the same request stay committed.

use crate::client::HttpResponse;
use stampede_core::Value;

#[derive(Debug, Clone)]
pub struct Check {
    kind: CheckKind,
    save_as: Option<String>,
}

#[derive(Debug, Clone)]
enum CheckKind {
    StatusIn(Vec<u16>),
    JsonPath(String),
}

/// Response did not satisfy an expectation. Recorded against the step,
/// never propagated as run-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckFailure {
    #[error("status {found} not in {expected:?}")]
    StatusNotIn { expected: Vec<u16>, found: u16 },
    #[error("response body is not valid JSON: {0}")]
    BodyNotJson(String),
    #[error("json path `{0}` found nothing")]
    JsonPathMiss(String),
}

impl Check {
    /// Passes when the response status is exactly `code`.
    pub fn status_is(code: u16) -> Self {
        Self::status_in([code])
    }

    /// Passes when the response status is any of `codes`.
    pub fn status_in(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            kind: CheckKind::StatusIn(codes.into_iter().collect()),
            save_as: None,
        }
    }

    /// Extracts the value at a dotted JSON path (`$.token`, `$.data[0].id`)
    /// from the response body. Fails when the body is not JSON or the path
    /// matches nothing.
    pub fn json_path(path: impl Into<String>) -> Self {
        Self {
            kind: CheckKind::JsonPath(path.into()),
            save_as: None,
        }
    }

    /// Saves the extracted value into the session under `key`.
    pub fn save_as(mut self, key: impl Into<String>) -> Self {
        self.save_as = Some(key.into());
        self
    }

    pub(crate) fn save_key(&self) -> Option<&str> {
        self.save_as.as_deref()
    }

    pub(crate) fn evaluate(&self, response: &HttpResponse) -> Result<Option<Value>, CheckFailure> {
        match &self.kind {
            CheckKind::StatusIn(expected) => {
                if expected.contains(&response.status) {
                    Ok(None)
                } else {
                    Err(CheckFailure::StatusNotIn {
                        expected: expected.clone(),
                        found: response.status,
                    })
                }
            }
            CheckKind::JsonPath(path) => {
                let root: serde_json::Value = serde_json::from_str(&response.body)
                    .map_err(|e| CheckFailure::BodyNotJson(e.to_string()))?;
                let found = lookup_path(&root, path)
                    .ok_or_else(|| CheckFailure::JsonPathMiss(path.clone()))?;
                Ok(Some(Value::from_json(found)))
            }
        }
    }
}

/// Dotted-path lookup over a JSON document: `$.a.b[2].c`. The leading `$.`
/// is optional.
fn lookup_path<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let path = path.strip_prefix("$.").or_else(|| path.strip_prefix('$')).unwrap_or(path);
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (name, indices) = split_indices(segment)?;
        if !name.is_empty() {
            current = current.get(name)?;
        }
        for idx in indices {
            current = current.get(idx)?;
        }
    }
    Some(current)
}

/// Splits `items[0][1]` into `("items", [0, 1])`.
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    match segment.find('[') {
        None => Some((segment, Vec::new())),
        Some(pos) => {
            let name = &segment[..pos];
            let mut indices = Vec::new();
            let mut rest = &segment[pos..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']')?;
                indices.push(stripped[..end].parse().ok()?);
                rest = &stripped[end + 1..];
            }
            if rest.is_empty() {
                Some((name, indices))
            } else {
                None
            }
        }
    }
}
