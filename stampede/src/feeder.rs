//! Data feeders.
//!
//! A feeder is a lazy source of flat key/value records merged into a user's
//! session. Feeders are shared across all virtual users of a scenario, so the
//! cursor advance is atomic; random draws use the caller's thread-local RNG
//! and need no coordination at all.

use rand::Rng;
use stampede_core::{Session, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One row of test data: named fields in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeederRecord {
    fields: Vec<(String, Value)>,
}

impl FeederRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Merges every field into the session, overwriting existing keys.
    pub fn apply_to(&self, session: &mut Session) {
        for (key, value) in &self.fields {
            session.set(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Exhausts once, then fails further draws.
    Sequential,
    /// Wraps to the start.
    Circular,
    /// Uniform draw with replacement on every call.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeederError {
    /// Fatal to the virtual user drawing from the feeder, never to the run.
    #[error("feeder exhausted after {0} records")]
    Exhausted(usize),
    #[error("feeder records must be a JSON array of objects")]
    InvalidRecords,
}

/// Cheaply cloneable handle to a shared record source.
#[derive(Debug, Clone)]
pub struct Feeder {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    records: Vec<FeederRecord>,
    mode: Mode,
    cursor: AtomicUsize,
}

impl Feeder {
    pub fn sequential(records: Vec<FeederRecord>) -> Self {
        Self::new(records, Mode::Sequential)
    }

    pub fn circular(records: Vec<FeederRecord>) -> Self {
        Self::new(records, Mode::Circular)
    }

    pub fn random(records: Vec<FeederRecord>) -> Self {
        Self::new(records, Mode::Random)
    }

    fn new(records: Vec<FeederRecord>, mode: Mode) -> Self {
        Self {
            inner: Arc::new(Inner {
                records,
                mode,
                cursor: AtomicUsize::new(0),
            }),
        }
    }

    /// Builds records from a JSON array of flat objects, the shape the
    /// original `data/*.json` feeder files carry. Parsing the file itself is
    /// the caller's concern.
    pub fn records_from_json(json: &serde_json::Value) -> Result<Vec<FeederRecord>, FeederError> {
        let rows = json.as_array().ok_or(FeederError::InvalidRecords)?;
        rows.iter()
            .map(|row| {
                let object = row.as_object().ok_or(FeederError::InvalidRecords)?;
                let mut record = FeederRecord::new();
                for (key, value) in object {
                    record = record.field(key, Value::from_json(value));
                }
                Ok(record)
            })
            .collect()
    }

    /// Draws exactly one record or fails with [`FeederError::Exhausted`].
    /// Circular and random feeders never exhaust unless they hold no records
    /// at all.
    pub fn next(&self) -> Result<FeederRecord, FeederError> {
        let len = self.inner.records.len();
        if len == 0 {
            return Err(FeederError::Exhausted(0));
        }
        let idx = match self.inner.mode {
            Mode::Sequential => {
                let idx = self.inner.cursor.fetch_add(1, Ordering::Relaxed);
                if idx >= len {
                    return Err(FeederError::Exhausted(len));
                }
                idx
            }
            Mode::Circular => self.inner.cursor.fetch_add(1, Ordering::Relaxed) % len,
            Mode::Random => rand::thread_rng().gen_range(0..len),
        };
        Ok(self.inner.records[idx].clone())
    }

    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }
}
