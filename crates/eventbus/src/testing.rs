//! Test helpers: a handler that records what it sees.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::handler::{Handler, HandlerResult};
use crate::source::{Source, SourceId};

/// One delivery observed by a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Label given to the recorder that saw it.
    pub label: String,
    /// Id of the publishing source.
    pub source: SourceId,
}

/// Handler that appends every delivery to a shared log and answers with a
/// fixed verdict.
///
/// Clones share the same log, so several recorders subscribed to
/// different events can be compared by order.
#[derive(Clone)]
pub struct Recorder {
    label: String,
    verdict: bool,
    log: Arc<Mutex<Vec<Delivery>>>,
}

impl Recorder {
    /// A recorder answering `true`, with a fresh log.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            verdict: true,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Another recorder writing to the same log.
    #[must_use]
    pub fn sibling(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            verdict: true,
            log: Arc::clone(&self.log),
        }
    }

    /// Answer with `verdict` instead of `true`.
    #[must_use]
    pub fn answering(mut self, verdict: bool) -> Self {
        self.verdict = verdict;
        self
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.log.lock().clone()
    }

    /// Labels recorded so far, in delivery order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.log.lock().iter().map(|d| d.label.clone()).collect()
    }

    /// Number of deliveries recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }
}

impl Handler for Recorder {
    fn name(&self) -> &str {
        &self.label
    }

    fn handle(&self, source: &dyn Source, _payload: &dyn Any) -> HandlerResult {
        self.log.lock().push(Delivery {
            label: self.label.clone(),
            source: source.id(),
        });
        Ok(self.verdict)
    }
}
