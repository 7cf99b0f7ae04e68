//! Event sources: identity, categories, and owning contexts.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocate a fresh identity. Never returns the same value twice.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

/// A named category or capability a source can belong to (e.g. `"job"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category(Cow<'static, str>);

impl Category {
    /// Create a category from a name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The category name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Category {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Something events can be published from and matched against.
///
/// Only [`id`](Source::id) and [`as_any`](Source::as_any) are required.
/// Implement [`is_a`](Source::is_a) to take part in category matching and
/// [`owner`](Source::owner) to let subscriptions on an enclosing context
/// (e.g. the job run a task run belongs to) match this source too.
pub trait Source: Send + Sync {
    /// Identity of this source.
    fn id(&self) -> SourceId;

    /// Whether this source belongs to `category`.
    fn is_a(&self, _category: &Category) -> bool {
        false
    }

    /// The owning context this source is associated with, if any.
    fn owner(&self) -> Option<&dyn Source> {
        None
    }

    /// Downcasting support for handlers that need the concrete source.
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Source + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").field("id", &self.id()).finish()
    }
}

/// A bare source with an identity and a fixed set of categories.
///
/// Useful for publishers that have no richer object to stand for them.
#[derive(Debug, Clone)]
pub struct Anonymous {
    id: SourceId,
    categories: Vec<Category>,
}

impl Anonymous {
    /// Create a source with a fresh id and no categories.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SourceId::next(),
            categories: Vec::new(),
        }
    }

    /// Add a category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.categories.push(category.into());
        self
    }
}

impl Default for Anonymous {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for Anonymous {
    fn id(&self) -> SourceId {
        self.id
    }

    fn is_a(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
