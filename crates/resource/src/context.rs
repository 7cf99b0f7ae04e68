//! Owning contexts.
//!
//! An owner is the unit of work that acquires resources and is responsible
//! for releasing them. [`Context`] is the ready-made owner: an identity for
//! event matching, optional categories and parent, string metadata that
//! acquisition bodies can read, and the [`OwnershipSet`] of resources it
//! currently holds.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use warden_eventbus::{Category, Source, SourceId};

use crate::ownership::OwnershipSet;

/// A unit of work that holds resources.
pub trait Owner: Source {
    /// The resources this owner currently holds.
    fn resources(&self) -> &OwnershipSet;

    /// Configuration value visible to acquisition bodies.
    fn metadata(&self, _key: &str) -> Option<&str> {
        None
    }
}

/// Owning context for a job, task run, or any other unit of work.
pub struct Context {
    id: SourceId,
    /// Name used in logs.
    pub name: String,
    categories: Vec<Category>,
    parent: Option<Arc<Context>>,
    metadata: HashMap<String, String>,
    resources: OwnershipSet,
}

impl Context {
    /// Create a context with a fresh identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SourceId::next(),
            name: name.into(),
            categories: Vec::new(),
            parent: None,
            metadata: HashMap::new(),
            resources: OwnershipSet::new(),
        }
    }

    /// Mark this context as belonging to a category (e.g. `"job"`).
    #[must_use]
    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Nest this context inside `parent`, so subscriptions on the parent
    /// also see events from this context.
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<Context>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a key-value metadata pair to the context.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The enclosing context, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }
}

impl Source for Context {
    fn id(&self) -> SourceId {
        self.id
    }

    fn is_a(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    fn owner(&self) -> Option<&dyn Source> {
        self.parent.as_deref().map(|p| p as &dyn Source)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Owner for Context {
    fn resources(&self) -> &OwnershipSet {
        &self.resources
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("categories", &self.categories)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .field("metadata", &self.metadata)
            .field("held", &self.resources.len())
            .finish()
    }
}
