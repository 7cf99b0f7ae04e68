//! Subscription matchers.
//!
//! A [`Matcher`] decides whether a published event's source is relevant to
//! a subscriber. Evaluation order is fixed:
//!
//! 1. [`Matcher::Any`] accepts every source;
//! 2. [`Matcher::Exact`] accepts the source with the registered id;
//! 3. [`Matcher::Category`] accepts sources that belong to the category;
//! 4. otherwise, if the candidate has an owning context, the same matcher
//!    is applied to that owner, recursively.

use std::fmt;

use crate::source::{Category, Source, SourceId};

/// Predicate over event sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Matcher {
    /// Wildcard: matches every source.
    #[default]
    Any,
    /// Matches one specific source by identity.
    Exact(SourceId),
    /// Matches every source that belongs to the category.
    Category(Category),
}

impl Matcher {
    /// Matcher for exactly this source.
    #[must_use]
    pub fn source(source: &dyn Source) -> Self {
        Self::Exact(source.id())
    }

    /// Matcher for a category.
    pub fn category(category: impl Into<Category>) -> Self {
        Self::Category(category.into())
    }

    /// Whether `source` (or one of its owners) is accepted.
    #[must_use]
    pub fn matches(&self, source: &dyn Source) -> bool {
        let direct = match self {
            Self::Any => true,
            Self::Exact(id) => source.id() == *id,
            Self::Category(category) => source.is_a(category),
        };
        if direct {
            return true;
        }
        source.owner().is_some_and(|owner| self.matches(owner))
    }

    /// Whether this is the wildcard matcher.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(id) => write!(f, "{id}"),
            Self::Category(category) => write!(f, "category:{category}"),
        }
    }
}

impl From<SourceId> for Matcher {
    fn from(id: SourceId) -> Self {
        Self::Exact(id)
    }
}

impl From<Category> for Matcher {
    fn from(category: Category) -> Self {
        Self::Category(category)
    }
}
