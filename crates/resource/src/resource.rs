//! Resource kinds.
//!
//! A kind is a Rust type implementing [`Resource`]. The trait exposes the
//! kind's named constructors and teardown operations so the registry can
//! check, at registration time and without an instance, that the
//! operations a registration names actually exist.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use warden_eventbus::BoxError;

/// Constructor-style acquisition operation of a kind.
pub type Constructor<R> = fn(<R as Resource>::Args) -> Result<R, BoxError>;

/// Disposal operation of a kind.
pub type Teardown<R> = fn(&mut R) -> Result<(), BoxError>;

/// A kind of externally acquired resource.
///
/// ```
/// use warden_eventbus::BoxError;
/// use warden_resource::resource::{Constructor, Resource, Teardown};
///
/// struct Session {
///     open: bool,
/// }
///
/// impl Session {
///     fn connect(_host: String) -> Result<Self, BoxError> {
///         Ok(Self { open: true })
///     }
///
///     fn logout(&mut self) -> Result<(), BoxError> {
///         self.open = false;
///         Ok(())
///     }
/// }
///
/// impl Resource for Session {
///     type Args = String;
///
///     fn constructor(name: &str) -> Option<Constructor<Self>> {
///         (name == "connect").then_some(Self::connect as Constructor<Self>)
///     }
///
///     fn teardown(name: &str) -> Option<Teardown<Self>> {
///         (name == "logout").then_some(Self::logout as Teardown<Self>)
///     }
/// }
/// ```
pub trait Resource: Any + Send + Sized {
    /// Arguments accepted when acquiring an instance.
    type Args: Clone + fmt::Debug + Send + Sync + 'static;

    /// Human-readable kind name used in errors and logs.
    fn kind_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Look up a named constructor.
    fn constructor(_name: &str) -> Option<Constructor<Self>> {
        None
    }

    /// Look up a named teardown operation.
    fn teardown(name: &str) -> Option<Teardown<Self>>;

    /// Whether this kind belongs to the category described by another
    /// registered kind. Used when no registration exists for this kind
    /// itself.
    fn is_a(_kind: &KindId) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// KindId
// ---------------------------------------------------------------------------

/// Identity of a resource kind.
///
/// Equality and hashing use the Rust type only; the name is for display.
#[derive(Clone, Copy)]
pub struct KindId {
    type_id: TypeId,
    name: &'static str,
}

impl KindId {
    /// The kind of `R`.
    #[must_use]
    pub fn of<R: Resource>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            name: R::kind_name(),
        }
    }

    /// Whether this is the kind of `R`.
    #[must_use]
    pub fn is<R: Resource>(&self) -> bool {
        self.type_id == TypeId::of::<R>()
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for KindId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for KindId {}

impl Hash for KindId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KindId").field(&self.name).finish()
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// KindOptions
// ---------------------------------------------------------------------------

/// Operation names used when registering a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KindOptions {
    /// Constructor used when the registration supplies no acquisition body.
    pub acquisition_method: String,
    /// Teardown operation that releases an instance.
    pub disposal_method: String,
}

impl KindOptions {
    /// Use `name` as the constructor.
    #[must_use]
    pub fn acquire_with(mut self, name: impl Into<String>) -> Self {
        self.acquisition_method = name.into();
        self
    }

    /// Use `name` as the teardown operation.
    #[must_use]
    pub fn dispose_with(mut self, name: impl Into<String>) -> Self {
        self.disposal_method = name.into();
        self
    }
}

impl Default for KindOptions {
    fn default() -> Self {
        Self {
            acquisition_method: "open".to_owned(),
            disposal_method: "close".to_owned(),
        }
    }
}
