//! Ownership tracking and the single disposal path.
//!
//! Every tracked instance lives in a slot shared between its [`Handle`]
//! and the owner's [`OwnershipSet`]. Disposal always goes through
//! [`Registry::dispose_resource`], whether it starts from the handle or
//! from bulk cleanup, and the slot's state guarantees the teardown
//! operation runs at most once.
//!
//! [`Handle`]: crate::handle::Handle

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use warden_eventbus::{BoxError, Source, panic_message};

use crate::context::Owner;
use crate::error::{Error, Result};
use crate::events::{self, ResourceEvent};
use crate::registry::Registry;
use crate::resource::{KindId, Resource};

use self::sealed::Lifecycle as _;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Slot state
// ---------------------------------------------------------------------------

/// Disposal state of a tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Acquired and not yet torn down.
    Live,
    /// Teardown is running.
    Disposing,
    /// Teardown completed.
    Disposed,
}

const LIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// Outcome of [`Registry::dispose_resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// The teardown operation ran.
    Disposed,
    /// A `resource.pre-disposal` subscriber returned `false`.
    Vetoed,
    /// The instance was already disposed, or is being disposed further up
    /// the stack.
    AlreadyDisposed,
}

// ---------------------------------------------------------------------------
// Tracked
// ---------------------------------------------------------------------------

mod sealed {
    pub trait Lifecycle {
        /// Move `Live -> Disposing`. False if the slot was not live.
        fn begin_disposal(&self) -> bool;

        /// Run the named teardown and settle the state. A panicking teardown
        /// counts as a failed one.
        fn finish_disposal(&self, operation: &str) -> crate::error::Result<()>;
    }
}

/// Type-erased view of a tracked instance.
pub trait Tracked: sealed::Lifecycle + Send + Sync {
    /// Identity of the instance.
    fn id(&self) -> ResourceId;

    /// Kind of the instance.
    fn kind(&self) -> KindId;

    /// Whether the instance's kind belongs to the category `kind`.
    fn is_a(&self, kind: &KindId) -> bool;

    /// Current disposal state.
    fn state(&self) -> State;

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
}

/// Shared reference to a tracked instance.
pub type TrackedRef = Arc<dyn Tracked>;

impl dyn Tracked {
    /// Run `f` on the instance if it is an `R`.
    ///
    /// Locks the instance for the duration of `f`; do not dispose it from
    /// inside `f`.
    pub fn with<R: Resource, T>(&self, f: impl FnOnce(&mut R) -> T) -> Option<T> {
        let slot = self.as_any().downcast_ref::<Slot<R>>()?;
        Some(f(&mut slot.instance.lock()))
    }

    /// Whether the teardown already completed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state() == State::Disposed
    }
}

impl fmt::Debug for dyn Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .finish()
    }
}

/// Storage for one tracked instance.
pub(crate) struct Slot<R> {
    id: ResourceId,
    state: AtomicU8,
    pub(crate) instance: Mutex<R>,
}

impl<R: Resource> Slot<R> {
    pub(crate) fn new(instance: R) -> Arc<Self> {
        Arc::new(Self {
            id: ResourceId::next(),
            state: AtomicU8::new(LIVE),
            instance: Mutex::new(instance),
        })
    }
}

impl<R: Resource> sealed::Lifecycle for Slot<R> {
    fn begin_disposal(&self) -> bool {
        self.state
            .compare_exchange(LIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish_disposal(&self, operation: &str) -> Result<()> {
        let kind = KindId::of::<R>();
        let result = match R::teardown(operation) {
            Some(teardown) => {
                let mut instance = self.instance.lock();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| teardown(&mut instance)));
                drop(instance);
                outcome
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        Err(BoxError::from(format!("teardown panicked: {message}")))
                    })
                    .map_err(|source| Error::Disposal {
                        kind,
                        resource_id: self.id,
                        source,
                    })
            }
            None => Err(Error::MissingDisposalOperation {
                kind,
                operation: operation.to_owned(),
            }),
        };
        let next = if result.is_ok() { DISPOSED } else { LIVE };
        self.state.store(next, Ordering::Release);
        result
    }
}

impl<R: Resource> Tracked for Slot<R> {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn kind(&self) -> KindId {
        KindId::of::<R>()
    }

    fn is_a(&self, kind: &KindId) -> bool {
        R::is_a(kind)
    }

    fn state(&self) -> State {
        match self.state.load(Ordering::Acquire) {
            LIVE => State::Live,
            DISPOSING => State::Disposing,
            _ => State::Disposed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// OwnershipSet
// ---------------------------------------------------------------------------

/// Resources currently held by one owner, in acquisition order.
#[derive(Default)]
pub struct OwnershipSet {
    held: Mutex<IndexMap<ResourceId, TrackedRef>>,
}

impl OwnershipSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of held resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.lock().is_empty()
    }

    /// Whether the resource is held.
    #[must_use]
    pub fn contains(&self, id: ResourceId) -> bool {
        self.held.lock().contains_key(&id)
    }

    /// Held resource ids, in acquisition order.
    #[must_use]
    pub fn ids(&self) -> Vec<ResourceId> {
        self.held.lock().keys().copied().collect()
    }

    /// Insert, keeping the original position if already present.
    fn insert(&self, resource: TrackedRef) -> bool {
        let mut held = self.held.lock();
        if held.contains_key(&resource.id()) {
            return false;
        }
        held.insert(resource.id(), resource);
        true
    }

    fn remove(&self, id: ResourceId) -> Option<TrackedRef> {
        self.held.lock().shift_remove(&id)
    }

    fn snapshot(&self) -> Vec<TrackedRef> {
        self.held.lock().values().cloned().collect()
    }
}

impl fmt::Debug for OwnershipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tracker operations
// ---------------------------------------------------------------------------

impl Registry {
    /// Track `resource` as held by `owner`.
    ///
    /// Fails with [`Error::UnregisteredResource`] when no registered kind
    /// can dispose it. Adding the same resource twice is a no-op.
    pub fn add_resource(&self, owner: &dyn Owner, resource: TrackedRef) -> Result<()> {
        self.disposal_method(resource.as_ref())?;
        if owner.resources().insert(resource) {
            tracing::trace!(owner = %owner.id(), held = owner.resources().len(), "tracked resource");
        }
        Ok(())
    }

    /// Dispose one resource held by `owner`.
    ///
    /// The resource leaves the owner's set before anything else happens,
    /// so a teardown that disposes its dependents cannot release it twice.
    pub fn dispose_resource(&self, owner: &dyn Owner, resource: &TrackedRef) -> Result<Disposal> {
        let operation = self.disposal_method(resource.as_ref())?;
        owner.resources().remove(resource.id());

        if resource.state() != State::Live {
            return Ok(Disposal::AlreadyDisposed);
        }

        let pre = ResourceEvent::PreDisposal {
            resource: Arc::clone(resource),
        };
        if !self.bus().publish(owner, events::PRE_DISPOSAL, &pre) {
            tracing::debug!(
                owner = %owner.id(),
                resource_id = %resource.id(),
                kind = %resource.kind(),
                "disposal vetoed"
            );
            return Ok(Disposal::Vetoed);
        }

        if !resource.begin_disposal() {
            return Ok(Disposal::AlreadyDisposed);
        }

        match resource.finish_disposal(&operation) {
            Ok(()) => {
                tracing::debug!(
                    owner = %owner.id(),
                    resource_id = %resource.id(),
                    kind = %resource.kind(),
                    operation = %operation,
                    "disposed resource"
                );
                let event = ResourceEvent::Disposed {
                    resource: Arc::clone(resource),
                };
                self.bus().publish(owner, events::DISPOSED, &event);
                Ok(Disposal::Disposed)
            }
            Err(error) => {
                let event = ResourceEvent::DisposalFailed {
                    resource: Arc::clone(resource),
                    error: error.to_string(),
                };
                self.bus().publish(owner, events::DISPOSAL_FAILED, &event);
                Err(error)
            }
        }
    }

    /// Dispose everything `owner` holds, most recently acquired first.
    ///
    /// Every disposal is attempted; the first failure is returned after the
    /// rest have run. The disposed resources leave the set even when some
    /// of them failed. Calling this on an owner that holds nothing does
    /// nothing.
    pub fn cleanup_resources(&self, owner: &dyn Owner) -> Result<()> {
        let held = owner.resources().snapshot();
        if held.is_empty() {
            return Ok(());
        }
        tracing::debug!(owner = %owner.id(), count = held.len(), "cleaning up resources");

        let mut first_error = None;
        for resource in held.iter().rev() {
            if let Err(error) = self.dispose_resource(owner, resource) {
                tracing::warn!(
                    owner = %owner.id(),
                    resource_id = %resource.id(),
                    error = %error,
                    "disposal failed during cleanup"
                );
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        for resource in &held {
            owner.resources().remove(resource.id());
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
