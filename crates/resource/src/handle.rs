//! Handles to acquired instances

use std::fmt;
use std::sync::Arc;

use parking_lot::MutexGuard;
use warden_eventbus::Source;

use crate::context::Owner;
use crate::error::Result;
use crate::ownership::{Disposal, ResourceId, Slot, State, Tracked, TrackedRef};
use crate::registry::Registry;
use crate::resource::Resource;

/// Handle returned by a successful acquisition.
///
/// Forwards everything to the underlying instance except disposal:
/// [`Handle::dispose`] goes through [`Registry::dispose_resource`], so the
/// instance leaves its owner's set and the disposal events fire. Cloning a
/// handle shares the instance. Dropping a handle does not dispose anything;
/// the owner's cleanup does.
pub struct Handle<R: Resource> {
    slot: Arc<Slot<R>>,
    owner: Arc<dyn Owner>,
    registry: Arc<Registry>,
}

impl<R: Resource> Handle<R> {
    pub(crate) fn new(slot: Arc<Slot<R>>, owner: Arc<dyn Owner>, registry: Arc<Registry>) -> Self {
        Self {
            slot,
            owner,
            registry,
        }
    }

    /// Identity of the tracked instance.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.slot.id()
    }

    /// Lock the instance for direct use.
    pub fn lock(&self) -> MutexGuard<'_, R> {
        self.slot.instance.lock()
    }

    /// Dispose the instance through the tracker.
    pub fn dispose(&self) -> Result<Disposal> {
        let tracked: TrackedRef = self.tracked();
        self.registry
            .dispose_resource(self.owner.as_ref(), &tracked)
    }

    /// Whether the teardown already completed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.slot.state() == State::Disposed
    }

    /// Type-erased reference to the instance, as carried by events.
    #[must_use]
    pub fn tracked(&self) -> TrackedRef {
        Arc::clone(&self.slot) as TrackedRef
    }

    /// The owner that acquired the instance.
    #[must_use]
    pub fn owner(&self) -> &Arc<dyn Owner> {
        &self.owner
    }
}

impl<R: Resource> Clone for Handle<R> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            owner: Arc::clone(&self.owner),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<R: Resource> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.slot.id())
            .field("kind", &R::kind_name())
            .field("state", &self.slot.state())
            .field("owner", &self.owner.id())
            .finish()
    }
}
