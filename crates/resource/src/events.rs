//! Resource lifecycle events.
//!
//! Every event is published on the registry's [`EventBus`](warden_eventbus::EventBus)
//! under one of the stable names below, with a [`ResourceEvent`] as payload.
//! Registration events come from the registry itself; acquisition and
//! disposal events come from the owning context.

use std::any::Any;
use std::sync::Arc;

use crate::ownership::TrackedRef;
use crate::resource::KindId;

/// A kind was registered: `(kind, helper)`.
pub const REGISTERED: &str = "resource.registered";
/// An acquisition is about to start: `(kind, args)`. Returning `false` suppresses it.
pub const PRE_ACQUIRE: &str = "resource.pre_acquire";
/// An instance was acquired and tracked: `(kind, resource)`.
pub const ACQUIRED: &str = "resource.acquired";
/// Acquisition failed: `(kind, error)`.
pub const ACQUISITION_FAILED: &str = "resource.acquisition_failed";
/// A disposal is about to run: `(resource)`. Returning `false` vetoes it.
pub const PRE_DISPOSAL: &str = "resource.pre-disposal";
/// An instance was torn down: `(resource)`.
pub const DISPOSED: &str = "resource.disposed";
/// Teardown failed: `(resource, error)`.
pub const DISPOSAL_FAILED: &str = "resource.disposal-failed";

/// Every resource event name, in lifecycle order.
pub const ALL: [&str; 7] = [
    REGISTERED,
    PRE_ACQUIRE,
    ACQUIRED,
    ACQUISITION_FAILED,
    PRE_DISPOSAL,
    DISPOSED,
    DISPOSAL_FAILED,
];

// ---------------------------------------------------------------------------
// ResourceEvent
// ---------------------------------------------------------------------------

/// Payload of every resource lifecycle event.
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    /// A kind was registered under a helper name.
    Registered {
        /// The registered kind.
        kind: KindId,
        /// The helper name bound to it.
        helper: String,
    },
    /// An acquisition is about to run.
    PreAcquire {
        /// The kind being acquired.
        kind: KindId,
        /// A copy of the caller's arguments; see [`ResourceEvent::args`].
        args: Arc<dyn Any + Send + Sync>,
    },
    /// An instance was acquired and is now tracked.
    Acquired {
        /// The acquired kind.
        kind: KindId,
        /// The tracked instance.
        resource: TrackedRef,
    },
    /// The acquisition body or its checks failed.
    AcquisitionFailed {
        /// The kind that failed.
        kind: KindId,
        /// Rendered error.
        error: String,
    },
    /// A disposal is about to run.
    PreDisposal {
        /// The instance being disposed.
        resource: TrackedRef,
    },
    /// An instance was torn down.
    Disposed {
        /// The disposed instance.
        resource: TrackedRef,
    },
    /// Teardown failed; the instance is no longer tracked.
    DisposalFailed {
        /// The instance.
        resource: TrackedRef,
        /// Rendered error.
        error: String,
    },
}

impl ResourceEvent {
    /// Event name this payload is published under.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered { .. } => REGISTERED,
            Self::PreAcquire { .. } => PRE_ACQUIRE,
            Self::Acquired { .. } => ACQUIRED,
            Self::AcquisitionFailed { .. } => ACQUISITION_FAILED,
            Self::PreDisposal { .. } => PRE_DISPOSAL,
            Self::Disposed { .. } => DISPOSED,
            Self::DisposalFailed { .. } => DISPOSAL_FAILED,
        }
    }

    /// Kind the event is about.
    #[must_use]
    pub fn kind(&self) -> KindId {
        match self {
            Self::Registered { kind, .. }
            | Self::PreAcquire { kind, .. }
            | Self::Acquired { kind, .. }
            | Self::AcquisitionFailed { kind, .. } => *kind,
            Self::PreDisposal { resource }
            | Self::Disposed { resource }
            | Self::DisposalFailed { resource, .. } => resource.kind(),
        }
    }

    /// The tracked instance, for events that carry one.
    #[must_use]
    pub fn resource(&self) -> Option<&TrackedRef> {
        match self {
            Self::Acquired { resource, .. }
            | Self::PreDisposal { resource }
            | Self::Disposed { resource }
            | Self::DisposalFailed { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// The acquisition arguments of a [`PreAcquire`](Self::PreAcquire)
    /// event, if they are an `A`.
    #[must_use]
    pub fn args<A: Any>(&self) -> Option<&A> {
        match self {
            Self::PreAcquire { args, .. } => args.downcast_ref::<A>(),
            _ => None,
        }
    }

    /// Rendered error, for failure events.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::AcquisitionFailed { error, .. } | Self::DisposalFailed { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}
