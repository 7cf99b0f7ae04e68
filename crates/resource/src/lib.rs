//! # Warden Resource Tracking
//!
//! Registry and ownership tracker for externally acquired resources
//! (files, sockets, locks, sessions) held by units of work.
//!
//! Resource kinds are registered once with a named acquisition helper and a
//! named teardown operation. Every acquisition through a helper is recorded
//! against the acquiring [`Owner`], every disposal goes through one code
//! path, and [`Registry::cleanup_resources`] releases whatever an owner
//! still holds in reverse acquisition order. Each step is published on a
//! [`warden_eventbus::EventBus`] under the names in [`events`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use warden_eventbus::{BoxError, EventBus};
//! use warden_resource::prelude::*;
//! use std::result::Result;
//!
//! struct Scratch(Vec<u8>);
//!
//! impl Scratch {
//!     fn open(size: usize) -> Result<Self, BoxError> {
//!         Ok(Self(vec![0; size]))
//!     }
//!
//!     fn close(&mut self) -> Result<(), BoxError> {
//!         self.0.clear();
//!         Ok(())
//!     }
//! }
//!
//! impl Resource for Scratch {
//!     type Args = usize;
//!
//!     fn constructor(name: &str) -> Option<Constructor<Self>> {
//!         (name == "open").then_some(Self::open as Constructor<Self>)
//!     }
//!
//!     fn teardown(name: &str) -> Option<Teardown<Self>> {
//!         (name == "close").then_some(Self::close as Teardown<Self>)
//!     }
//! }
//!
//! let registry = Registry::new(Arc::new(EventBus::new()));
//! let scratch = registry.register::<Scratch>("scratch", KindOptions::default()).unwrap();
//!
//! let job = Arc::new(Context::new("job"));
//! let buf = scratch.acquire(&job, 64).unwrap().unwrap();
//! assert_eq!(buf.lock().0.len(), 64);
//!
//! registry.cleanup_resources(job.as_ref()).unwrap();
//! assert!(buf.is_disposed());
//! assert!(job.resources().is_empty());
//! ```

pub mod context;
pub mod error;
pub mod events;
pub mod handle;
pub mod hooks;
pub mod ownership;
pub mod registry;
pub mod resource;

pub use context::{Context, Owner};
pub use error::{Error, Result};
pub use events::ResourceEvent;
pub use handle::Handle;
pub use hooks::{AuditHandler, CleanupHook, POST_EXECUTE};
pub use ownership::{Disposal, OwnershipSet, ResourceId, State, Tracked, TrackedRef};
pub use registry::{Helper, Registry};
pub use resource::{Constructor, KindId, KindOptions, Resource, Teardown};

/// The event bus this crate publishes on.
pub use warden_eventbus as eventbus;

/// Common imports for defining and using resource kinds.
pub mod prelude {
    pub use crate::context::{Context, Owner};
    pub use crate::error::{Error, Result};
    pub use crate::events::ResourceEvent;
    pub use crate::handle::Handle;
    pub use crate::ownership::{Disposal, TrackedRef};
    pub use crate::registry::{Helper, Registry};
    pub use crate::resource::{Constructor, KindId, KindOptions, Resource, Teardown};
}
