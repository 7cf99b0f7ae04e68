//! # Warden event bus
//!
//! In-process publish/subscribe with synchronous, failure-isolated delivery.
//!
//! Subscriptions are registered per event name with a [`Matcher`] that
//! selects relevant sources: every source, one exact source, a category of
//! sources, or (transitively) anything owned by a matching context.
//!
//! ```
//! use std::any::Any;
//! use warden_eventbus::{Anonymous, EventBus, FnHandler, Matcher, Source};
//!
//! let bus = EventBus::new();
//! let job = Anonymous::new().with_category("job");
//!
//! bus.subscribe(
//!     Matcher::category("job"),
//!     "post-execute",
//!     FnHandler::new("print", |src: &dyn Source, _: &dyn Any| {
//!         println!("{} finished", src.id());
//!         Ok(true)
//!     }),
//! );
//!
//! assert!(bus.publish(&job, "post-execute", &()));
//! ```

pub mod bus;
pub mod handler;
pub mod matcher;
pub mod source;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bus::{EventBus, EventBusConfig, Position, SubscriptionId, panic_message};
pub use handler::{BoxError, FnHandler, Handler, HandlerResult, TypedHandler};
pub use matcher::Matcher;
pub use source::{Anonymous, Category, Source, SourceId};
