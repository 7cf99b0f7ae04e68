//! Bus handlers that plug the registry into an owner's lifecycle.
//!
//! [`CleanupHook`] releases everything an owner holds when the owner's
//! framework publishes [`POST_EXECUTE`]. [`AuditHandler`] logs every
//! resource lifecycle event.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use warden_eventbus::{Handler, HandlerResult, Matcher, Position, Source, SubscriptionId};

use crate::context::Owner;
use crate::events::{self, ResourceEvent};
use crate::registry::Registry;

/// Published by the owning framework when a unit of work finishes.
pub const POST_EXECUTE: &str = "post-execute";

// ---------------------------------------------------------------------------
// CleanupHook
// ---------------------------------------------------------------------------

/// Runs bulk cleanup for owners of type `O` on [`POST_EXECUTE`].
///
/// Sources of any other type are ignored. Holds the registry weakly, so an
/// installed hook does not keep it alive.
pub struct CleanupHook<O> {
    registry: Weak<Registry>,
    _owner: PhantomData<fn(&O)>,
}

impl<O> CleanupHook<O> {
    /// Hook cleaning up through `registry`.
    #[must_use]
    pub fn new(registry: &Arc<Registry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            _owner: PhantomData,
        }
    }
}

impl<O: Owner + 'static> Handler for CleanupHook<O> {
    fn name(&self) -> &str {
        "cleanup"
    }

    fn handle(&self, source: &dyn Source, _payload: &dyn Any) -> HandlerResult {
        let Some(owner) = source.as_any().downcast_ref::<O>() else {
            return Ok(true);
        };
        let Some(registry) = self.registry.upgrade() else {
            return Ok(true);
        };
        registry.cleanup_resources(owner)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// AuditHandler
// ---------------------------------------------------------------------------

/// Logs every resource lifecycle event via `tracing::info!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditHandler;

impl Handler for AuditHandler {
    fn name(&self) -> &str {
        "audit"
    }

    fn handle(&self, source: &dyn Source, payload: &dyn Any) -> HandlerResult {
        if let Some(event) = payload.downcast_ref::<ResourceEvent>() {
            let resource_id = event.resource().map(|r| r.id().to_string());
            tracing::info!(
                hook = "audit",
                event = event.name(),
                source = %source.id(),
                kind = %event.kind(),
                resource_id = resource_id.as_deref(),
                error = event.error(),
                "resource lifecycle"
            );
        }
        Ok(true)
    }
}

impl Registry {
    /// Dispose an owner's resources whenever it publishes `post-execute`.
    pub fn install_cleanup_hook<O: Owner + 'static>(self: &Arc<Self>) -> SubscriptionId {
        self.bus()
            .subscribe(Matcher::Any, POST_EXECUTE, CleanupHook::<O>::new(self))
    }

    /// Log every resource lifecycle event on this registry's bus.
    pub fn install_audit(&self) -> Vec<SubscriptionId> {
        let audit: Arc<dyn Handler> = Arc::new(AuditHandler);
        events::ALL
            .iter()
            .map(|event| {
                self.bus().subscribe_arc(
                    Matcher::Any,
                    event,
                    Position::End,
                    Arc::clone(&audit),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use warden_eventbus::{Anonymous, EventBus};

    use super::*;
    use crate::context::Context;

    #[test]
    fn cleanup_hook_ignores_other_sources() {
        let registry = Registry::new(Arc::new(EventBus::new()));
        let hook = CleanupHook::<Context>::new(&registry);
        assert!(hook.handle(&Anonymous::new(), &()).unwrap());
    }

    #[test]
    fn cleanup_hook_tolerates_dropped_registry() {
        let registry = Registry::new(Arc::new(EventBus::new()));
        let hook = CleanupHook::<Context>::new(&registry);
        drop(registry);
        assert!(hook.handle(&Context::new("job"), &()).unwrap());
    }

    #[test]
    fn audit_subscribes_to_every_lifecycle_event() {
        let registry = Registry::new(Arc::new(EventBus::new()));
        let ids = registry.install_audit();
        assert_eq!(ids.len(), events::ALL.len());
        for event in events::ALL {
            assert_eq!(registry.bus().listener_count(event), 1);
        }
    }
}
