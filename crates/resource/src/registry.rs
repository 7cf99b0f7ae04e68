//! Resource registry: kind registration, named acquisition helpers, and the
//! acquisition protocol.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use warden_eventbus::{BoxError, Category, EventBus, Source, SourceId};

use crate::context::Owner;
use crate::error::{Error, Result};
use crate::events::{self, ResourceEvent};
use crate::handle::Handle;
use crate::ownership::{Slot, Tracked, TrackedRef};
use crate::resource::{KindId, KindOptions, Resource};

/// Category every registry belongs to, for subscribers that want
/// registration events from any registry.
pub const REGISTRY_CATEGORY: &str = "resource-registry";

/// Acquisition body of a helper.
type AcquireFn<R> =
    Arc<dyn Fn(&dyn Owner, <R as Resource>::Args) -> std::result::Result<R, BoxError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct KindEntry {
    kind: KindId,
    disposal_method: String,
}

struct Binding {
    kind: KindId,
    /// An `AcquireFn<R>` for the bound kind.
    body: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct Tables {
    /// Registered kinds, in registration order.
    kinds: Vec<KindEntry>,
    /// Helper name -> binding, in registration order.
    helpers: IndexMap<String, Binding>,
}

impl Tables {
    fn entry(&self, kind: KindId) -> Option<&KindEntry> {
        self.kinds.iter().find(|entry| entry.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry of resource kinds and their acquisition helpers.
///
/// Shared as `Arc<Registry>`; the tables are written during setup and read
/// during acquisition and disposal. Lifecycle events go to the bus the
/// registry was built with.
pub struct Registry {
    id: SourceId,
    bus: Arc<EventBus>,
    tables: RwLock<Tables>,
}

impl Registry {
    /// Create an empty registry publishing on `bus`.
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            id: SourceId::next(),
            bus,
            tables: RwLock::new(Tables::default()),
        })
    }

    /// The bus lifecycle events are published on.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Register `R` and bind `helper` to its `options.acquisition_method`
    /// constructor.
    pub fn register<R: Resource>(
        self: &Arc<Self>,
        helper: &str,
        options: KindOptions,
    ) -> Result<Helper<R>> {
        self.bind::<R>(helper, &options, None)
    }

    /// Register `R` and bind `helper` to a custom acquisition body.
    ///
    /// The body receives the acquiring owner, so it can read the owner's
    /// metadata.
    pub fn register_with<R, F>(
        self: &Arc<Self>,
        helper: &str,
        options: KindOptions,
        body: F,
    ) -> Result<Helper<R>>
    where
        R: Resource,
        F: Fn(&dyn Owner, R::Args) -> std::result::Result<R, BoxError> + Send + Sync + 'static,
    {
        let body: AcquireFn<R> = Arc::new(body);
        self.bind::<R>(helper, &options, Some(body))
    }

    fn bind<R: Resource>(
        self: &Arc<Self>,
        helper: &str,
        options: &KindOptions,
        body: Option<AcquireFn<R>>,
    ) -> Result<Helper<R>> {
        let kind = KindId::of::<R>();
        let disposal = options.disposal_method.as_str();

        {
            let mut tables = self.tables.write();

            if let Some(existing) = tables.helpers.get(helper)
                && existing.kind != kind
            {
                return Err(Error::DuplicateRegistration {
                    helper: helper.to_owned(),
                    existing: existing.kind,
                    requested: kind,
                });
            }

            if R::teardown(disposal).is_none() {
                return Err(Error::MissingDisposalOperation {
                    kind,
                    operation: disposal.to_owned(),
                });
            }

            if let Some(entry) = tables.entry(kind)
                && entry.disposal_method != disposal
            {
                return Err(Error::ConflictingDisposalOperation {
                    kind,
                    existing: entry.disposal_method.clone(),
                    requested: disposal.to_owned(),
                });
            }

            let body: AcquireFn<R> = match body {
                Some(body) => body,
                None => {
                    let constructor = R::constructor(&options.acquisition_method).ok_or_else(
                        || Error::MissingAcquisitionOperation {
                            kind,
                            operation: options.acquisition_method.clone(),
                        },
                    )?;
                    Arc::new(move |_: &dyn Owner, args: R::Args| constructor(args))
                }
            };

            if tables.entry(kind).is_none() {
                tables.kinds.push(KindEntry {
                    kind,
                    disposal_method: disposal.to_owned(),
                });
            }
            tables.helpers.insert(
                helper.to_owned(),
                Binding {
                    kind,
                    body: Arc::new(body),
                },
            );
        }

        tracing::debug!(%kind, helper, disposal, "registered resource kind");
        let event = ResourceEvent::Registered {
            kind,
            helper: helper.to_owned(),
        };
        self.bus.publish(&**self, events::REGISTERED, &event);

        Ok(Helper {
            name: helper.to_owned(),
            registry: Arc::clone(self),
            _kind: PhantomData,
        })
    }

    /// Acquire an `R` through the helper named `helper`.
    ///
    /// Returns `Ok(None)` when a `resource.pre_acquire` subscriber vetoed
    /// the acquisition.
    pub fn acquire<R, O>(
        self: &Arc<Self>,
        owner: &Arc<O>,
        helper: &str,
        args: R::Args,
    ) -> Result<Option<Handle<R>>>
    where
        R: Resource,
        O: Owner + 'static,
    {
        self.acquire_dyn::<R>(Arc::clone(owner) as Arc<dyn Owner>, helper, args)
    }

    /// [`acquire`](Self::acquire) for owners kept as `Arc<dyn Owner>`.
    pub fn acquire_dyn<R: Resource>(
        self: &Arc<Self>,
        owner: Arc<dyn Owner>,
        helper: &str,
        args: R::Args,
    ) -> Result<Option<Handle<R>>> {
        let (kind, body) = {
            let tables = self.tables.read();
            let binding = tables
                .helpers
                .get(helper)
                .ok_or_else(|| Error::UnknownHelper {
                    helper: helper.to_owned(),
                })?;
            (binding.kind, Arc::clone(&binding.body))
        };

        if self.bus.has_subscribers(&*owner, events::PRE_ACQUIRE) {
            let event = ResourceEvent::PreAcquire {
                kind,
                args: Arc::new(args.clone()),
            };
            if !self.bus.publish(&*owner, events::PRE_ACQUIRE, &event) {
                tracing::debug!(owner = %owner.id(), %kind, helper, "acquisition vetoed");
                return Ok(None);
            }
        }

        match self.run_acquisition::<R>(helper, kind, &*body, &owner, args) {
            Ok(handle) => {
                tracing::debug!(
                    owner = %owner.id(),
                    %kind,
                    helper,
                    resource_id = %handle.id(),
                    "acquired resource"
                );
                let event = ResourceEvent::Acquired {
                    kind,
                    resource: handle.tracked(),
                };
                self.bus.publish(&*owner, events::ACQUIRED, &event);
                Ok(Some(handle))
            }
            Err(error) => {
                tracing::debug!(owner = %owner.id(), %kind, helper, %error, "acquisition failed");
                let event = ResourceEvent::AcquisitionFailed {
                    kind,
                    error: error.to_string(),
                };
                self.bus.publish(&*owner, events::ACQUISITION_FAILED, &event);
                Err(error)
            }
        }
    }

    fn run_acquisition<R: Resource>(
        self: &Arc<Self>,
        helper: &str,
        kind: KindId,
        body: &(dyn Any + Send + Sync),
        owner: &Arc<dyn Owner>,
        args: R::Args,
    ) -> Result<Handle<R>> {
        let body = body
            .downcast_ref::<AcquireFn<R>>()
            .filter(|_| kind.is::<R>())
            .ok_or_else(|| Error::TypeMismatch {
                helper: helper.to_owned(),
                expected: KindId::of::<R>(),
                found: kind,
            })?;

        let instance =
            (**body)(&**owner, args).map_err(|source| Error::Acquisition { kind, source })?;
        self.track(owner, instance)
    }

    fn track<R: Resource>(self: &Arc<Self>, owner: &Arc<dyn Owner>, instance: R) -> Result<Handle<R>> {
        let slot = Slot::new(instance);
        self.add_resource(&**owner, Arc::clone(&slot) as TrackedRef)?;
        Ok(Handle::new(slot, Arc::clone(owner), Arc::clone(self)))
    }

    /// Track an instance acquired outside any helper.
    ///
    /// Fails with [`Error::UnregisteredResource`] when no registered kind
    /// can dispose it. Publishes `resource.acquired` on success.
    pub fn adopt<R, O>(self: &Arc<Self>, owner: &Arc<O>, instance: R) -> Result<Handle<R>>
    where
        R: Resource,
        O: Owner + 'static,
    {
        self.adopt_dyn(Arc::clone(owner) as Arc<dyn Owner>, instance)
    }

    /// [`adopt`](Self::adopt) for owners kept as `Arc<dyn Owner>`.
    pub fn adopt_dyn<R: Resource>(
        self: &Arc<Self>,
        owner: Arc<dyn Owner>,
        instance: R,
    ) -> Result<Handle<R>> {
        let handle = self.track(&owner, instance)?;
        let event = ResourceEvent::Acquired {
            kind: KindId::of::<R>(),
            resource: handle.tracked(),
        };
        self.bus.publish(&*owner, events::ACQUIRED, &event);
        Ok(handle)
    }

    /// Name of the teardown operation that disposes `resource`.
    ///
    /// An exact kind registration wins; otherwise the first registered kind
    /// the resource belongs to.
    pub fn disposal_method(&self, resource: &dyn Tracked) -> Result<String> {
        let kind = resource.kind();
        let tables = self.tables.read();
        tables
            .entry(kind)
            .or_else(|| tables.kinds.iter().find(|entry| resource.is_a(&entry.kind)))
            .map(|entry| entry.disposal_method.clone())
            .ok_or(Error::UnregisteredResource { kind })
    }

    /// Registered kinds, in registration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<KindId> {
        self.tables.read().kinds.iter().map(|entry| entry.kind).collect()
    }

    /// Bound helper names, in registration order.
    #[must_use]
    pub fn helpers(&self) -> Vec<String> {
        self.tables.read().helpers.keys().cloned().collect()
    }

    /// Whether `R` has been registered.
    #[must_use]
    pub fn is_registered<R: Resource>(&self) -> bool {
        self.tables.read().entry(KindId::of::<R>()).is_some()
    }
}

impl Source for Registry {
    fn id(&self) -> SourceId {
        self.id
    }

    fn is_a(&self, category: &Category) -> bool {
        category.as_str() == REGISTRY_CATEGORY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("kinds", &tables.kinds)
            .field("helpers", &tables.helpers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

/// Typed acquisition helper returned by registration.
pub struct Helper<R> {
    name: String,
    registry: Arc<Registry>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Resource> Helper<R> {
    /// The helper name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire an instance for `owner`. See [`Registry::acquire`].
    pub fn acquire<O: Owner + 'static>(
        &self,
        owner: &Arc<O>,
        args: R::Args,
    ) -> Result<Option<Handle<R>>> {
        self.registry.acquire::<R, O>(owner, &self.name, args)
    }

    /// Acquire an instance for a type-erased owner.
    pub fn acquire_dyn(&self, owner: Arc<dyn Owner>, args: R::Args) -> Result<Option<Handle<R>>> {
        self.registry.acquire_dyn::<R>(owner, &self.name, args)
    }

    /// The registry the helper is bound in.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl<R> Clone for Helper<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            registry: Arc::clone(&self.registry),
            _kind: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Helper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper").field("name", &self.name).finish()
    }
}
