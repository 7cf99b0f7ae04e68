//! Synchronous, in-process event bus.
//!
//! Subscriptions are kept per event name in insertion order. [`EventBus::publish`]
//! delivers to every matching subscription, in order, on the calling thread.
//!
//! ## Rules
//! - **Deliver-all**: a handler returning `false` does not stop delivery;
//!   it only makes the aggregated result `false`.
//! - **Isolation**: handler errors and panics are logged and skipped.
//! - **Reentrant**: handlers may publish, subscribe or unsubscribe; dispatch
//!   iterates over a snapshot taken before the first handler runs.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::handler::Handler;
use crate::matcher::Matcher;
use crate::source::Source;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Event bus settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EventBusConfig {
    /// Emit a `debug` record for every subscribe, unsubscribe and publish.
    pub debug: bool,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Where a new subscription goes in its event's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Before every existing subscription.
    Start,
    /// After every existing subscription.
    #[default]
    End,
    /// At the given index, clamped to the list length.
    Index(usize),
}

struct Subscription {
    id: SubscriptionId,
    matcher: Matcher,
    handler: Arc<dyn Handler>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Named-event bus with source matching and synchronous delivery.
pub struct EventBus {
    config: EventBusConfig,
    subscriptions: RwLock<HashMap<String, Vec<Arc<Subscription>>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create an empty bus.
    #[must_use]
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            config,
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The settings this bus was built with.
    #[must_use]
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Append a subscription for `event`.
    pub fn subscribe<H>(&self, matcher: Matcher, event: &str, handler: H) -> SubscriptionId
    where
        H: Handler + 'static,
    {
        self.subscribe_at(matcher, event, Position::End, handler)
    }

    /// Insert a subscription for `event` at `position`.
    ///
    /// Duplicates are allowed; every one of them fires.
    pub fn subscribe_at<H>(
        &self,
        matcher: Matcher,
        event: &str,
        position: Position,
        handler: H,
    ) -> SubscriptionId
    where
        H: Handler + 'static,
    {
        self.subscribe_arc(matcher, event, position, Arc::new(handler))
    }

    /// Insert an already shared handler.
    pub fn subscribe_arc(
        &self,
        matcher: Matcher,
        event: &str,
        position: Position,
        handler: Arc<dyn Handler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription {
            id,
            matcher,
            handler,
        });

        let mut table = self.subscriptions.write();
        let list = table.entry(event.to_owned()).or_default();
        let index = match position {
            Position::Start => 0,
            Position::End => list.len(),
            Position::Index(i) => i.min(list.len()),
        };
        list.insert(index, subscription);
        let listeners = list.len();
        drop(table);

        if self.config.debug {
            tracing::debug!(event, subscription = %id, listeners, "subscribe");
        }
        id
    }

    /// Remove every subscription on `event` registered with exactly
    /// `matcher`.
    ///
    /// Comparison is literal: unsubscribing a specific source leaves
    /// wildcard and category subscriptions in place. Returns how many were
    /// removed.
    pub fn unsubscribe(&self, matcher: &Matcher, event: &str) -> usize {
        let mut table = self.subscriptions.write();
        let Some(list) = table.get_mut(event) else {
            return 0;
        };
        let before = list.len();
        list.retain(|s| s.matcher != *matcher);
        let removed = before - list.len();
        let listeners = list.len();
        if list.is_empty() {
            table.remove(event);
        }
        drop(table);

        if self.config.debug {
            tracing::debug!(event, %matcher, removed, listeners, "unsubscribe");
        }
        removed
    }

    /// Remove one subscription by its token.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut table = self.subscriptions.write();
        let mut found = None;
        for (event, list) in table.iter_mut() {
            if let Some(index) = list.iter().position(|s| s.id == id) {
                list.remove(index);
                found = Some((event.clone(), list.is_empty()));
                break;
            }
        }
        let Some((event, now_empty)) = found else {
            return false;
        };
        if now_empty {
            table.remove(&event);
        }
        drop(table);

        if self.config.debug {
            tracing::debug!(event = %event, subscription = %id, "remove subscription");
        }
        true
    }

    /// Deliver `payload` from `source` to every matching subscriber of
    /// `event`.
    ///
    /// Returns the logical AND of every handler's successful result,
    /// starting from `true`. Handlers that fail are logged and skipped.
    pub fn publish(&self, source: &dyn Source, event: &str, payload: &dyn Any) -> bool {
        let subscriptions = self.snapshot(event);

        if self.config.debug {
            tracing::debug!(
                event,
                source = %source.id(),
                listeners = subscriptions.len(),
                "publish"
            );
        }

        let mut result = true;
        for subscription in &subscriptions {
            if !subscription.matcher.matches(source) {
                continue;
            }
            let handler = &subscription.handler;
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| handler.handle(source, payload)));
            match outcome {
                Ok(Ok(accepted)) => result = result && accepted,
                Ok(Err(error)) => {
                    tracing::error!(
                        event,
                        handler = handler.name(),
                        subscription = %subscription.id,
                        error = %error,
                        "event handler failed"
                    );
                }
                Err(panic) => {
                    tracing::error!(
                        event,
                        handler = handler.name(),
                        subscription = %subscription.id,
                        panic = panic_message(panic.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
        result
    }

    /// Whether at least one subscription on `event` matches `source`.
    ///
    /// Lets publishers skip building expensive payloads.
    #[must_use]
    pub fn has_subscribers(&self, source: &dyn Source, event: &str) -> bool {
        self.subscriptions
            .read()
            .get(event)
            .is_some_and(|list| list.iter().any(|s| s.matcher.matches(source)))
    }

    /// Number of subscriptions registered for `event`, matching or not.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.subscriptions.read().get(event).map_or(0, Vec::len)
    }

    /// Event names that currently have at least one subscription.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subscriptions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.subscriptions.write().clear();
    }

    fn snapshot(&self, event: &str) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .read()
            .get(event)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.subscriptions.read();
        let total: usize = table.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("events", &table.len())
            .field("subscriptions", &total)
            .field("debug", &self.config.debug)
            .finish()
    }
}

/// Render a payload caught by `catch_unwind` for logs and errors.
pub fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
