//! Subscriber handlers.
//!
//! A [`Handler`] is an explicit object holding whatever state it needs as
//! named fields. [`FnHandler`] and [`TypedHandler`] adapt closures for
//! ad-hoc subscribers.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::source::Source;

/// Boxed error returned by handlers and resource bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single handler invocation.
///
/// `Ok(true)` lets the publish succeed, `Ok(false)` makes the aggregated
/// publish result false, `Err` is logged and otherwise ignored.
pub type HandlerResult = Result<bool, BoxError>;

/// Receives events published on the bus.
pub trait Handler: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one event. `payload` is whatever the publisher passed.
    fn handle(&self, source: &dyn Source, payload: &dyn Any) -> HandlerResult;
}

impl fmt::Debug for dyn Handler + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// FnHandler
// ---------------------------------------------------------------------------

/// Handler backed by a closure over the raw payload.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&dyn Source, &dyn Any) -> HandlerResult + Send + Sync,
{
    /// Wrap `f` under a diagnostic name.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&dyn Source, &dyn Any) -> HandlerResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, source: &dyn Source, payload: &dyn Any) -> HandlerResult {
        (self.f)(source, payload)
    }
}

// ---------------------------------------------------------------------------
// TypedHandler
// ---------------------------------------------------------------------------

/// Handler that only reacts to payloads of type `P`.
///
/// Payloads of any other type are ignored and count as `Ok(true)`.
pub struct TypedHandler<P, F> {
    name: String,
    f: F,
    _payload: PhantomData<fn(&P)>,
}

impl<P, F> TypedHandler<P, F>
where
    P: Any,
    F: Fn(&dyn Source, &P) -> HandlerResult + Send + Sync,
{
    /// Wrap `f` under a diagnostic name.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _payload: PhantomData,
        }
    }
}

impl<P, F> Handler for TypedHandler<P, F>
where
    P: Any,
    F: Fn(&dyn Source, &P) -> HandlerResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, source: &dyn Source, payload: &dyn Any) -> HandlerResult {
        match payload.downcast_ref::<P>() {
            Some(payload) => (self.f)(source, payload),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Anonymous;

    #[test]
    fn fn_handler_passes_through() {
        let h = FnHandler::new("veto", |_: &dyn Source, _: &dyn Any| Ok(false));
        assert_eq!(h.name(), "veto");
        assert!(!h.handle(&Anonymous::new(), &()).unwrap());
    }

    #[test]
    fn typed_handler_ignores_other_payloads() {
        let h = TypedHandler::new("len", |_: &dyn Source, s: &String| Ok(s.len() > 3));
        let src = Anonymous::new();
        assert!(h.handle(&src, &String::from("long enough")).unwrap());
        assert!(!h.handle(&src, &String::from("no")).unwrap());
        assert!(h.handle(&src, &42u32).unwrap());
    }
}
