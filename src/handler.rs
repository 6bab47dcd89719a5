//! Handler shapes and their adaptation to the canonical handler.
//!
//! # One calling convention
//!
//! Every route handler, not-found handler and gate middleware ends up as a
//! [`HandlerFunc`]: a shared `Fn(&mut Context) -> Result<(), Error>`. Users may write
//! handlers in a few other shapes; each is converted **once, at registration**:
//!
//! ```text
//! fn show(ctx: &mut Context) -> Result<(), Error>     ← canonical shape
//! fn raw(req: &Request, w: &mut ResponseWriter)       ← raw shape
//! impl ServeHttp for Static { … }                     ← object shape (raw)
//! Opaque::new(value)                                  ← decided by downcast
//!        ↓ IntoHandler::into_handler_kind
//! HandlerKind::{Canonical, Raw, Opaque}
//!        ↓ adapt()   (fails with Error::UnknownHandler)
//! HandlerFunc                                         ← stored on the route
//! ```
//!
//! Nothing on the request path inspects shapes; dispatch is one virtual call per link.

use std::any::{Any, type_name};
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::request::Request;
use crate::response::ResponseWriter;

/// The canonical handler.
pub type HandlerFunc = Arc<dyn Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static>;

/// A request/response-writer handler with no error channel.
pub type RawHandlerFunc = Arc<dyn Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static>;

/// Plain function pointer of the canonical shape, for use with [`Opaque`].
pub type HandlerFn = fn(&mut Context) -> Result<(), Error>;

/// Plain function pointer of the raw shape, for use with [`Opaque`].
pub type RawHandlerFn = fn(&Request, &mut ResponseWriter);

/// Object-style raw handler.
pub trait ServeHttp {
    fn serve_http(&self, req: &Request, w: &mut ResponseWriter);
}

impl<T: ServeHttp + ?Sized> ServeHttp for Arc<T> {
    fn serve_http(&self, req: &Request, w: &mut ResponseWriter) {
        (**self).serve_http(req, w);
    }
}

// ── Opaque values ─────────────────────────────────────────────────────────────

/// A type-erased value whose shape is decided at registration time.
///
/// Matching is by exact type: a named `fn` item must be cast to [`HandlerFn`] or
/// [`RawHandlerFn`] first, a service must be an `Arc<dyn ServeHttp + Send + Sync>`.
/// Anything else is rejected when registered.
pub struct Opaque {
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self { type_name: type_name::<T>(), value: Box::new(value) }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Moves the value out if it is exactly a `T`; gives `self` back otherwise.
    pub(crate) fn take<T: Any>(self) -> Result<T, Self> {
        let Self { type_name, value } = self;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|value| Self { type_name, value })
    }

    /// Recognises the handler shapes.
    pub(crate) fn resolve(self) -> Result<Resolved, Self> {
        let this = match self.take::<HandlerFunc>() {
            Ok(h) => return Ok(Resolved::Canonical(h)),
            Err(this) => this,
        };
        let this = match this.take::<HandlerFn>() {
            Ok(f) => return Ok(Resolved::Canonical(Arc::new(f))),
            Err(this) => this,
        };
        let this = match this.take::<RawHandlerFunc>() {
            Ok(f) => return Ok(Resolved::Raw(f)),
            Err(this) => this,
        };
        let this = match this.take::<RawHandlerFn>() {
            Ok(f) => return Ok(Resolved::Raw(Arc::new(f))),
            Err(this) => this,
        };
        match this.take::<Arc<dyn ServeHttp + Send + Sync>>() {
            Ok(s) => Ok(Resolved::Raw(service(s))),
            Err(this) => Err(this),
        }
    }
}

/// A concrete handler shape recovered from an [`Opaque`].
pub(crate) enum Resolved {
    Canonical(HandlerFunc),
    Raw(RawHandlerFunc),
}

fn service(s: impl ServeHttp + Send + Sync + 'static) -> RawHandlerFunc {
    Arc::new(move |req: &Request, w: &mut ResponseWriter| s.serve_http(req, w))
}

// ── Handler kinds ─────────────────────────────────────────────────────────────

/// The closed set of accepted handler shapes.
pub enum HandlerKind {
    Canonical(HandlerFunc),
    Raw(RawHandlerFunc),
    Opaque(Opaque),
}

/// Converts any accepted handler shape into the canonical handler.
pub fn adapt(kind: HandlerKind) -> Result<HandlerFunc, Error> {
    match kind {
        HandlerKind::Canonical(h) => Ok(h),
        HandlerKind::Raw(f) => Ok(from_raw(f)),
        HandlerKind::Opaque(o) => match o.resolve() {
            Ok(Resolved::Canonical(h)) => Ok(h),
            Ok(Resolved::Raw(f)) => Ok(from_raw(f)),
            Err(o) => Err(Error::UnknownHandler { type_name: o.type_name() }),
        },
    }
}

/// Runs a raw handler against the context's request and writer. Never fails.
fn from_raw(f: RawHandlerFunc) -> HandlerFunc {
    Arc::new(move |ctx: &mut Context| {
        f(&ctx.request, &mut ctx.response);
        Ok(())
    })
}

// ── IntoHandler ───────────────────────────────────────────────────────────────

/// Marker types selecting which shape a value is converted from.
///
/// They only exist so the compiler can tell the blanket impls of
/// [`IntoHandler`] and [`IntoMiddleware`](crate::middleware::IntoMiddleware) apart;
/// callers never name them.
pub mod shape {
    pub enum ContextFn {}
    pub enum RawFn {}
    pub enum ChainFn {}
    pub enum Service {}
    pub enum Canonical {}
    pub enum Kind {}
}

/// Implemented for every value accepted as a handler.
///
/// Satisfied automatically by:
///
/// ```text
/// Fn(&mut Context) -> Result<(), Error>
/// Fn(&Request, &mut ResponseWriter)
/// impl ServeHttp
/// HandlerFunc, RawHandlerFunc, HandlerKind, Opaque
/// ```
///
/// The trait is **sealed**: only the impls below can satisfy it.
pub trait IntoHandler<Shape>: private::Sealed<Shape> + Send + Sync + 'static {
    fn into_handler_kind(self) -> HandlerKind;
}

pub(crate) mod private {
    pub trait Sealed<Shape> {}
}

impl<F> private::Sealed<shape::ContextFn> for F
where
    F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
{
}

impl<F> IntoHandler<shape::ContextFn> for F
where
    F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
{
    fn into_handler_kind(self) -> HandlerKind {
        HandlerKind::Canonical(Arc::new(self))
    }
}

impl<F> private::Sealed<shape::RawFn> for F
where
    F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
{
}

impl<F> IntoHandler<shape::RawFn> for F
where
    F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
{
    fn into_handler_kind(self) -> HandlerKind {
        HandlerKind::Raw(Arc::new(self))
    }
}

impl<S> private::Sealed<shape::Service> for S where S: ServeHttp + Send + Sync + 'static {}

impl<S> IntoHandler<shape::Service> for S
where
    S: ServeHttp + Send + Sync + 'static,
{
    fn into_handler_kind(self) -> HandlerKind {
        HandlerKind::Raw(service(self))
    }
}

impl private::Sealed<shape::Canonical> for HandlerFunc {}

impl IntoHandler<shape::Canonical> for HandlerFunc {
    fn into_handler_kind(self) -> HandlerKind {
        HandlerKind::Canonical(self)
    }
}

impl private::Sealed<shape::Canonical> for RawHandlerFunc {}

impl IntoHandler<shape::Canonical> for RawHandlerFunc {
    fn into_handler_kind(self) -> HandlerKind {
        HandlerKind::Raw(self)
    }
}

impl private::Sealed<shape::Kind> for HandlerKind {}

impl IntoHandler<shape::Kind> for HandlerKind {
    fn into_handler_kind(self) -> HandlerKind {
        self
    }
}

impl private::Sealed<shape::Kind> for Opaque {}

impl IntoHandler<shape::Kind> for Opaque {
    fn into_handler_kind(self) -> HandlerKind {
        HandlerKind::Opaque(self)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    fn hello(ctx: &mut Context) -> Result<(), Error> {
        ctx.text(StatusCode::OK, "hello");
        Ok(())
    }

    fn raw_hello(_req: &Request, w: &mut ResponseWriter) {
        w.write_header(StatusCode::ACCEPTED);
        w.write_bytes(b"raw");
    }

    struct Teapot;

    impl ServeHttp for Teapot {
        fn serve_http(&self, _req: &Request, w: &mut ResponseWriter) {
            w.write_header(StatusCode::IM_A_TEAPOT);
        }
    }

    fn run(h: &HandlerFunc) -> (Result<(), Error>, Context) {
        let mut ctx = Context::default();
        let result = h(&mut ctx);
        (result, ctx)
    }

    #[test]
    fn canonical_handler_is_returned_unchanged() {
        let h: HandlerFunc = Arc::new(hello);
        let adapted = adapt(h.clone().into_handler_kind()).unwrap();
        assert!(Arc::ptr_eq(&h, &adapted));
    }

    #[test]
    fn raw_handler_writes_through_context_and_never_fails() {
        let h = adapt(raw_hello.into_handler_kind()).unwrap();
        let (result, ctx) = run(&h);
        assert!(result.is_ok());
        assert_eq!(ctx.resp().status(), StatusCode::ACCEPTED);
        assert_eq!(ctx.resp().body(), b"raw");
    }

    #[test]
    fn service_object_is_raw() {
        let h = adapt(Teapot.into_handler_kind()).unwrap();
        let (result, ctx) = run(&h);
        assert!(result.is_ok());
        assert_eq!(ctx.resp().status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn opaque_fn_pointers_are_recognised() {
        let h = adapt(Opaque::new(hello as HandlerFn).into_handler_kind()).unwrap();
        assert_eq!(run(&h).1.resp().body(), b"hello");

        let h = adapt(Opaque::new(raw_hello as RawHandlerFn).into_handler_kind()).unwrap();
        assert_eq!(run(&h).1.resp().body(), b"raw");

        let svc: Arc<dyn ServeHttp + Send + Sync> = Arc::new(Teapot);
        let h = adapt(Opaque::new(svc).into_handler_kind()).unwrap();
        assert_eq!(run(&h).1.resp().status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn unknown_opaque_shape_is_rejected() {
        let err = adapt(Opaque::new(42u8).into_handler_kind()).err().unwrap();
        assert!(matches!(err, Error::UnknownHandler { type_name: "u8" }));
    }

    #[test]
    fn opaque_fn_item_without_cast_is_rejected() {
        let err = adapt(HandlerKind::Opaque(Opaque::new(hello))).err().unwrap();
        assert!(matches!(err, Error::UnknownHandler { .. }));
    }
}
