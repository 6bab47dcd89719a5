//! Middleware shapes, adaptation and the ordered chain.
//!
//! Middleware intercepts requests and is the right place for cross-cutting concerns:
//! structured tracing, request-id injection, authentication gates.
//!
//! Every middleware is adapted, at registration, into a [`MiddlewareFunc`]: a function
//! from the next handler to a new handler. Three user shapes are accepted and they do
//! **not** behave the same way:
//!
//! | Shape | Runs inner handler when it fails? |
//! |---|---|
//! | `Fn(HandlerFunc) -> HandlerFunc` | decides itself |
//! | `Fn(&mut Context) -> Result<(), Error>` (gate) | **no**, its error is returned |
//! | `Fn(&Request, &mut ResponseWriter)` (generic) | always runs, has no failure channel |
//!
//! Built-in middleware:
//! - [`trace`]: per-request event with method, path, status, latency

mod trace;

use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{
    HandlerFunc, Opaque, RawHandlerFunc, Resolved, ServeHttp, private::Sealed, shape,
};
use crate::request::Request;
use crate::response::ResponseWriter;

pub use trace::trace;

/// The canonical chain-transformer.
pub type MiddlewareFunc = Arc<dyn Fn(HandlerFunc) -> HandlerFunc + Send + Sync + 'static>;

/// Plain function pointer of the chain-transformer shape, for use with [`Opaque`].
pub type MiddlewareFn = fn(HandlerFunc) -> HandlerFunc;

/// The closed set of accepted middleware shapes.
pub enum MiddlewareKind {
    Chain(MiddlewareFunc),
    /// A canonical handler that may veto the rest of the chain.
    Gate(HandlerFunc),
    /// A side-effect-only function that can never stop the chain.
    Generic(RawHandlerFunc),
    Opaque(Opaque),
}

/// Converts any accepted middleware shape into a chain-transformer.
pub fn adapt(kind: MiddlewareKind) -> Result<MiddlewareFunc, Error> {
    match kind {
        MiddlewareKind::Chain(m) => Ok(m),
        MiddlewareKind::Gate(h) => Ok(gate(h)),
        MiddlewareKind::Generic(f) => Ok(generic(f)),
        MiddlewareKind::Opaque(o) => adapt_opaque(o),
    }
}

fn adapt_opaque(o: Opaque) -> Result<MiddlewareFunc, Error> {
    let o = match o.take::<MiddlewareFunc>() {
        Ok(m) => return Ok(m),
        Err(o) => o,
    };
    let o = match o.take::<MiddlewareFn>() {
        Ok(f) => return Ok(Arc::new(f)),
        Err(o) => o,
    };
    match o.resolve() {
        Ok(Resolved::Canonical(h)) => Ok(gate(h)),
        Ok(Resolved::Raw(f)) => Ok(generic(f)),
        Err(o) => Err(Error::UnknownMiddleware { type_name: o.type_name() }),
    }
}

/// Runs `m` first; the inner handler only runs when `m` succeeds.
fn gate(m: HandlerFunc) -> MiddlewareFunc {
    Arc::new(move |next: HandlerFunc| -> HandlerFunc {
        let m = Arc::clone(&m);
        Arc::new(move |ctx: &mut Context| -> Result<(), Error> {
            m(ctx)?;
            next(ctx)
        })
    })
}

/// Runs `m` first, then always the inner handler, whose result is returned.
fn generic(m: RawHandlerFunc) -> MiddlewareFunc {
    Arc::new(move |next: HandlerFunc| -> HandlerFunc {
        let m = Arc::clone(&m);
        Arc::new(move |ctx: &mut Context| {
            m(&ctx.request, &mut ctx.response);
            next(ctx)
        })
    })
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// Middleware in registration order.
#[derive(Clone, Default)]
pub struct Chain {
    links: Vec<MiddlewareFunc>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, m: MiddlewareFunc) {
        self.links.push(m);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Wraps `handler` so that `links[0]` is outermost:
    /// `links[0](links[1](…links[n-1](handler)))`.
    pub fn compose(&self, handler: HandlerFunc) -> HandlerFunc {
        self.links.iter().rev().fold(handler, |inner, m| m(inner))
    }
}

// ── IntoMiddleware ────────────────────────────────────────────────────────────

/// Implemented for every value accepted as middleware.
///
/// Satisfied automatically by:
///
/// ```text
/// Fn(HandlerFunc) -> HandlerFunc                → chain-transformer
/// Fn(&mut Context) -> Result<(), Error>         → gate
/// Fn(&Request, &mut ResponseWriter)             → generic
/// impl ServeHttp                                → generic
/// MiddlewareFunc, HandlerFunc, RawHandlerFunc, MiddlewareKind, Opaque
/// ```
pub trait IntoMiddleware<Shape>: Sealed<Shape> + Send + Sync + 'static {
    fn into_middleware_kind(self) -> MiddlewareKind;
}

// Shares the seal with `IntoHandler`.

impl<F> Sealed<shape::ChainFn> for F where F: Fn(HandlerFunc) -> HandlerFunc + Send + Sync + 'static {}

impl<F> IntoMiddleware<shape::ChainFn> for F
where
    F: Fn(HandlerFunc) -> HandlerFunc + Send + Sync + 'static,
{
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Chain(Arc::new(self))
    }
}

impl<F> IntoMiddleware<shape::ContextFn> for F
where
    F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
{
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Gate(Arc::new(self))
    }
}

impl<F> IntoMiddleware<shape::RawFn> for F
where
    F: Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
{
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Generic(Arc::new(self))
    }
}

impl<S> IntoMiddleware<shape::Service> for S
where
    S: ServeHttp + Send + Sync + 'static,
{
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Generic(Arc::new(move |req: &Request, w: &mut ResponseWriter| {
            self.serve_http(req, w)
        }))
    }
}

impl Sealed<shape::Canonical> for MiddlewareFunc {}

impl IntoMiddleware<shape::Canonical> for MiddlewareFunc {
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Chain(self)
    }
}

impl IntoMiddleware<shape::Canonical> for HandlerFunc {
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Gate(self)
    }
}

impl IntoMiddleware<shape::Canonical> for RawHandlerFunc {
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Generic(self)
    }
}

impl Sealed<shape::Kind> for MiddlewareKind {}

impl IntoMiddleware<shape::Kind> for MiddlewareKind {
    fn into_middleware_kind(self) -> MiddlewareKind {
        self
    }
}

impl IntoMiddleware<shape::Kind> for Opaque {
    fn into_middleware_kind(self) -> MiddlewareKind {
        MiddlewareKind::Opaque(self)
    }
}
