//! # flock
//!
//! A small HTTP dispatcher. Given a request it resolves a route, threads the
//! request through an ordered middleware chain, runs the handler and turns any
//! failure into exactly one response.
//!
//! ## The pipeline
//!
//! - **Pooled contexts**: each request borrows a [`Context`] from a pool and gives
//!   it back, fully reset, when done.
//! - **One calling convention**: handlers and middleware may be written in several
//!   shapes; each is adapted once at registration into a [`HandlerFunc`] or
//!   [`MiddlewareFunc`]. Unknown shapes fail registration, never a request.
//! - **Ordered chain**: middleware registered first runs first and wraps everything
//!   after it.
//! - **Central error policy**: handlers return errors; only the [`ErrorHandler`]
//!   writes error responses.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use flock::{Application, Context, Error, HttpError, Server};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut app = Application::classic();
//!     app.use_middleware(require_token)?
//!        .get("/users/{id}", get_user)?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! // Gate middleware: an error stops the chain.
//! fn require_token(ctx: &mut Context) -> Result<(), Error> {
//!     match ctx.req().header("authorization") {
//!         Some(_) => Ok(()),
//!         None => Err(HttpError::new(StatusCode::UNAUTHORIZED).into()),
//!     }
//! }
//!
//! fn get_user(ctx: &mut Context) -> Result<(), Error> {
//!     let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!     ctx.json(StatusCode::OK, format!(r#"{{"id":"{id}"}}"#));
//!     Ok(())
//! }
//! ```

mod app;
mod config;
mod context;
mod di;
mod error;
mod handler;
mod pool;
mod request;
mod response;
mod router;
mod server;

pub mod health;
pub mod middleware;

pub use app::Application;
pub use config::{Config, Env};
pub use context::Context;
pub use di::{Dependency, Di};
pub use error::{Error, ErrorHandler, HttpError, default_error_handler};
pub use handler::{
    HandlerFn, HandlerFunc, HandlerKind, IntoHandler, Opaque, RawHandlerFn, RawHandlerFunc,
    ServeHttp, shape,
};
pub use middleware::{Chain, IntoMiddleware, MiddlewareFn, MiddlewareFunc, MiddlewareKind};
pub use pool::{ContextPool, PooledContext};
pub use request::Request;
pub use response::{ContentType, ResponseWriter};
pub use router::{Route, Router};
pub use server::{Server, serve_listener};

/// Adapts a handler value without registering it. See [`IntoHandler`].
pub fn adapt_handler<S>(h: impl IntoHandler<S>) -> Result<HandlerFunc, Error> {
    handler::adapt(h.into_handler_kind())
}

/// Adapts a middleware value without registering it. See [`IntoMiddleware`].
pub fn adapt_middleware<S>(m: impl IntoMiddleware<S>) -> Result<MiddlewareFunc, Error> {
    middleware::adapt(m.into_middleware_kind())
}
