//! The application: setup surface and the request dispatcher.
//!
//! # Lifecycle
//!
//! An [`Application`] is built and mutated through `&mut self` (routes, middleware,
//! dependencies, error handler). To serve, it is moved into an `Arc`; from then on it
//! is read-only, which makes "no registration after serving starts" a compile-time
//! property rather than a runtime check.
//!
//! # Dispatch
//!
//! ```text
//! acquire context ─▶ reset(request, app)
//!        │
//!        ▼
//! router.match_route(method, path) ──none──▶ not-found handler (custom or 404)
//!        │
//!        ▼
//! mw[0](mw[1](…mw[n-1](handler)))(ctx)   ← composed once per route, then reused
//!        │
//!        ├── Ok(())  ─▶ response is whatever the chain wrote
//!        └── Err(e)  ─▶ error_handler(e, ctx)   (panics are caught and land here too)
//!        │
//!        ▼
//! take response ─▶ release context (guard drop, unconditional)
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::Full;
use tracing::{debug, error};

use crate::config::{Config, Env};
use crate::context::Context;
use crate::di::{Dependency, Di};
use crate::error::{Error, ErrorHandler, default_error_handler};
use crate::handler::{self, HandlerFunc, IntoHandler};
use crate::middleware::{self, Chain, IntoMiddleware};
use crate::pool::ContextPool;
use crate::request::Request;
use crate::router::Router;

/// An HTTP application: route table, middleware chain, error policy and context pool.
///
/// ```rust
/// use std::sync::Arc;
///
/// use flock::{Application, Context, Error, Request};
/// use http::StatusCode;
///
/// fn hello(ctx: &mut Context) -> Result<(), Error> {
///     let name = ctx.param("name").unwrap_or("world").to_owned();
///     ctx.text(StatusCode::OK, format!("hello, {name}"));
///     Ok(())
/// }
///
/// let mut app = Application::new();
/// app.get("/hello/{name}", hello)?;
///
/// let app = Arc::new(app);
/// let resp = app.dispatch(Request::from(http::Request::get("/hello/flock").body("").unwrap()));
/// assert_eq!(resp.status(), StatusCode::OK);
/// # Ok::<(), flock::Error>(())
/// ```
pub struct Application {
    config: Config,
    router: Router,
    middleware: Chain,
    error_handler: ErrorHandler,
    di: Di,
    pool: ContextPool,
    not_found: OnceLock<HandlerFunc>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// An application with default configuration and no middleware.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            pool: ContextPool::new(config.max_idle_contexts),
            config,
            router: Router::new(),
            middleware: Chain::new(),
            error_handler: Arc::new(default_error_handler),
            di: Di::new(),
            not_found: OnceLock::new(),
        }
    }

    /// Configuration from `FLOCK_*` variables plus the [`trace`](middleware::trace)
    /// middleware. Meant for `main`, never used internally.
    pub fn classic() -> Self {
        let mut app = Self::with_config(Config::from_env());
        app.middleware.push(middleware::trace());
        app
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn name(&self) -> &str { &self.config.name }
    pub fn env(&self) -> Env { self.config.env }
    pub fn debug(&self) -> bool { self.config.debug }
    pub fn router(&self) -> &Router { &self.router }
    pub fn pool(&self) -> &ContextPool { &self.pool }
    pub fn di(&self) -> &Di { &self.di }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
    }

    /// When on, every later GET registration also registers HEAD for the same pattern.
    pub fn set_auto_head(&mut self, auto_head: bool) {
        self.config.auto_head = auto_head;
    }

    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Error, &mut Context) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
    }

    pub fn set_di<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.di.set(name, value);
    }

    pub fn get_di(&self, name: &str) -> Option<&Dependency> {
        self.di.get(name)
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Appends a middleware. Registration order is execution order.
    ///
    /// Fails with [`Error::UnknownMiddleware`] when the value has no accepted shape.
    pub fn use_middleware<S>(&mut self, m: impl IntoMiddleware<S>) -> Result<&mut Self, Error> {
        let m = middleware::adapt(m.into_middleware_kind())?;
        self.middleware.push(m);
        self.router.reset_chains();
        self.not_found = OnceLock::new();
        Ok(self)
    }

    /// Replaces the built-in `404 page not found` handler.
    pub fn not_found<S>(&mut self, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        let h = handler::adapt(h.into_handler_kind())?;
        self.router.set_not_found(h);
        self.not_found = OnceLock::new();
        Ok(self)
    }

    pub fn get<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        let h = handler::adapt(h.into_handler_kind())?;
        self.router.add(Some(Method::GET), pattern, Arc::clone(&h))?;
        if self.config.auto_head {
            self.router.add(Some(Method::HEAD), pattern, h)?;
        }
        Ok(self)
    }

    pub fn head<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        self.add(Some(Method::HEAD), pattern, h)
    }

    pub fn post<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        self.add(Some(Method::POST), pattern, h)
    }

    pub fn put<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        self.add(Some(Method::PUT), pattern, h)
    }

    pub fn patch<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        self.add(Some(Method::PATCH), pattern, h)
    }

    pub fn delete<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        self.add(Some(Method::DELETE), pattern, h)
    }

    pub fn options<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        self.add(Some(Method::OPTIONS), pattern, h)
    }

    /// Matches every method not registered more specifically on the same pattern.
    pub fn any<S>(&mut self, pattern: &str, h: impl IntoHandler<S>) -> Result<&mut Self, Error> {
        self.add(None, pattern, h)
    }

    /// Registers one handler for a comma-separated method list, e.g. `"GET,POST"`.
    /// `*` means every method. Auto-HEAD does not apply here.
    pub fn route<S>(
        &mut self,
        pattern: &str,
        methods: &str,
        h: impl IntoHandler<S>,
    ) -> Result<&mut Self, Error> {
        let h = handler::adapt(h.into_handler_kind())?;
        for raw in methods.split(',').map(str::trim) {
            let method = match raw {
                "*" => None,
                _ => Some(
                    Method::from_bytes(raw.as_bytes())
                        .map_err(|_| Error::InvalidMethod(raw.to_owned()))?,
                ),
            };
            self.router.add(method, pattern, Arc::clone(&h))?;
        }
        Ok(self)
    }

    fn add<S>(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        h: impl IntoHandler<S>,
    ) -> Result<&mut Self, Error> {
        let h = handler::adapt(h.into_handler_kind())?;
        self.router.add(method, pattern, h)?;
        Ok(self)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Runs one request through the pipeline and returns the response.
    ///
    /// Never fails: handler errors and panics are turned into a response by the
    /// error handler. The pooled context is released on every path.
    pub fn dispatch(self: &Arc<Self>, request: Request) -> http::Response<Full<Bytes>> {
        let mut pooled = self.pool.acquire();
        let ctx: &mut Context = &mut pooled;
        ctx.reset(request, Some(Arc::clone(self)));

        let handler = self.resolve(ctx);
        let result = match panic::catch_unwind(AssertUnwindSafe(|| handler(ctx))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(path = ctx.request.path(), "recovered from handler panic: {message}");
                Err(Error::Panic(message))
            }
        };

        if let Err(err) = result {
            (self.error_handler)(&err, ctx);
        }

        debug!(
            method = %ctx.request.method,
            path = ctx.request.path(),
            status = ctx.response.status().as_u16(),
            "dispatched"
        );
        ctx.response.take_response()
    }

    /// Picks the composed handler for the context's request and fills its path params.
    fn resolve(&self, ctx: &mut Context) -> &HandlerFunc {
        let path = ctx.request.uri.path();
        if let Some((route, params)) = self.router.match_route(&ctx.request.method, path) {
            ctx.params.extend(params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
            return route.composed(&self.middleware);
        }

        self.not_found.get_or_init(|| {
            let fallback: HandlerFunc = match self.router.not_found_handler() {
                Some(h) => Arc::clone(h),
                None => Arc::new(default_not_found),
            };
            self.middleware.compose(fallback)
        })
    }
}

fn default_not_found(ctx: &mut Context) -> Result<(), Error> {
    ctx.text(StatusCode::NOT_FOUND, "404 page not found");
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
