//! Per-request context.
//!
//! A [`Context`] carries one request, its buffered response, the path parameters
//! extracted by the router, a small per-request value store and a reference back to
//! the owning [`Application`]. Contexts are pooled: between two requests every field
//! is reset, so nothing from request *k − 1* is visible during request *k*.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use http::header::{HeaderValue, LOCATION};

use crate::app::Application;
use crate::error::Error;
use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};

/// Mutable state for one in-flight request.
///
/// Handed to every handler and middleware as `&mut Context`. A context belongs to
/// exactly one request at a time; holding on to data borrowed from it past the
/// handler call is impossible by construction.
#[derive(Default)]
pub struct Context {
    pub(crate) request: Request,
    pub(crate) response: ResponseWriter,
    pub(crate) params: HashMap<String, String>,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    app: Option<Arc<Application>>,
}

impl Context {
    /// Rebinds the context to a new request. Every field is overwritten.
    pub(crate) fn reset(&mut self, request: Request, app: Option<Arc<Application>>) {
        self.request = request;
        self.response.reset();
        self.params.clear();
        self.store.clear();
        self.app = app;
    }

    /// Returns the context to its idle state. Drops the application reference so an
    /// idle pooled context never keeps its owner alive.
    pub(crate) fn clear(&mut self) {
        self.reset(Request::default(), None);
    }

    pub fn req(&self) -> &Request { &self.request }
    pub fn resp(&self) -> &ResponseWriter { &self.response }
    pub fn resp_mut(&mut self) -> &mut ResponseWriter { &mut self.response }

    /// The owning application. `None` only for contexts built outside a dispatch.
    pub fn app(&self) -> Option<&Application> {
        self.app.as_deref()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `ctx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.request.query(key)
    }

    /// Fetches a typed value from the application's dependency registry.
    pub fn di<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.app()?.di().get_as(name)
    }

    /// Stores a request-scoped value, e.g. the authenticated user set by an auth gate.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.store.get(key)?.downcast_ref()
    }

    // ── Output helpers ────────────────────────────────────────────────────────

    pub fn status(&mut self, code: StatusCode) {
        self.response.write_header(code);
    }

    /// Writes a `text/plain; charset=utf-8` body with the given status.
    pub fn text(&mut self, code: StatusCode, body: impl AsRef<str>) {
        self.bytes(code, ContentType::Text, body.as_ref().as_bytes());
    }

    /// Writes a JSON body. The bytes are sent as-is; serialise however you like.
    pub fn json(&mut self, code: StatusCode, body: impl AsRef<[u8]>) {
        self.bytes(code, ContentType::Json, body.as_ref());
    }

    pub fn bytes(&mut self, code: StatusCode, content_type: ContentType, body: &[u8]) {
        self.response.set_content_type(content_type);
        self.response.write_header(code);
        self.response.write_bytes(body);
    }

    /// Sends a redirect to `location`. Fails when `location` is not a valid header value.
    pub fn redirect(&mut self, code: StatusCode, location: &str) -> Result<(), Error> {
        let value = HeaderValue::from_str(location).map_err(Error::other)?;
        self.response.headers_mut().insert(LOCATION, value);
        self.response.write_header(code);
        Ok(())
    }
}
