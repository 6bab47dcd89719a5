//! Radix-tree route table.
//!
//! One tree per HTTP method plus one wildcard tree for routes registered with
//! [`Application::any`](crate::Application::any). O(path-length) lookup. Method trees
//! win over the wildcard tree.

use std::collections::HashMap;
use std::sync::OnceLock;

use http::Method;
use matchit::{Params, Router as MatchitRouter};

use crate::error::Error;
use crate::handler::HandlerFunc;
use crate::middleware::Chain;

/// A registered method + pattern and its adapted handler.
pub struct Route {
    method: Option<Method>,
    pattern: String,
    handler: HandlerFunc,
    composed: OnceLock<HandlerFunc>,
}

impl Route {
    /// `None` for wildcard-method routes.
    pub fn method(&self) -> Option<&Method> { self.method.as_ref() }
    pub fn pattern(&self) -> &str { &self.pattern }
    pub fn handler(&self) -> &HandlerFunc { &self.handler }

    /// The handler wrapped in `chain`, composed on first use.
    pub(crate) fn composed(&self, chain: &Chain) -> &HandlerFunc {
        self.composed.get_or_init(|| chain.compose(self.handler.clone()))
    }
}

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    trees: HashMap<Method, MatchitRouter<usize>>,
    any: MatchitRouter<usize>,
    not_found: Option<HandlerFunc>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` (or every method when `None`) at `pattern`.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*rest}`.
    pub fn add(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: HandlerFunc,
    ) -> Result<(), Error> {
        let index = self.routes.len();
        let tree = match &method {
            Some(m) => self.trees.entry(m.clone()).or_default(),
            None => &mut self.any,
        };
        tree.insert(pattern, index)
            .map_err(|source| Error::InvalidRoute { path: pattern.to_owned(), source })?;

        self.routes.push(Route {
            method,
            pattern: pattern.to_owned(),
            handler,
            composed: OnceLock::new(),
        });
        Ok(())
    }

    /// Resolves `method` + `path` to a route and its extracted parameters.
    pub fn match_route<'p>(&self, method: &Method, path: &'p str) -> Option<(&Route, Params<'_, 'p>)> {
        let hit = self.trees
            .get(method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok())?;
        let route = self.routes.get(*hit.value)?;
        Some((route, hit.params))
    }

    pub fn set_not_found(&mut self, handler: HandlerFunc) {
        self.not_found = Some(handler);
    }

    pub fn not_found_handler(&self) -> Option<&HandlerFunc> {
        self.not_found.as_ref()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Forgets every memoized chain. Needed whenever the middleware list changes.
    pub(crate) fn reset_chains(&mut self) {
        for route in &mut self.routes {
            route.composed = OnceLock::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::context::Context;

    use super::*;

    fn noop() -> HandlerFunc {
        Arc::new(|_: &mut Context| -> Result<(), Error> { Ok(()) })
    }

    #[test]
    fn matches_by_method_and_extracts_params() {
        let mut router = Router::new();
        router.add(Some(Method::GET), "/users/{id}", noop()).unwrap();

        let (route, params) = router.match_route(&Method::GET, "/users/42").unwrap();
        assert_eq!(route.pattern(), "/users/{id}");
        assert_eq!(params.get("id"), Some("42"));

        assert!(router.match_route(&Method::POST, "/users/42").is_none());
        assert!(router.match_route(&Method::GET, "/teams/1").is_none());
    }

    #[test]
    fn wildcard_method_is_a_fallback() {
        let mut router = Router::new();
        router.add(None, "/ping", noop()).unwrap();
        router.add(Some(Method::GET), "/ping", noop()).unwrap();

        let (route, _) = router.match_route(&Method::GET, "/ping").unwrap();
        assert_eq!(route.method(), Some(&Method::GET));

        let (route, _) = router.match_route(&Method::DELETE, "/ping").unwrap();
        assert_eq!(route.method(), None);
    }

    #[test]
    fn conflicting_pattern_is_rejected() {
        let mut router = Router::new();
        router.add(Some(Method::GET), "/a", noop()).unwrap();
        let err = router.add(Some(Method::GET), "/a", noop()).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { ref path, .. } if path == "/a"));
        assert_eq!(router.routes().len(), 1);
    }
}
