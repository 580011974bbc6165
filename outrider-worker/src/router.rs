//! First-match request routing.
//!
//! A [`Router`] holds an ordered list of routes, each a pure predicate paired
//! with a handler. The first route whose predicate accepts a request handles
//! it; when none does the platform's default handling applies.

use async_trait::async_trait;
use outrider_core::{InterceptedRequest, Response};
use std::fmt;
use std::sync::Arc;

/// What the worker does with an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Answer with this response.
    Respond(Response),
    /// Do not answer; the platform fetches as if no worker were installed.
    Passthrough,
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Respond(response) => Some(response),
            Self::Passthrough => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Respond(response) => Some(response),
            Self::Passthrough => None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough)
    }
}

/// Handles requests accepted by a route.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, request: &InterceptedRequest) -> FetchOutcome;
}

/// Route predicate. Must be pure.
pub type RoutePredicate = Box<dyn Fn(&InterceptedRequest) -> bool + Send + Sync>;

/// A named (predicate, handler) pair.
pub struct Route {
    name: String,
    predicate: RoutePredicate,
    handler: Arc<dyn RouteHandler>,
}

impl Route {
    pub fn new<P>(name: impl Into<String>, predicate: P, handler: Arc<dyn RouteHandler>) -> Self
    where
        P: Fn(&InterceptedRequest) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        (self.predicate)(request)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("name", &self.name).finish()
    }
}

/// Ordered route list evaluated first-match.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route; earlier routes take precedence.
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Name of the route that would handle the request.
    pub fn matching(&self, request: &InterceptedRequest) -> Option<&str> {
        self.routes
            .iter()
            .find(|route| route.matches(request))
            .map(Route::name)
    }

    /// Route a request to the first matching handler.
    pub async fn dispatch(&self, request: &InterceptedRequest) -> FetchOutcome {
        match self.routes.iter().find(|route| route.matches(request)) {
            Some(route) => {
                tracing::trace!(route = route.name(), url = %request.url, "Routing request");
                route.handler.handle(request).await
            }
            None => FetchOutcome::Passthrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outrider_core::Url;

    struct Fixed(&'static str);

    #[async_trait]
    impl RouteHandler for Fixed {
        async fn handle(&self, _request: &InterceptedRequest) -> FetchOutcome {
            FetchOutcome::Respond(Response::ok(self.0))
        }
    }

    fn get(s: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(s).unwrap())
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let router = Router::new()
            .with_route(Route::new(
                "api",
                |req: &InterceptedRequest| req.url.path().starts_with("/api"),
                Arc::new(Fixed("first")),
            ))
            .with_route(Route::new("any", |_: &InterceptedRequest| true, Arc::new(Fixed("second"))));

        let outcome = router.dispatch(&get("https://shop.test/api/x")).await;
        assert_eq!(&outcome.into_response().unwrap().body[..], b"first");

        let outcome = router.dispatch(&get("https://shop.test/page")).await;
        assert_eq!(&outcome.into_response().unwrap().body[..], b"second");
    }

    #[tokio::test]
    async fn test_no_match_passes_through() {
        let router = Router::new().with_route(Route::new(
            "never",
            |_: &InterceptedRequest| false,
            Arc::new(Fixed("x")),
        ));

        let req = get("https://shop.test/");
        assert!(router.dispatch(&req).await.is_passthrough());
        assert_eq!(router.matching(&req), None);
    }
}
