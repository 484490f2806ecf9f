//! Route table and resolution.
//!
//! Routes are collected by [`RouterBuilder`] and frozen into a [`Router`] at startup; the
//! table is read-only while serving. For each method and version, a [`RouteBucket`] keeps
//! SSE routes and static routes keyed by their normalized path, plus dynamic routes ordered
//! by descending specificity (first registered wins on a tie).
//!
//! Resolution tries the request version first and the neutral version second. Within one
//! version, the SSE map is checked first, then the static map, then the dynamic list.

use crate::config::DispatchConfig;
use crate::error::{DispatchError, RouterBuildError};
use crate::handler::RequestHandler;
use crate::interceptor::{HeaderInterceptor, Interceptor, StatusInterceptor};
use crate::middleware::Middleware;
use crate::params::ParamDescriptor;
use crate::path::{PathPattern, is_dynamic, normalize_path};
use crate::request::{PathParams, Request};
use crate::version::{ResolvedVersion, Version, VersionResolver, VersioningStrategy};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Static,
    Dynamic,
    Sse,
}

/// A registered route. Immutable once the router is built.
pub struct RouteEntry {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn RequestHandler>,
    kind: RouteKind,
    versions: Vec<Version>,
    params: Vec<ParamDescriptor>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    seq: usize,
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn path(&self) -> &str {
        self.pattern.raw()
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn is_sse(&self) -> bool {
        self.kind == RouteKind::Sse
    }

    pub fn specificity(&self) -> usize {
        self.pattern.specificity()
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.pattern.raw())
            .field("kind", &self.kind)
            .field("versions", &self.versions)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Routes of one method and one version.
#[derive(Debug, Default)]
pub struct RouteBucket {
    sse: HashMap<String, Arc<RouteEntry>>,
    statics: HashMap<String, Arc<RouteEntry>>,
    dynamic: Vec<Arc<RouteEntry>>,
}

impl RouteBucket {
    fn insert(&mut self, entry: Arc<RouteEntry>) {
        let (kind, dynamic) = (entry.kind, is_dynamic(entry.path()));
        let map = match kind {
            RouteKind::Static => &mut self.statics,
            RouteKind::Sse if !dynamic => &mut self.sse,
            RouteKind::Sse | RouteKind::Dynamic => {
                self.dynamic.push(entry);
                self.dynamic.sort_by_key(|e| (Reverse(e.specificity()), e.seq));
                return;
            }
        };

        if let Some(previous) = map.insert(entry.path().to_string(), Arc::clone(&entry)) {
            warn!(
                method = %entry.method,
                path = entry.path(),
                previous = previous.seq,
                "duplicated route, the later registration replaces the earlier one"
            );
        }
    }

    fn find(&self, path: &str) -> Option<(&RouteEntry, PathParams)> {
        if let Some(entry) = self.sse.get(path).or_else(|| self.statics.get(path)) {
            return Some((entry.as_ref(), PathParams::empty()));
        }

        self.dynamic.iter().find_map(|entry| entry.pattern.matches(path).map(|params| (entry.as_ref(), params)))
    }
}

/// Result of a successful resolution.
#[derive(Debug)]
pub struct RouteMatch<'router> {
    entry: &'router RouteEntry,
    params: PathParams,
    version: Option<String>,
    path: String,
}

impl<'router> RouteMatch<'router> {
    pub fn entry(&self) -> &'router RouteEntry {
        self.entry
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_params(self) -> PathParams {
        self.params
    }

    /// The version extracted from the request, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The normalized path the route was matched against, with any URI version removed.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Main router structure that resolves requests to route entries.
pub struct Router {
    table: HashMap<Method, HashMap<Version, RouteBucket>>,
    entries: Vec<Arc<RouteEntry>>,
    version_resolver: VersionResolver,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn version_resolver(&self) -> &VersionResolver {
        &self.version_resolver
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter().map(Arc::as_ref)
    }

    /// Resolves a method and a raw path.
    ///
    /// An explicit `version` bypasses the configured strategy. Otherwise the strategy is
    /// applied to the path alone, so only URI versioning can yield a version here; use
    /// [`Router::resolve_request`] for header based strategies.
    pub fn resolve(&self, method: &Method, path: &str, version: Option<&str>) -> Result<RouteMatch<'_>, DispatchError> {
        let resolved = match version {
            Some(v) => ResolvedVersion { version: Some(v.to_string()), path: normalize_path(path) },
            None => self.version_resolver.resolve(path, |_| None),
        };
        self.lookup(method, resolved)
    }

    pub fn resolve_request(&self, request: &Request) -> Result<RouteMatch<'_>, DispatchError> {
        let resolved = self.version_resolver.resolve_request(request);
        self.lookup(request.method(), resolved)
    }

    /// Looks up an already resolved version and normalized path.
    pub fn lookup(&self, method: &Method, resolved: ResolvedVersion) -> Result<RouteMatch<'_>, DispatchError> {
        let ResolvedVersion { version, path } = resolved;

        let found = self.table.get(method).and_then(|versions| {
            candidate_versions(version.as_deref())
                .iter()
                .filter_map(|candidate| versions.get(candidate))
                .find_map(|bucket| bucket.find(&path))
        });

        match found {
            Some((entry, params)) => Ok(RouteMatch { entry, params, version, path }),
            None => {
                debug!(%method, path = %path, version = ?version, "no route matched");
                Err(DispatchError::route_not_found(method, path))
            }
        }
    }
}

fn candidate_versions(version: Option<&str>) -> Vec<Version> {
    match version {
        Some(v) => vec![Version::token(v), Version::Neutral],
        None => vec![Version::Neutral],
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.entries)
            .field("version_resolver", &self.version_resolver)
            .finish()
    }
}

pub struct RouterBuilder {
    items: Vec<(String, RouterItemBuilder)>,
    global_prefix: Option<String>,
    versioning: Option<VersioningStrategy>,
    default_versions: Vec<Version>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { items: vec![], global_prefix: None, versioning: None, default_versions: vec![] }
    }

    pub fn route(mut self, route: impl Into<String>, item_builder: RouterItemBuilder) -> Self {
        self.items.push((route.into(), item_builder));
        self
    }

    /// Prefixes every registered route, e.g. `/api`.
    pub fn global_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.global_prefix = Some(prefix.into());
        self
    }

    pub fn versioning(mut self, strategy: VersioningStrategy) -> Self {
        self.versioning = Some(strategy);
        self
    }

    /// The version given to routes registered without one. May be called repeatedly.
    pub fn default_version(mut self, version: impl Into<Version>) -> Self {
        self.default_versions.push(version.into());
        self
    }

    /// Applies prefix, versioning and default versions from a loaded configuration.
    pub fn with_config(mut self, config: &DispatchConfig) -> Self {
        if let Some(prefix) = &config.global_prefix {
            self.global_prefix = Some(prefix.clone());
        }
        if let Some(strategy) = &config.versioning {
            self.versioning = Some(strategy.clone());
        }
        self.default_versions.extend(config.default_version.iter().map(|v| Version::token(v.as_str())));
        self
    }

    /// Builds the router from the accumulated routes.
    pub fn build(self) -> Result<Router, RouterBuildError> {
        let prefix = self.global_prefix.as_deref().map(normalize_path).filter(|p| p != "/").unwrap_or_default();

        let mut table: HashMap<Method, HashMap<Version, RouteBucket>> = HashMap::new();
        let mut entries = Vec::with_capacity(self.items.len());

        for (seq, (path, item)) in self.items.into_iter().enumerate() {
            let pattern = PathPattern::compile(&format!("{prefix}/{path}"))?;
            let kind = match (item.sse, is_dynamic(pattern.raw())) {
                (true, _) => RouteKind::Sse,
                (false, true) => RouteKind::Dynamic,
                (false, false) => RouteKind::Static,
            };

            let versions = if !item.versions.is_empty() {
                item.versions
            } else if !self.default_versions.is_empty() {
                self.default_versions.clone()
            } else {
                vec![Version::Neutral]
            };

            let entry = Arc::new(RouteEntry {
                method: item.method,
                pattern,
                handler: item.handler,
                kind,
                versions,
                params: item.params,
                interceptors: item.interceptors,
                middlewares: item.middlewares,
                seq,
            });

            let by_version = table.entry(entry.method.clone()).or_default();
            for version in &entry.versions {
                by_version.entry(version.clone()).or_default().insert(Arc::clone(&entry));
            }

            info!("Mapped {{{} {}}} route", entry.method, entry.path());
            entries.push(entry);
        }

        Ok(Router { table, entries, version_resolver: VersionResolver::new(self.versioning, self.global_prefix) })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("routes", &self.items.len())
            .field("global_prefix", &self.global_prefix)
            .field("versioning", &self.versioning)
            .field("default_versions", &self.default_versions)
            .finish()
    }
}

macro_rules! method_router {
    ($method:ident, $method_const:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouterItemBuilder {
            RouterItemBuilder::new(Method::$method_const, handler)
        }
    };
}

method_router!(get, GET);
method_router!(post, POST);
method_router!(put, PUT);
method_router!(patch, PATCH);
method_router!(delete, DELETE);
method_router!(head, HEAD);
method_router!(options, OPTIONS);

/// Registers a handler for an arbitrary method.
pub fn on<H: RequestHandler + 'static>(method: Method, handler: H) -> RouterItemBuilder {
    RouterItemBuilder::new(method, handler)
}

pub struct RouterItemBuilder {
    method: Method,
    handler: Arc<dyn RequestHandler>,
    sse: bool,
    versions: Vec<Version>,
    params: Vec<ParamDescriptor>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl RouterItemBuilder {
    fn new<H: RequestHandler + 'static>(method: Method, handler: H) -> Self {
        Self {
            method,
            handler: Arc::new(handler),
            sse: false,
            versions: vec![],
            params: vec![],
            interceptors: vec![],
            middlewares: vec![],
        }
    }

    pub fn version(mut self, version: impl Into<Version>) -> Self {
        self.versions.push(version.into());
        self
    }

    pub fn versions<I, V>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Version>,
    {
        self.versions.extend(versions.into_iter().map(Into::into));
        self
    }

    /// Also serve requests of any version that has no route of its own.
    pub fn neutral(mut self) -> Self {
        self.versions.push(Version::Neutral);
        self
    }

    /// Marks the route as a server-sent events route.
    pub fn sse(mut self) -> Self {
        self.sse = true;
        self
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Status code of a successful response.
    pub fn http_code(self, status: StatusCode) -> Self {
        self.interceptor(StatusInterceptor(status))
    }

    /// A header added to every successful response.
    pub fn header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.interceptor(HeaderInterceptor::new(name, value))
    }
}

impl fmt::Debug for RouterItemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItemBuilder")
            .field("method", &self.method)
            .field("sse", &self.sse)
            .field("versions", &self.versions)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Args, handler_fn};
    use http::header::ACCEPT;

    fn ok() -> impl RequestHandler + 'static {
        handler_fn(|_args: Args| async { "ok" })
    }

    fn router() -> Router {
        Router::builder()
            .route("/", get(ok()))
            .route("/users", get(ok()))
            .route("/users", post(ok()))
            .route("/users/:id", get(ok()))
            .route("/users/me", get(ok()))
            .route("/users/:id/posts/:post_id", get(ok()))
            .build()
            .unwrap()
    }

    #[test]
    fn static_route_has_no_params() {
        let router = router();
        let matched = router.resolve(&Method::GET, "/users/", None).unwrap();
        assert_eq!(matched.entry().path(), "/users");
        assert_eq!(matched.entry().kind(), RouteKind::Static);
        assert!(matched.params().is_empty());

        let matched = router.resolve(&Method::POST, "/users", None).unwrap();
        assert_eq!(matched.entry().method(), Method::POST);
    }

    #[test]
    fn dynamic_route_captures_params() {
        let router = router();
        let matched = router.resolve(&Method::GET, "/users/42", None).unwrap();
        assert_eq!(matched.entry().path(), "/users/:id");
        assert_eq!(matched.params().get("id"), Some("42"));

        let matched = router.resolve(&Method::GET, "//users/42/posts/7/", None).unwrap();
        assert_eq!(matched.params().get("id"), Some("42"));
        assert_eq!(matched.params().get("post_id"), Some("7"));
    }

    #[test]
    fn static_beats_dynamic() {
        let router = router();
        let matched = router.resolve(&Method::GET, "/users/me", None).unwrap();
        assert_eq!(matched.entry().path(), "/users/me");
        assert!(matched.params().is_empty());
    }

    #[test]
    fn higher_specificity_wins_then_first_registered() {
        let router = Router::builder()
            .route("/files/:name", get(ok()))
            .route("/:area/:name", get(ok()))
            .route("/:kind/latest", get(ok()))
            .route("/:other/latest", get(ok()))
            .build()
            .unwrap();

        let matched = router.resolve(&Method::GET, "/files/readme", None).unwrap();
        assert_eq!(matched.entry().path(), "/files/:name");

        let matched = router.resolve(&Method::GET, "/docs/latest", None).unwrap();
        assert_eq!(matched.entry().path(), "/:kind/latest");
        assert_eq!(matched.params().get("kind"), Some("docs"));

        let matched = router.resolve(&Method::GET, "/docs/intro", None).unwrap();
        assert_eq!(matched.entry().path(), "/:area/:name");
    }

    #[test]
    fn not_found() {
        let router = router();
        let error = router.resolve(&Method::DELETE, "/users", None).unwrap_err();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_string(), "Cannot DELETE /users");

        assert!(router.resolve(&Method::GET, "/users/42/extra", None).is_err());
    }

    #[test]
    fn neutral_fallback_and_version_priority() {
        let router = Router::builder()
            .versioning(VersioningStrategy::header("x-api-version"))
            .route("/cats", get(ok()))
            .route("/cats/:id", get(ok()).version("2"))
            .route("/dogs", get(ok()).version("1"))
            .build()
            .unwrap();

        let matched = router.resolve(&Method::GET, "/cats", Some("9")).unwrap();
        assert_eq!(matched.entry().versions(), [Version::Neutral]);
        assert_eq!(matched.version(), Some("9"));

        let matched = router.resolve(&Method::GET, "/cats/1", Some("2")).unwrap();
        assert_eq!(matched.entry().versions(), [Version::token("2")]);

        assert!(router.resolve(&Method::GET, "/cats/1", Some("1")).is_err());
        assert!(router.resolve(&Method::GET, "/dogs", None).is_err());
        assert!(router.resolve(&Method::GET, "/dogs", Some("1")).is_ok());
    }

    #[test]
    fn version_specific_dynamic_beats_neutral_static() {
        let router = Router::builder()
            .route("/items/special", get(ok()))
            .route("/items/:id", get(ok()).version("2"))
            .build()
            .unwrap();

        let matched = router.resolve(&Method::GET, "/items/special", Some("2")).unwrap();
        assert_eq!(matched.entry().path(), "/items/:id");
    }

    #[test]
    fn uri_versioning_with_global_prefix() {
        let router = Router::builder()
            .global_prefix("/api")
            .versioning(VersioningStrategy::uri())
            .route("/users/:id", get(ok()).version("1"))
            .build()
            .unwrap();

        let matched = router.resolve(&Method::GET, "/api/v1/users/3", None).unwrap();
        assert_eq!(matched.entry().path(), "/api/users/:id");
        assert_eq!(matched.version(), Some("1"));
        assert_eq!(matched.path(), "/api/users/3");

        assert!(router.resolve(&Method::GET, "/api/v2/users/3", None).is_err());
    }

    #[test]
    fn media_type_versioning_from_request() {
        let router = Router::builder()
            .versioning(VersioningStrategy::media_type("v="))
            .default_version("1")
            .route("/orders", get(ok()))
            .build()
            .unwrap();

        let request =
            Request::new(Method::GET, "/orders").with_header(ACCEPT, HeaderValue::from_static("application/json;v=1"));
        assert!(router.resolve_request(&request).is_ok());

        let request = Request::new(Method::GET, "/orders");
        assert!(router.resolve_request(&request).is_err());
    }

    #[test]
    fn sse_routes_win_over_static() {
        let router = Router::builder().route("/events", get(ok())).route("/events", get(ok()).sse()).build().unwrap();

        let matched = router.resolve(&Method::GET, "/events", None).unwrap();
        assert!(matched.entry().is_sse());
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn duplicated_static_route_replaces_earlier() {
        let router = Router::builder().route("/a", get(ok())).route("/a/", get(ok()).http_code(StatusCode::CREATED)).build().unwrap();

        let matched = router.resolve(&Method::GET, "/a", None).unwrap();
        assert_eq!(matched.entry().interceptors().len(), 1);
    }

    #[test]
    fn invalid_pattern_fails_build() {
        let result = Router::builder().route("/a/:id/b/:id", get(ok())).build();
        assert!(matches!(result, Err(RouterBuildError::InvalidPattern { .. })));
    }
}
