//! The per-request dispatch loop.
//!
//! For every request the [`Dispatcher`]:
//! 1. resolves the route (version strategy + router) and records the path parameters,
//! 2. opens a fresh [`ExecutionContext`] holding the request and an initial response,
//! 3. runs the middleware chain, which may short-circuit,
//! 4. validates `If-Match` against the current representation for unsafe methods,
//! 5. runs the interceptor chain around parameter binding and the handler call,
//! 6. applies the entity tag logic and serializes the response.
//!
//! Any error, including a panic, is turned into a `{message, statusCode, error}` body at
//! this boundary, and the context is released on every path.

use crate::body::ResponseBody;
use crate::config::DispatchConfig;
use crate::context::{ContextState, ExecutionContext};
use crate::date::DateService;
use crate::error::{DispatchError, DispatcherBuildError};
use crate::etag::{ConditionalResponseCache, Conditions, EtagConfig};
use crate::handler::HandlerInvocation;
use crate::interceptor::{Interceptor, InterceptorPipeline, InterceptorPipelineBuilder};
use crate::middleware::{Flow, Middleware, MiddlewarePipeline, MiddlewarePipelineBuilder};
use crate::request::Request;
use crate::responder::Reply;
use crate::responder::sse::sse_response;
use crate::response::{Content, ResponseModel};
use crate::router::Router;
use crate::version::ResolvedVersion;
use futures::FutureExt;
use http::header::DATE;
use http::{HeaderName, HeaderValue, Method, Response};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

pub struct DispatcherBuilder {
    router: Option<Router>,
    middlewares: MiddlewarePipelineBuilder,
    interceptors: InterceptorPipelineBuilder,
    etag: EtagConfig,
    powered_by: Option<String>,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self {
            router: None,
            middlewares: MiddlewarePipeline::builder(),
            interceptors: InterceptorPipeline::builder(),
            etag: EtagConfig::default(),
            powered_by: None,
        }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Adds a global middleware, run before any route middleware.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares = self.middlewares.add(middleware);
        self
    }

    /// Adds a global interceptor, run outside of any route interceptor.
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors = self.interceptors.add_last(interceptor);
        self
    }

    pub fn etag(mut self, etag: EtagConfig) -> Self {
        self.etag = etag;
        self
    }

    pub fn powered_by(mut self, powered_by: impl Into<String>) -> Self {
        self.powered_by = Some(powered_by.into());
        self
    }

    /// Applies the etag and `X-Powered-By` settings. Routing settings belong to
    /// [`RouterBuilder::with_config`](crate::RouterBuilder::with_config).
    pub fn config(mut self, config: &DispatchConfig) -> Self {
        self.etag = config.etag.clone();
        if let Some(powered_by) = &config.powered_by {
            self.powered_by = Some(powered_by.clone());
        }
        self
    }

    pub fn build(self) -> Result<Dispatcher, DispatcherBuildError> {
        let router = self.router.ok_or(DispatcherBuildError::MissingRouter)?;
        let powered_by = self.powered_by.map(|v| HeaderValue::from_str(&v)).transpose()?;

        Ok(Dispatcher {
            router,
            middlewares: self.middlewares.build(),
            interceptors: self.interceptors.build(),
            etag: ConditionalResponseCache::new(self.etag),
            powered_by,
        })
    }
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("router", &self.router)
            .field("middlewares", &self.middlewares)
            .field("interceptors", &self.interceptors)
            .field("etag", &self.etag)
            .field("powered_by", &self.powered_by)
            .finish()
    }
}

pub struct Dispatcher {
    router: Router,
    middlewares: MiddlewarePipeline,
    interceptors: InterceptorPipeline,
    etag: ConditionalResponseCache,
    powered_by: Option<HeaderValue>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Adapter for requests whose body has already been decoded.
    pub async fn dispatch_http(&self, request: http::Request<Value>) -> Response<ResponseBody> {
        let (parts, body) = request.into_parts();
        self.dispatch(Request::from_parts(parts, body)).await
    }

    /// Dispatches one request. Never fails: errors become error responses.
    pub async fn dispatch(&self, request: Request) -> Response<ResponseBody> {
        let method = request.method().clone();
        let path = request.path().to_string();

        let result = ExecutionContext::scope(AssertUnwindSafe(self.handle(request)).catch_unwind()).await;

        match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => self.error_response(&method, &path, e),
            Err(panic) => {
                let e = DispatchError::handler(panic_message(panic.as_ref()));
                self.error_response(&method, &path, e)
            }
        }
    }

    async fn handle(&self, request: Request) -> Result<Response<ResponseBody>, DispatchError> {
        let ctx = ExecutionContext::current();

        let matched = self.router.resolve_request(&request)?;
        let entry = matched.entry();
        let resolved = ResolvedVersion { version: matched.version().map(str::to_string), path: matched.path().to_string() };

        let mut request = request;
        request.set_path_params(matched.into_params());
        ctx.set(ContextState::new(request.clone(), self.initial_response()))?;

        let (reply, conditions) = match self.middlewares.execute(entry.middlewares(), request).await? {
            // a middleware reply is not the representation `If-Match` refers to
            Flow::Respond(reply) => (reply, Conditions::from_request(&*ctx.request()?).without_if_match()),
            Flow::Continue(request) => {
                let conditions = Conditions::from_request(&request);
                ctx.set_request(request)?;
                let conditions = self.check_preconditions(conditions, resolved).await?;

                let invocation = HandlerInvocation::new(entry.handler(), entry.params());
                (self.interceptors.execute(entry.interceptors(), &invocation).await?, conditions)
            }
        };

        self.finish(reply, &conditions)
    }

    /// Validates `If-Match` against the representation the GET route of the same path
    /// serves, before the unsafe handler runs. Once validated, the header is dropped from
    /// the conditions checked against the final content.
    ///
    /// The representation is built the way a GET request builds it: with a GET request in
    /// the context and through the interceptor chain. When it cannot be built, `If-Match`
    /// is left to be checked against the unsafe handler's result.
    async fn check_preconditions(&self, conditions: Conditions, resolved: ResolvedVersion) -> Result<Conditions, DispatchError> {
        let Some(if_match) = conditions.if_match().filter(|_| conditions.is_unsafe() && self.etag.is_enabled()).map(str::to_string) else {
            return Ok(conditions);
        };
        let Ok(get_route) = self.router.lookup(&Method::GET, resolved) else {
            return Ok(conditions);
        };

        let ctx = ExecutionContext::current();
        let saved = ctx.get().ok_or(DispatchError::ContextUnavailable)?;

        let mut get_request = Request::clone(saved.request());
        get_request.set_method(Method::GET);
        get_request.set_path_params(get_route.params().clone());
        ctx.set_request(get_request)?;

        let entry = get_route.entry();
        let invocation = HandlerInvocation::new(entry.handler(), entry.params());
        let current = self.interceptors.execute(entry.interceptors(), &invocation).await;
        ctx.set(saved)?;

        match current {
            Ok(Reply::Content(content)) if self.etag.check_if_match(&if_match, &content) => Ok(conditions.without_if_match()),
            Ok(Reply::Content(_)) => Err(DispatchError::PreconditionFailed),
            Ok(Reply::Events(_)) => Ok(conditions),
            Err(e) => {
                debug!(cause = %e, "no current representation, If-Match is checked against the result");
                Ok(conditions)
            }
        }
    }

    fn finish(&self, reply: Reply, conditions: &Conditions) -> Result<Response<ResponseBody>, DispatchError> {
        let mut response = ExecutionContext::current().take_response()?;

        match reply {
            Reply::Events(events) => Ok(sse_response(response, events)),
            Reply::Content(content) => {
                response.update_content(content);
                self.etag.apply(conditions, &mut response)?;
                Ok(response.into_response())
            }
        }
    }

    fn initial_response(&self) -> ResponseModel {
        let mut response = ResponseModel::new();
        if let Some(date) = DateService::get_global_instance().http_date() {
            response.set_header(DATE, date);
        }
        if let Some(powered_by) = &self.powered_by {
            response.set_header(X_POWERED_BY, powered_by.clone());
        }
        response
    }

    fn error_response(&self, method: &Method, path: &str, e: DispatchError) -> Response<ResponseBody> {
        if e.is_internal() {
            error!(%method, path, cause = %e, "request failed with an internal error");
        } else {
            debug!(%method, path, status = e.status().as_u16(), cause = %e, "request failed");
        }

        let mut response = self.initial_response();
        response.set_status(e.status());
        response.update_content(Content::Json(e.to_body()));
        response.into_response()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("middlewares", &self.middlewares)
            .field("interceptors", &self.interceptors)
            .field("etag", &self.etag)
            .finish()
    }
}
