//! Sequential pre-processing of the raw request.
//!
//! Middleware run strictly before interceptors: global middleware first, then the
//! middleware of the matched route, each in registration order. A middleware either hands a
//! (possibly rewritten) request to the rest of the chain through [`MiddlewareNext::run`], or
//! short-circuits with [`Flow::Respond`], in which case neither interceptors nor the
//! handler are invoked.

use crate::error::DispatchError;
use crate::request::Request;
use crate::responder::Reply;
use async_trait::async_trait;
use std::sync::Arc;

/// The outcome of the middleware chain.
#[derive(Debug)]
pub enum Flow {
    /// Proceed to the interceptors and the handler with this request.
    Continue(Request),
    /// Answer with this reply instead of invoking the handler.
    Respond(Reply),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: Request, next: MiddlewareNext<'_>) -> Result<Flow, DispatchError>;
}

/// A cursor into the remaining middleware chain.
///
/// `run` consumes the cursor, so the rest of the chain runs at most once per middleware.
#[derive(Clone, Copy)]
pub struct MiddlewareNext<'a> {
    global: &'a [Arc<dyn Middleware>],
    route: &'a [Arc<dyn Middleware>],
}

impl<'a> MiddlewareNext<'a> {
    fn new(global: &'a [Arc<dyn Middleware>], route: &'a [Arc<dyn Middleware>]) -> Self {
        Self { global, route }
    }

    /// Invokes the next middleware, or returns [`Flow::Continue`] when the chain is exhausted.
    pub async fn run(self, request: Request) -> Result<Flow, DispatchError> {
        if let Some((first, rest)) = self.global.split_first() {
            return first.handle(request, MiddlewareNext::new(rest, self.route)).await;
        }

        match self.route.split_first() {
            Some((first, rest)) => first.handle(request, MiddlewareNext::new(&[], rest)).await,
            None => Ok(Flow::Continue(request)),
        }
    }

    pub fn remaining(&self) -> usize {
        self.global.len() + self.route.len()
    }
}

impl std::fmt::Debug for MiddlewareNext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareNext").field("remaining", &self.remaining()).finish()
    }
}

/// The global middleware list, merged with route middleware at execution time.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    global: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn builder() -> MiddlewarePipelineBuilder {
        MiddlewarePipelineBuilder { inner: vec![] }
    }

    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    pub async fn execute(&self, route: &[Arc<dyn Middleware>], request: Request) -> Result<Flow, DispatchError> {
        MiddlewareNext::new(&self.global, route).run(request).await
    }
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePipeline").field("len", &self.global.len()).finish()
    }
}

pub struct MiddlewarePipelineBuilder {
    inner: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipelineBuilder {
    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.inner.push(Arc::new(middleware));
        self
    }

    pub fn add_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.inner.push(middleware);
        self
    }

    pub fn build(self) -> MiddlewarePipeline {
        MiddlewarePipeline { global: self.inner }
    }
}

impl std::fmt::Debug for MiddlewarePipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePipelineBuilder").field("len", &self.inner.len()).finish()
    }
}
