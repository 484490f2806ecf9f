//! Chain of responsibility around the handler invocation.
//!
//! Global interceptors are merged with the route's interceptors (global first) into one
//! ordered chain. Each interceptor may call [`Next::run`] and return its result, post-process
//! that result, or return without calling `next` at all.

mod builtin;

pub use builtin::{HeaderInterceptor, LoggingInterceptor, StatusInterceptor};

use crate::context::ExecutionContext;
use crate::responder::HandlerResult;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> HandlerResult;
}

/// The terminal step of the chain.
#[async_trait]
pub trait Invocation: Send + Sync {
    async fn invoke(&self) -> HandlerResult;
}

/// A cursor into the remaining interceptor chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    global: &'a [Arc<dyn Interceptor>],
    route: &'a [Arc<dyn Interceptor>],
    invocation: &'a dyn Invocation,
}

impl<'a> Next<'a> {
    fn new(global: &'a [Arc<dyn Interceptor>], route: &'a [Arc<dyn Interceptor>], invocation: &'a dyn Invocation) -> Self {
        Self { global, route, invocation }
    }

    /// Runs the rest of the chain, ending with the handler invocation.
    pub async fn run(self) -> HandlerResult {
        let ctx = ExecutionContext::current();
        if let Some((first, rest)) = self.global.split_first() {
            return first.intercept(&ctx, Next::new(rest, self.route, self.invocation)).await;
        }

        match self.route.split_first() {
            Some((first, rest)) => first.intercept(&ctx, Next::new(&[], rest, self.invocation)).await,
            None => self.invocation.invoke().await,
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("remaining", &(self.global.len() + self.route.len())).finish_non_exhaustive()
    }
}

/// The global interceptors of a dispatcher.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    inner: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorPipeline {
    pub fn builder() -> InterceptorPipelineBuilder {
        InterceptorPipelineBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub async fn execute(&self, route: &[Arc<dyn Interceptor>], invocation: &dyn Invocation) -> HandlerResult {
        Next::new(&self.inner, route, invocation).run().await
    }
}

impl std::fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorPipeline").field("len", &self.inner.len()).finish()
    }
}

pub struct InterceptorPipelineBuilder {
    inner: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorPipelineBuilder {
    fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn add_last<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.push(Arc::new(interceptor));
        self
    }

    pub fn add_first<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.insert(0, Arc::new(interceptor));
        self
    }

    pub fn add_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.inner.push(interceptor);
        self
    }

    pub fn build(self) -> InterceptorPipeline {
        InterceptorPipeline { inner: self.inner }
    }
}

impl std::fmt::Debug for InterceptorPipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorPipelineBuilder").field("len", &self.inner.len()).finish()
    }
}
