use crate::context::ExecutionContext;
use crate::error::DispatchError;
use crate::interceptor::Invocation;
use crate::params::{ParamDescriptor, ParamsResolver};
use crate::responder::{HandlerResult, Responder};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use tracing::trace;

/// Arguments bound for one handler invocation, keyed by parameter name.
///
/// Every declared parameter is present; unresolved ones hold `Value::Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: HashMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Returns the bound value, `None` when absent or null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name).filter(|v| !v.is_null())
    }

    /// Deserializes a bound value, reporting a failure as a 400 for that parameter.
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T, DispatchError> {
        let value = self.values.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| DispatchError::param_validation(name, format!("invalid value for parameter '{name}': {e}")))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Args {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, args: Args) -> HandlerResult;
}

/// a holder which turns any async `Fn(Args)` into a [`RequestHandler`]
pub struct FnHandler<F, Fut> {
    f: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(Args) -> Fut,
{
    fn new(f: F) -> Self {
        Self { f, _phantom: PhantomData }
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    FnHandler::new(f)
}

impl<F, Fut> fmt::Debug for FnHandler<F, Fut> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    async fn invoke(&self, args: Args) -> HandlerResult {
        (self.f)(args).await.into_reply()
    }
}

/// The innermost step of the interceptor chain: bind the arguments, then call the handler.
pub struct HandlerInvocation<'a> {
    handler: &'a dyn RequestHandler,
    params: &'a [ParamDescriptor],
}

impl<'a> HandlerInvocation<'a> {
    pub fn new(handler: &'a dyn RequestHandler, params: &'a [ParamDescriptor]) -> Self {
        Self { handler, params }
    }
}

impl fmt::Debug for HandlerInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerInvocation").field("params", &self.params).finish_non_exhaustive()
    }
}

#[async_trait]
impl Invocation for HandlerInvocation<'_> {
    async fn invoke(&self) -> HandlerResult {
        let request = ExecutionContext::current().request()?;
        let args = ParamsResolver::resolve(&request, self.params).await?;
        trace!(args = args.len(), "invoking handler");
        self.handler.invoke(args).await
    }
}
