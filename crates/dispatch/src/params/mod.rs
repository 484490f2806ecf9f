//! Handler argument binding.
//!
//! Each route declares an ordered list of [`ParamDescriptor`]s. Right before the handler is
//! called, [`ParamsResolver`] reads every descriptor against the current request, runs its
//! pipes and collects the results into [`Args`].

mod pipe;

pub use pipe::{
    ArgumentMetadata, DefaultValuePipe, JsonToValuePipe, ParseArrayPipe, ParseBoolPipe, ParseDatePipe,
    ParseFloatPipe, ParseIntPipe, ParseUuidPipe, Pipe, SchemaPipe, ValidateNonEmptyPipe, ValidationPipe,
};

#[cfg(test)]
pub use pipe::MockPipe;

use crate::error::DispatchError;
use crate::handler::Args;
use crate::request::Request;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Where a parameter's raw value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    Path,
    Query,
    Body,
    Header,
    /// Looked up by name in path params, then query, then body.
    None,
}

#[derive(Clone)]
pub struct ParamDescriptor {
    name: String,
    source: ParamSource,
    key: Option<String>,
    pipes: Vec<Arc<dyn Pipe>>,
    default: Option<Value>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, source: ParamSource) -> Self {
        Self { name: name.into(), source, key: None, pipes: Vec::new(), default: None }
    }

    /// A parameter without source marker, resolved by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::None)
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Path)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Query)
    }

    /// Binds the whole body unless a key is given.
    pub fn body(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Body)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Header)
    }

    /// Reads the value under `key` instead of the parameter name.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn pipe<P: Pipe + 'static>(mut self, pipe: P) -> Self {
        self.pipes.push(Arc::new(pipe));
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> ParamSource {
        self.source
    }

    fn lookup_key(&self) -> Option<&str> {
        match (self.source, self.key.as_deref()) {
            (_, Some(key)) => Some(key),
            (ParamSource::Body, None) => None,
            (_, None) => Some(&self.name),
        }
    }

    fn metadata(&self) -> ArgumentMetadata {
        ArgumentMetadata { name: self.name.clone(), source: self.source, key: self.lookup_key().map(str::to_string) }
    }

    fn raw_value(&self, request: &Request) -> Option<Value> {
        let key = self.lookup_key();
        match self.source {
            ParamSource::Path => key.and_then(|k| request.path_params().get(k)).map(|v| Value::String(v.to_string())),
            ParamSource::Query => key.and_then(|k| request.query().get(k)).map(|v| Value::String(v.clone())),
            ParamSource::Header => key.and_then(|k| request.header(k)).map(|v| Value::String(v.to_string())),
            ParamSource::Body => match key {
                Some(k) => request.body().get(k).cloned(),
                None => Some(request.body().clone()).filter(|body| !body.is_null()),
            },
            ParamSource::None => {
                let key = key.unwrap_or(&self.name);
                request
                    .path_params()
                    .get(key)
                    .map(|v| Value::String(v.to_string()))
                    .or_else(|| request.query().get(key).map(|v| Value::String(v.clone())))
                    .or_else(|| request.body().as_object().and_then(|body| body.get(key)).cloned())
            }
        }
    }
}

impl fmt::Debug for ParamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("key", &self.key)
            .field("pipes", &self.pipes.len())
            .field("default", &self.default)
            .finish()
    }
}

/// Binds handler arguments from the request.
#[derive(Debug, Clone, Copy)]
pub struct ParamsResolver;

impl ParamsResolver {
    /// Resolves every descriptor in order. Pipes of one parameter run in declaration order and
    /// the first failure aborts the whole resolution.
    pub async fn resolve(request: &Request, params: &[ParamDescriptor]) -> Result<Args, DispatchError> {
        let mut args = Args::new();
        for param in params {
            let mut value = param.raw_value(request).or_else(|| param.default.clone()).unwrap_or(Value::Null);

            if !param.pipes.is_empty() {
                let metadata = param.metadata();
                for pipe in &param.pipes {
                    value = pipe.transform(value, &metadata).await?;
                }
            }

            args.insert(param.name.clone(), value);
        }
        Ok(args)
    }
}
