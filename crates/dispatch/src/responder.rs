//! Converts handler results into replies.
//!
//! This module provides the [`Responder`] trait which defines how different types can be
//! turned into a [`Reply`]: either buffered [`Content`] or a lazy stream of server-sent
//! events. It includes implementations for common types like Result, Option, String and
//! `serde_json::Value`.

pub mod sse;

use crate::context::ExecutionContext;
use crate::error::DispatchError;
use crate::response::Content;
use bytes::Bytes;
use futures::stream::BoxStream;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub use sse::Event;

pub type HandlerResult = Result<Reply, DispatchError>;

/// What a handler produced.
pub enum Reply {
    Content(Content),
    /// A lazy, possibly unbounded sequence of events, drained frame by frame.
    Events(BoxStream<'static, Event>),
}

impl Reply {
    pub fn empty() -> Self {
        Reply::Content(Content::Empty)
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Reply::Content(content) => Some(content),
            Reply::Events(_) => None,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Content(content) => f.debug_tuple("Reply::Content").field(content).finish(),
            Reply::Events(_) => f.write_str("Reply::Events"),
        }
    }
}

/// A trait for types that can be returned from request handlers.
pub trait Responder {
    fn into_reply(self) -> HandlerResult;
}

impl Responder for Reply {
    fn into_reply(self) -> HandlerResult {
        Ok(self)
    }
}

impl Responder for Content {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Content(self))
    }
}

impl Responder for Value {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Content(Content::Json(self)))
    }
}

impl Responder for String {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Content(Content::Text(self)))
    }
}

impl Responder for &'static str {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Content(Content::Text(self.to_string())))
    }
}

impl Responder for Bytes {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Content(Content::Bytes(self)))
    }
}

/// Unit type returns an empty reply.
impl Responder for () {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::empty())
    }
}

/// None case returns an empty reply.
impl<T: Responder> Responder for Option<T> {
    fn into_reply(self) -> HandlerResult {
        match self {
            Some(t) => t.into_reply(),
            None => Ok(Reply::empty()),
        }
    }
}

/// The error side propagates up the interceptor chain.
impl<T: Responder, E: Into<DispatchError>> Responder for Result<T, E> {
    fn into_reply(self) -> HandlerResult {
        match self {
            Ok(t) => t.into_reply(),
            Err(e) => Err(e.into()),
        }
    }
}

/// Sets the status of the current response along with the content.
impl<T: Responder> Responder for (StatusCode, T) {
    fn into_reply(self) -> HandlerResult {
        let (status, responder) = self;
        let reply = responder.into_reply()?;
        ExecutionContext::current().with_response(|response| response.set_status(status))?;
        Ok(reply)
    }
}

/// Any serializable value, rendered as JSON.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> Responder for Json<T> {
    fn into_reply(self) -> HandlerResult {
        serde_json::to_value(self.0).map(|v| Reply::Content(Content::Json(v))).map_err(DispatchError::handler)
    }
}
