//! An async HTTP request dispatch engine.
//!
//! A [`Dispatcher`] takes an already parsed [`Request`], resolves it against a versioned
//! [`Router`], runs the middleware and interceptor pipelines inside a per-request
//! [`ExecutionContext`], binds the handler arguments and serializes the result, honoring
//! `If-None-Match` and `If-Match`.

mod body;
mod context;
mod date;
mod dispatcher;
mod error;
mod handler;
mod request;
mod response;

pub mod config;
pub mod etag;
pub mod interceptor;
pub mod middleware;
pub mod params;
pub mod path;
pub mod responder;
pub mod router;
pub mod version;

pub use body::ResponseBody;
pub use config::DispatchConfig;
pub use context::{ContextState, ExecutionContext};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{BoxError, DispatchError, DispatcherBuildError, RouterBuildError};
pub use handler::{Args, FnHandler, HandlerInvocation, RequestHandler, handler_fn};
pub use request::{PathParams, Request};
pub use responder::sse::{SseEmitter, SseStream, build_sse_stream_emitter};
pub use responder::{Event, HandlerResult, Json, Reply, Responder};
pub use response::{Content, ResponseModel};
pub use router::{Router, RouterBuilder};
pub use version::{Version, VersioningStrategy};
