use crate::context::ExecutionContext;
use crate::interceptor::{Interceptor, Next};
use crate::responder::HandlerResult;
use async_trait::async_trait;
use http::{HeaderName, HeaderValue, StatusCode};
use std::time::Instant;
use tracing::{info, warn};

/// Logs method, path, status and latency of every handled request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> HandlerResult {
        let start = Instant::now();
        let target = ctx.with_request(|req| format!("{} {}", req.method(), req.path())).unwrap_or_default();

        let result = next.run().await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                let status = ctx.get_response().map(|r| r.status()).unwrap_or_default();
                info!(request = %target, status = status.as_u16(), elapsed_ms = elapsed.as_millis() as u64, "handled request");
            }
            Err(e) => {
                warn!(request = %target, status = e.status().as_u16(), elapsed_ms = elapsed.as_millis() as u64, cause = %e, "request failed");
            }
        }
        result
    }
}

/// Sets the response status once the handler succeeded.
#[derive(Debug, Clone, Copy)]
pub struct StatusInterceptor(pub StatusCode);

#[async_trait]
impl Interceptor for StatusInterceptor {
    async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> HandlerResult {
        let reply = next.run().await?;
        ctx.with_response(|response| response.set_status(self.0))?;
        Ok(reply)
    }
}

/// Adds a fixed response header once the handler succeeded.
#[derive(Debug, Clone)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

#[async_trait]
impl Interceptor for HeaderInterceptor {
    async fn intercept(&self, ctx: &ExecutionContext, next: Next<'_>) -> HandlerResult {
        let reply = next.run().await?;
        ctx.with_response(|response| response.set_header(self.name.clone(), self.value.clone()))?;
        Ok(reply)
    }
}
