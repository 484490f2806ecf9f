//! HTTP date header value management service.
//!
//! This module provides a service for efficiently managing HTTP date header values in a
//! concurrent environment. The formatted date is cached and refreshed periodically by a
//! background task, so responses do not format the date on every request.

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A service that maintains and periodically updates the current HTTP date string.
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: Option<JoinHandle<()>>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::new_with_update_interval(Duration::from_millis(800)));

fn format_now() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}

impl DateService {
    /// Returns a reference to the global singleton instance of `DateService`.
    pub fn get_global_instance() -> &'static DateService {
        &DATE_SERVICE
    }

    /// Creates a new `DateService` instance.
    ///
    /// The refresh task is only started when a tokio runtime is available; without one the
    /// date is formatted on every access instead.
    fn new_with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(format_now()));

        let handle = tokio::runtime::Handle::try_current().ok().map(|runtime| {
            let current_arc = Arc::clone(&current);
            runtime.spawn(async move {
                loop {
                    tokio::time::sleep(update_interval).await;
                    current_arc.store(Arc::new(format_now()));
                }
            })
        });

        DateService { current, handle }
    }

    /// Returns the current date as a header value.
    pub fn http_date(&self) -> Option<HeaderValue> {
        let date = match &self.handle {
            Some(handle) if !handle.is_finished() => self.current.load().as_ref().clone(),
            _ => format_now(),
        };
        HeaderValue::from_maybe_shared(date).ok()
    }
}

impl std::fmt::Debug for DateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateService").field("refreshing", &self.handle.is_some()).finish()
    }
}

/// Implements the `Drop` trait to ensure the background task is properly cleaned up
/// when the `DateService` is dropped.
impl Drop for DateService {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
