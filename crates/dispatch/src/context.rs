//! Per-request execution context.
//!
//! Each dispatched request runs inside [`ExecutionContext::scope`], which installs a fresh
//! task-local slot. Everything called from that task (middleware, interceptors, pipes,
//! handlers) sees only its own request and response, no matter how many requests are
//! interleaved on the same runtime thread.

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::ResponseModel;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT: RefCell<Option<ContextState>>;
}

/// The request and response of the dispatch in progress.
#[derive(Debug, Clone)]
pub struct ContextState {
    request: Arc<Request>,
    response: ResponseModel,
}

impl ContextState {
    pub fn new(request: Request, response: ResponseModel) -> Self {
        Self { request: Arc::new(request), response }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn response(&self) -> &ResponseModel {
        &self.response
    }

    pub fn into_response(self) -> ResponseModel {
        self.response
    }
}

/// Handle to the current task's context. Holds no data itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContext {
    _priv: (),
}

impl ExecutionContext {
    pub fn current() -> Self {
        Self { _priv: () }
    }

    /// Runs `fut` with an empty context slot of its own. The slot is released when `fut`
    /// completes, fails or is dropped, and an enclosing scope sees its own state again.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        CURRENT.scope(RefCell::new(None), fut).await
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut Option<ContextState>) -> R) -> Result<R, DispatchError> {
        CURRENT
            .try_with(|cell| cell.try_borrow_mut().map(|mut slot| f(&mut slot)))
            .map_err(|_| DispatchError::ContextUnavailable)?
            .map_err(|_| DispatchError::ContextUnavailable)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ContextState) -> R) -> Result<R, DispatchError> {
        self.with_slot(|slot| slot.as_mut().map(f))?.ok_or(DispatchError::ContextUnavailable)
    }

    pub fn set(&self, state: ContextState) -> Result<(), DispatchError> {
        self.with_slot(|slot| *slot = Some(state))
    }

    /// A snapshot of the current state, `None` when nothing has been set yet.
    pub fn get(&self) -> Option<ContextState> {
        self.with_slot(|slot| slot.clone()).ok().flatten()
    }

    pub fn clear(&self) {
        let _ = self.with_slot(|slot| slot.take());
    }

    /// Replaces the request, typically with the one middleware produced.
    pub fn set_request(&self, request: Request) -> Result<(), DispatchError> {
        self.with_state(|state| state.request = Arc::new(request))
    }

    pub fn request(&self) -> Result<Arc<Request>, DispatchError> {
        self.with_state(|state| Arc::clone(&state.request))
    }

    pub fn get_request(&self) -> Option<Arc<Request>> {
        self.request().ok()
    }

    pub fn set_response(&self, response: ResponseModel) -> Result<(), DispatchError> {
        self.with_state(|state| state.response = response)
    }

    pub fn response(&self) -> Result<ResponseModel, DispatchError> {
        self.with_state(|state| state.response.clone())
    }

    pub fn get_response(&self) -> Option<ResponseModel> {
        self.response().ok()
    }

    pub fn take_response(&self) -> Result<ResponseModel, DispatchError> {
        self.with_state(|state| std::mem::take(&mut state.response))
    }

    /// Mutates the current response in place.
    ///
    /// `f` must not reenter the context.
    pub fn with_response<R>(&self, f: impl FnOnce(&mut ResponseModel) -> R) -> Result<R, DispatchError> {
        self.with_state(|state| f(&mut state.response))
    }

    pub fn with_request<R>(&self, f: impl FnOnce(&Request) -> R) -> Result<R, DispatchError> {
        self.with_state(|state| f(&state.request))
    }
}
