//! Per-invocation state shared by every component of a pipeline run.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::cancellation::{CancellationError, CancellationToken};
use crate::provider::Scope;

/// Incoming unit of work, as handed over by a transport.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Outgoing result of a unit of work. Starts as `200` with an empty body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    /// Appends text to the body.
    pub fn write(&mut self, text: impl AsRef<str>) {
        self.body.extend_from_slice(text.as_ref().as_bytes());
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Progress of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    NotStarted,
    /// Component `i` (zero-based, in registration order) was the last one
    /// entered.
    Running(usize),
    /// Some component returned without continuing, and nothing failed.
    ShortCircuited,
    /// The terminal handler was reached and nothing failed.
    Completed,
    /// At least one component returned an error, even if an outer component
    /// recovered from it.
    Faulted,
}

/// Everything a component sees while handling one unit of work.
///
/// Built fresh for each invocation and never shared between two of them.
/// Owns the invocation's [`Scope`], so scoped services resolved through
/// [`scope`](ExecutionContext::scope) live exactly as long as the request.
pub struct ExecutionContext {
    request: Request,
    response: Response,
    items: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    token: CancellationToken,
    scope: Scope,
    state: InvocationState,
    reached_terminal: bool,
    faulted: bool,
}

impl ExecutionContext {
    pub fn new(request: Request, scope: Scope) -> Self {
        Self {
            request,
            response: Response::default(),
            items: HashMap::new(),
            token: CancellationToken::new(),
            scope,
            state: InvocationState::NotStarted,
            reached_terminal: false,
            faulted: false,
        }
    }

    /// Replaces the cancellation token, typically with one owned by the
    /// transport.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// The request scope. Resolve per-request services from here.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fails once the invocation has been cancelled. Components call this
    /// between units of work.
    pub fn check_cancelled(&self) -> Result<(), CancellationError> {
        self.token.check()
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    // ----- Items -----

    /// Stores a value for later components, replacing any value of the same
    /// type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.items
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.items
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.items
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.items
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    // ----- State tracking -----

    pub(crate) fn enter(&mut self, index: usize) {
        self.state = InvocationState::Running(index);
    }

    pub(crate) fn mark_terminal(&mut self) {
        self.reached_terminal = true;
    }

    pub(crate) fn mark_faulted(&mut self) {
        self.faulted = true;
    }

    pub(crate) fn finish(&mut self) {
        self.state = if self.faulted {
            InvocationState::Faulted
        } else if self.reached_terminal {
            InvocationState::Completed
        } else {
            InvocationState::ShortCircuited
        };
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("status", &self.response.status)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceCollection;

    fn context() -> ExecutionContext {
        let provider = ServiceCollection::new().build();
        ExecutionContext::new(Request::new("GET", "/"), provider.create_scope())
    }

    #[derive(Debug, PartialEq)]
    struct Route(&'static str);

    #[test]
    fn items_are_typed() {
        let mut ctx = context();
        assert!(ctx.get::<Route>().is_none());
        assert!(ctx.insert(Route("GET:/")).is_none());
        assert_eq!(ctx.insert(Route("GET:/home")), Some(Route("GET:/")));
        assert_eq!(ctx.get::<Route>(), Some(&Route("GET:/home")));
        assert_eq!(ctx.remove::<Route>(), Some(Route("GET:/home")));
        assert!(ctx.get::<Route>().is_none());
    }

    #[test]
    fn finish_prefers_fault() {
        let mut ctx = context();
        assert_eq!(ctx.state(), InvocationState::NotStarted);
        ctx.enter(0);
        ctx.mark_terminal();
        ctx.mark_faulted();
        ctx.finish();
        assert_eq!(ctx.state(), InvocationState::Faulted);
    }

    #[test]
    fn unfinished_chain_is_short_circuited() {
        let mut ctx = context();
        ctx.enter(2);
        ctx.finish();
        assert_eq!(ctx.state(), InvocationState::ShortCircuited);
    }

    #[test]
    fn cancelled_token_is_reported() {
        let token = CancellationToken::new();
        let ctx = context().with_token(token.child_token());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(ctx.check_cancelled().is_err());
    }
}
