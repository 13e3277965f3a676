//! Router (C6): method → handler registry, middleware chain, panic guard.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::context::DispatchContext;
use crate::error::McpError;

pub type HandlerResult = Result<Value, McpError>;
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &DispatchContext, method: &str, params: Option<Value>) -> HandlerResult;
}

#[async_trait::async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn call(&self, ctx: &DispatchContext, method: &str, params: Option<Value>);
}

/// `(next) -> handler`: sees the request before and the response after the
/// rest of the chain runs, may mutate `ctx`, and may short-circuit by
/// returning without calling `next.run(...)` (spec.md §4.6).
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut DispatchContext,
        method: &str,
        params: Option<Value>,
        next: Next<'_>,
    ) -> HandlerResult;
}

/// The remainder of the middleware chain, from one middleware's point of
/// view. Boxing the recursive continuation is what lets the chain be an
/// arbitrary, runtime-registered length instead of a fixed compile-time
/// nesting (Rust's `async fn` cannot otherwise express unbounded mutual
/// recursion between `Router::run_chain` and `Next::run`).
pub struct Next<'a> {
    router: &'a Router,
    index: usize,
}

impl<'a> Next<'a> {
    pub fn run(
        self,
        ctx: &'a mut DispatchContext,
        method: &'a str,
        params: Option<Value>,
    ) -> BoxFuture<'a, HandlerResult> {
        self.router.run_chain(self.index, ctx, method, params)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("method `{0}` is already registered")]
pub struct DuplicateHandler(pub String);

/// Method → handler map is a [`DashMap`] so steady-state lookups never
/// block behind a registration (spec.md §5: "copy-on-write or concurrent
/// map; lookups are lock-free").
pub struct Router {
    handlers: DashMap<String, Arc<dyn Handler>>,
    notification_handlers: DashMap<String, Arc<dyn NotificationHandler>>,
    default_handler: Option<Arc<dyn Handler>>,
    default_notification_handler: Option<Arc<dyn NotificationHandler>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            notification_handlers: DashMap::new(),
            default_handler: None,
            default_notification_handler: None,
            middlewares: Vec::new(),
        }
    }

    /// Registers `handler` for `method`. Fails if `method` is already
    /// registered (spec.md §4.6: "unique per method").
    pub fn register(&self, method: impl Into<String>, handler: Arc<dyn Handler>) -> Result<(), DuplicateHandler> {
        let method = method.into();
        match self.handlers.entry(method.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DuplicateHandler(method)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    pub fn register_notification(
        &self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<(), DuplicateHandler> {
        let method = method.into();
        match self.notification_handlers.entry(method.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DuplicateHandler(method)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    pub fn register_default(&mut self, handler: Arc<dyn Handler>) {
        self.default_handler = Some(handler);
    }

    pub fn register_default_notification(&mut self, handler: Arc<dyn NotificationHandler>) {
        self.default_notification_handler = Some(handler);
    }

    /// Middlewares run in registration order: the first-registered one wraps
    /// the outermost call (spec.md §4.6).
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub async fn handle(&self, ctx: &mut DispatchContext, method: &str, params: Option<Value>) -> HandlerResult {
        self.run_chain(0, ctx, method, params).await
    }

    fn run_chain<'a>(
        &'a self,
        index: usize,
        ctx: &'a mut DispatchContext,
        method: &'a str,
        params: Option<Value>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            match self.middlewares.get(index) {
                Some(middleware) => {
                    let next = Next { router: self, index: index + 1 };
                    middleware.handle(ctx, method, params, next).await
                }
                None => self.dispatch_to_handler(ctx, method, params).await,
            }
        })
    }

    async fn dispatch_to_handler(&self, ctx: &DispatchContext, method: &str, params: Option<Value>) -> HandlerResult {
        let handler = self
            .handlers
            .get(method)
            .map(|entry| Arc::clone(entry.value()))
            .or_else(|| self.default_handler.clone());

        let Some(handler) = handler else {
            return Err(McpError::method_not_found(method));
        };

        run_guarded(handler, ctx.clone(), method.to_string(), params).await
    }

    /// Fire-and-forget: errors and panics are logged, never propagated — a
    /// notification has no id to correlate a response with (spec.md §4.6).
    pub async fn handle_notification(&self, ctx: &DispatchContext, method: &str, params: Option<Value>) {
        let handler = self
            .notification_handlers
            .get(method)
            .map(|entry| Arc::clone(entry.value()))
            .or_else(|| self.default_notification_handler.clone());

        let Some(handler) = handler else {
            tracing::warn!(method, "no notification handler registered; dropping");
            return;
        };

        let ctx = ctx.clone();
        let method_owned = method.to_string();
        let outcome = tokio::spawn(async move { handler.call(&ctx, &method_owned, params).await }).await;
        if let Err(join_error) = outcome {
            tracing::error!("notification handler panicked for `{method}`: {join_error}");
        }
    }
}

/// Runs `handler` on its own task so a panic inside it cannot take down the
/// dispatch loop, mirroring the teacher's `tokio::spawn` isolation of a
/// long-running tool call in `message_processor.rs::handle_call_tool`. A
/// `JoinError` becomes a sanitized `Internal` error; the raw panic payload
/// is only logged.
async fn run_guarded(
    handler: Arc<dyn Handler>,
    ctx: DispatchContext,
    method: String,
    params: Option<Value>,
) -> HandlerResult {
    match tokio::spawn(async move { handler.call(&ctx, &method, params).await }).await {
        Ok(result) => result,
        Err(join_error) => {
            tracing::error!("handler panicked: {join_error}");
            Err(McpError::internal(join_error.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct Echo;

    #[async_trait::async_trait]
    impl Handler for Echo {
        async fn call(&self, _ctx: &DispatchContext, _method: &str, params: Option<Value>) -> HandlerResult {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    struct Panics;

    #[async_trait::async_trait]
    impl Handler for Panics {
        async fn call(&self, _ctx: &DispatchContext, _method: &str, _params: Option<Value>) -> HandlerResult {
            panic!("boom");
        }
    }

    struct RecordingMiddleware {
        log: Arc<StdMutex<Vec<String>>>,
        label: &'static str,
    }

    #[async_trait::async_trait]
    impl Middleware for RecordingMiddleware {
        async fn handle(
            &self,
            ctx: &mut DispatchContext,
            method: &str,
            params: Option<Value>,
            next: Next<'_>,
        ) -> HandlerResult {
            self.log.lock().unwrap().push(format!("{}:before", self.label));
            let result = next.run(ctx, method, params).await;
            self.log.lock().unwrap().push(format!("{}:after", self.label));
            result
        }
    }

    struct ShortCircuit;

    #[async_trait::async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(
            &self,
            _ctx: &mut DispatchContext,
            _method: &str,
            _params: Option<Value>,
            _next: Next<'_>,
        ) -> HandlerResult {
            Err(McpError::invalid_request("short-circuited"))
        }
    }

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let router = Router::new();
        router.register("echo", Arc::new(Echo)).unwrap();
        let mut ctx = DispatchContext::detached();
        let result = router.handle(&mut ctx, "echo", Some(json!({"x": 1}))).await;
        assert_eq!(result, Ok(json!({"x": 1})));
    }

    #[tokio::test]
    async fn unregistered_method_without_default_is_method_not_found() {
        let router = Router::new();
        let mut ctx = DispatchContext::detached();
        let err = router.handle(&mut ctx, "nope", None).await.unwrap_err();
        assert_eq!(err.code(), mcp_types::error_code::METHOD_NOT_FOUND_ERROR_CODE);
    }

    #[tokio::test]
    async fn panicking_handler_becomes_internal_error() {
        let router = Router::new();
        router.register("boom", Arc::new(Panics)).unwrap();
        let mut ctx = DispatchContext::detached();
        let err = router.handle(&mut ctx, "boom", None).await.unwrap_err();
        assert_eq!(err.code(), mcp_types::error_code::INTERNAL_ERROR_CODE);
    }

    #[tokio::test]
    async fn middlewares_wrap_outermost_in_registration_order() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let mut router = Router::new();
        router.register("echo", Arc::new(Echo)).unwrap();
        router.add_middleware(Arc::new(RecordingMiddleware {
            log: Arc::clone(&log),
            label: "outer",
        }));
        router.add_middleware(Arc::new(RecordingMiddleware {
            log: Arc::clone(&log),
            label: "inner",
        }));

        let mut ctx = DispatchContext::detached();
        router.handle(&mut ctx, "echo", None).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:before", "inner:before", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let mut router = Router::new();
        router.register("echo", Arc::new(Echo)).unwrap();
        router.add_middleware(Arc::new(ShortCircuit));

        let mut ctx = DispatchContext::detached();
        let err = router.handle(&mut ctx, "echo", None).await.unwrap_err();
        assert_eq!(err.code(), mcp_types::error_code::INVALID_REQUEST_ERROR_CODE);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let router = Router::new();
        router.register("echo", Arc::new(Echo)).unwrap();
        assert!(router.register("echo", Arc::new(Echo)).is_err());
    }
}
