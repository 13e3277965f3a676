//! Hook pipeline (C5): the five hook kinds and their fixed firing order.
//!
//! Only `BeforeAny` may reject a dispatch; every other kind is an observer
//! whose panics/errors are caught and logged, never propagated (spec.md
//! §4.5). Hook lists are immutable after server startup — no locking on the
//! hot path (spec.md §5). Observer hook methods take owned data rather than
//! borrows so a misbehaving observer can be isolated on its own task.

use std::sync::Arc;

use mcp_types::RequestId;
use serde_json::Value;

use crate::error::McpError;

/// What a `BeforeAny` hook may decide. Supersedes the side-effecting
/// interception the teacher's orchestrator used; this is the rearchitected
/// "hooks as a chain of decisions" shape (spec.md REDESIGN FLAGS).
#[derive(Debug, Clone)]
pub enum HookDecision {
    Continue,
    Reject(McpError),
}

#[async_trait::async_trait]
pub trait BeforeAnyHook: Send + Sync {
    async fn call(&self, id: Option<RequestId>, method: String, raw_message: Value) -> HookDecision;
}

#[async_trait::async_trait]
pub trait BeforeInitializeHook: Send + Sync {
    async fn call(&self, id: RequestId, params: Value);
}

#[async_trait::async_trait]
pub trait AfterInitializeHook: Send + Sync {
    async fn call(&self, id: RequestId, params: Value, result: Value);
}

#[async_trait::async_trait]
pub trait OnSuccessHook: Send + Sync {
    async fn call(&self, id: Option<RequestId>, method: String, result: Value);
}

#[async_trait::async_trait]
pub trait OnErrorHook: Send + Sync {
    async fn call(&self, id: Option<RequestId>, method: String, error: McpError);
}

/// Five ordered hook lists, one per kind. Multiple hooks of the same kind
/// fire in registration order (spec.md §4.5).
#[derive(Default, Clone)]
pub struct HookChain {
    before_any: Vec<Arc<dyn BeforeAnyHook>>,
    before_initialize: Vec<Arc<dyn BeforeInitializeHook>>,
    after_initialize: Vec<Arc<dyn AfterInitializeHook>>,
    on_success: Vec<Arc<dyn OnSuccessHook>>,
    on_error: Vec<Arc<dyn OnErrorHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_before_any(&mut self, hook: Arc<dyn BeforeAnyHook>) {
        self.before_any.push(hook);
    }

    pub fn add_before_initialize(&mut self, hook: Arc<dyn BeforeInitializeHook>) {
        self.before_initialize.push(hook);
    }

    pub fn add_after_initialize(&mut self, hook: Arc<dyn AfterInitializeHook>) {
        self.after_initialize.push(hook);
    }

    pub fn add_on_success(&mut self, hook: Arc<dyn OnSuccessHook>) {
        self.on_success.push(hook);
    }

    pub fn add_on_error(&mut self, hook: Arc<dyn OnErrorHook>) {
        self.on_error.push(hook);
    }

    /// Runs every `BeforeAny` hook in order; the first rejection wins and
    /// short-circuits the rest. Runs in-process (not spawned): a hook that
    /// can reject is part of the dispatch decision, not a side observer.
    pub async fn run_before_any(
        &self,
        id: Option<&RequestId>,
        method: &str,
        raw_message: &Value,
    ) -> HookDecision {
        for hook in &self.before_any {
            let decision = hook
                .call(id.cloned(), method.to_string(), raw_message.clone())
                .await;
            match decision {
                HookDecision::Continue => {}
                reject @ HookDecision::Reject(_) => return reject,
            }
        }
        HookDecision::Continue
    }

    pub async fn run_before_initialize(&self, id: &RequestId, params: &Value) {
        for hook in self.before_initialize.clone() {
            let id = id.clone();
            let params = params.clone();
            guard(async move { hook.call(id, params).await }).await;
        }
    }

    pub async fn run_after_initialize(&self, id: &RequestId, params: &Value, result: &Value) {
        for hook in self.after_initialize.clone() {
            let id = id.clone();
            let params = params.clone();
            let result = result.clone();
            guard(async move { hook.call(id, params, result).await }).await;
        }
    }

    pub async fn run_on_success(&self, id: Option<&RequestId>, method: &str, result: &Value) {
        for hook in self.on_success.clone() {
            let id = id.cloned();
            let method = method.to_string();
            let result = result.clone();
            guard(async move { hook.call(id, method, result).await }).await;
        }
    }

    pub async fn run_on_error(&self, id: Option<&RequestId>, method: &str, error: &McpError) {
        for hook in self.on_error.clone() {
            let id = id.cloned();
            let method = method.to_string();
            let error = error.clone();
            guard(async move { hook.call(id, method, error).await }).await;
        }
    }
}

/// Runs an observer hook's future to completion on its own task and
/// swallows a panic instead of letting it propagate — observers can never
/// reject or abort dispatch (spec.md §4.5). Mirrors the teacher's own
/// `tokio::spawn` isolation of a handler that must not be allowed to take
/// the rest of the process down with it.
async fn guard<F>(future: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(()) => {}
        Err(join_error) => {
            tracing::error!("observer hook panicked: {join_error}");
        }
    }
}
