//! Async dispatcher (C7): a bounded worker pool in front of the router.
//!
//! A single reader task drains a bounded `mpsc` channel (`queue_capacity`)
//! and gates concurrent execution with a `Semaphore` holding `worker_count`
//! permits — the semaphore permits *are* the N parallel workers, rather
//! than N long-lived tasks fighting over one receiver. Mirrors the
//! bounded-channel idiom the teacher uses for its own outgoing-message
//! queue (`CHANNEL_CAPACITY` in `mcp-server/src/lib.rs`).

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use mcp_types::RequestId;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::BackpressurePolicy;
use crate::context::ConnectionId;
use crate::context::DispatchContext;
use crate::error::McpError;
use crate::router::HandlerResult;
use crate::router::Router;

type InFlightKey = (Option<ConnectionId>, RequestId);

struct WorkItem {
    ctx: DispatchContext,
    key: InFlightKey,
    method: String,
    params: Option<Value>,
    responder: oneshot::Sender<HandlerResult>,
}

/// `N` parallel workers over a bounded queue, with per-request cancellation
/// and deadline enforcement (spec.md §4.7).
pub struct Dispatcher {
    router: Arc<Router>,
    request_deadline: Duration,
    backpressure: BackpressurePolicy,
    sender: mpsc::Sender<WorkItem>,
    in_flight: Arc<DashMap<InFlightKey, CancellationToken>>,
    stopping: Arc<AtomicBool>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, config: &crate::config::ServerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let in_flight: Arc<DashMap<InFlightKey, CancellationToken>> = Arc::new(DashMap::new());
        let semaphore = Arc::new(Semaphore::new(config.worker_count.max(1)));
        let reader = spawn_reader(
            Arc::clone(&router),
            receiver,
            semaphore,
            Arc::clone(&in_flight),
            config.request_deadline,
        );

        Self {
            router,
            request_deadline: config.request_deadline,
            backpressure: config.backpressure,
            sender,
            in_flight,
            stopping: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(Some(reader)),
        }
    }

    /// Enqueues one request for async execution, returning once a worker has
    /// produced a result (or the request was cancelled/timed out). Registers
    /// the in-flight entry *before* enqueueing, per spec.md §4.7 step 1.
    pub async fn dispatch(
        &self,
        ctx: DispatchContext,
        connection_id: Option<ConnectionId>,
        id: RequestId,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> HandlerResult {
        if self.stopping.load(Ordering::Acquire) {
            return Err(McpError::resource_limit("dispatcher is stopping, no new work accepted"));
        }

        let key = (connection_id, id);
        self.in_flight.insert(key.clone(), ctx.cancellation());

        let (responder, receiver) = oneshot::channel();
        let item = WorkItem {
            ctx,
            key: key.clone(),
            method: method.into(),
            params,
            responder,
        };

        if let Err(err) = self.enqueue(item).await {
            self.in_flight.remove(&key);
            return Err(err);
        }

        match receiver.await {
            Ok(result) => result,
            Err(_) => {
                self.in_flight.remove(&key);
                Err(McpError::internal("worker dropped without producing a result"))
            }
        }
    }

    async fn enqueue(&self, item: WorkItem) -> Result<(), McpError> {
        match self.backpressure {
            BackpressurePolicy::Reject => self
                .sender
                .try_send(item)
                .map_err(|_| McpError::resource_limit("dispatch queue is full")),
            BackpressurePolicy::Block(timeout) => {
                match tokio::time::timeout(timeout, self.sender.send(item)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(McpError::internal("dispatcher reader task has stopped")),
                    Err(_) => Err(McpError::resource_limit("dispatch queue did not drain in time")),
                }
            }
        }
    }

    /// Cancels the matching in-flight entry, if any (driven by an inbound
    /// `notifications/cancelled`, spec.md §4.7).
    pub fn cancel(&self, connection_id: Option<&ConnectionId>, id: &RequestId) -> bool {
        let key = (connection_id.cloned(), id.clone());
        match self.in_flight.get(&key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every in-flight request bound to `connection_id` (spec.md
    /// §4.4: closing a connection cancels its pending in-flight requests;
    /// §5 cancellation signal (a): connection close).
    pub fn cancel_connection(&self, connection_id: &ConnectionId) {
        for entry in self.in_flight.iter() {
            let (key_connection, _) = entry.key();
            if key_connection.as_ref() == Some(connection_id) {
                entry.value().cancel();
            }
        }
    }

    /// Stops accepting new work, signals cancellation to every in-flight
    /// entry, waits up to `deadline` for drain, then returns regardless.
    /// Idempotent: a second call observes `stopping` already set and simply
    /// waits out the drain again.
    pub async fn stop(&self, deadline: Duration) {
        self.stopping.store(true, Ordering::Release);

        for entry in self.in_flight.iter() {
            entry.value().cancel();
        }

        let drained = tokio::time::timeout(deadline, async {
            while !self.in_flight.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = self.in_flight.len(),
                "dispatcher shutdown deadline elapsed with in-flight work remaining"
            );
        }

        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn request_deadline(&self) -> Duration {
        self.request_deadline
    }
}

fn spawn_reader(
    router: Arc<Router>,
    mut receiver: mpsc::Receiver<WorkItem>,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<DashMap<InFlightKey, CancellationToken>>,
    request_deadline: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = receiver.recv().await {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let router = Arc::clone(&router);
            let in_flight = Arc::clone(&in_flight);
            tokio::spawn(async move {
                let _permit = permit;
                run_work_item(router, item, in_flight, request_deadline).await;
            });
        }
    })
}

async fn run_work_item(
    router: Arc<Router>,
    item: WorkItem,
    in_flight: Arc<DashMap<InFlightKey, CancellationToken>>,
    request_deadline: Duration,
) {
    let WorkItem {
        mut ctx,
        key,
        method,
        params,
        responder,
    } = item;

    let cancellation = ctx.cancellation();
    let result = tokio::select! {
        result = router.handle(&mut ctx, &method, params) => result,
        () = cancellation.cancelled() => Err(McpError::connection_error("request cancelled")),
        () = tokio::time::sleep(request_deadline) => Err(McpError::resource_limit("request deadline exceeded")),
    };

    in_flight.remove(&key);
    let _ = responder.send(result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::router::Handler;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    struct Echo;

    #[async_trait::async_trait]
    impl Handler for Echo {
        async fn call(&self, _ctx: &DispatchContext, _method: &str, params: Option<Value>) -> HandlerResult {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    struct Never;

    #[async_trait::async_trait]
    impl Handler for Never {
        async fn call(&self, _ctx: &DispatchContext, _method: &str, _params: Option<Value>) -> HandlerResult {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn router_with(method: &str, handler: Arc<dyn Handler>) -> Arc<Router> {
        let router = Router::new();
        router.register(method, handler).unwrap();
        Arc::new(router)
    }

    #[tokio::test]
    async fn dispatches_and_removes_in_flight_entry() {
        let router = router_with("echo", Arc::new(Echo));
        let config = ServerConfig::new();
        let dispatcher = Dispatcher::new(router, &config);
        let ctx = DispatchContext::new(Some(ConnectionId::new("c1")));
        let result = dispatcher
            .dispatch(ctx, Some(ConnectionId::new("c1")), RequestId::Integer(1), "echo", Some(json!({"a": 1})))
            .await;
        assert_eq!(result, Ok(json!({"a": 1})));
        assert!(dispatcher.in_flight.is_empty());
    }

    #[tokio::test]
    async fn reject_backpressure_surfaces_resource_limit_when_queue_full() {
        let router = router_with("slow", Arc::new(Never));
        let config = ServerConfig::new().with_queue_capacity(1).with_worker_count(1);
        let dispatcher = Arc::new(Dispatcher::new(router, &config));

        let d1 = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let ctx = DispatchContext::new(Some(ConnectionId::new("c1")));
            let _ = d1.dispatch(ctx, Some(ConnectionId::new("c1")), RequestId::Integer(1), "slow", None).await;
        });
        // Give the worker a moment to pick up the first item and occupy the
        // single permit before we saturate the queue behind it.
        tokio::task::yield_now().await;

        let d2 = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let ctx = DispatchContext::new(Some(ConnectionId::new("c1")));
            let _ = d2.dispatch(ctx, Some(ConnectionId::new("c1")), RequestId::Integer(2), "slow", None).await;
        });
        tokio::task::yield_now().await;

        let ctx = DispatchContext::new(Some(ConnectionId::new("c1")));
        let result = dispatcher
            .dispatch(ctx, Some(ConnectionId::new("c1")), RequestId::Integer(3), "slow", None)
            .await;
        assert_eq!(result.unwrap_err().code(), mcp_types::error_code::RESOURCE_LIMIT_ERROR_CODE);
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_request() {
        let router = router_with("slow", Arc::new(Never));
        let config = ServerConfig::new();
        let dispatcher = Arc::new(Dispatcher::new(router, &config));
        let connection_id = ConnectionId::new("c1");

        let d = Arc::clone(&dispatcher);
        let conn = connection_id.clone();
        let handle = tokio::spawn(async move {
            let ctx = DispatchContext::new(Some(conn.clone()));
            d.dispatch(ctx, Some(conn), RequestId::Integer(1), "slow", None).await
        });

        tokio::task::yield_now().await;
        assert!(dispatcher.cancel(Some(&connection_id), &RequestId::Integer(1)));

        let result = handle.await.unwrap();
        assert_eq!(result.unwrap_err().code(), mcp_types::error_code::CONNECTION_ERROR_CODE);
    }

    #[tokio::test]
    async fn cancel_connection_aborts_only_its_own_in_flight_requests() {
        let router = router_with("slow", Arc::new(Never));
        let config = ServerConfig::new().with_worker_count(2);
        let dispatcher = Arc::new(Dispatcher::new(router, &config));
        let c1 = ConnectionId::new("c1");
        let c2 = ConnectionId::new("c2");

        let d1 = Arc::clone(&dispatcher);
        let conn1 = c1.clone();
        let handle1 = tokio::spawn(async move {
            let ctx = DispatchContext::new(Some(conn1.clone()));
            d1.dispatch(ctx, Some(conn1), RequestId::Integer(1), "slow", None).await
        });

        let d2 = Arc::clone(&dispatcher);
        let conn2 = c2.clone();
        let handle2 = tokio::spawn(async move {
            let ctx = DispatchContext::new(Some(conn2.clone()));
            d2.dispatch(ctx, Some(conn2), RequestId::Integer(1), "slow", None).await
        });

        tokio::task::yield_now().await;
        dispatcher.cancel_connection(&c1);

        let result1 = handle1.await.unwrap();
        assert_eq!(result1.unwrap_err().code(), mcp_types::error_code::CONNECTION_ERROR_CODE);
        assert!(!handle2.is_finished());

        dispatcher.cancel_connection(&c2);
        let result2 = handle2.await.unwrap();
        assert_eq!(result2.unwrap_err().code(), mcp_types::error_code::CONNECTION_ERROR_CODE);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_drains_within_deadline() {
        let router = router_with("echo", Arc::new(Echo));
        let config = ServerConfig::new();
        let dispatcher = Dispatcher::new(router, &config);

        dispatcher.stop(Duration::from_millis(50)).await;
        dispatcher.stop(Duration::from_millis(50)).await;

        let ctx = DispatchContext::detached();
        let result = dispatcher
            .dispatch(ctx, None, RequestId::Integer(1), "echo", None)
            .await;
        assert!(result.is_err());
    }
}
