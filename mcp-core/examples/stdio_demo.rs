//! Minimal stdio transport built on [`mcp_core::Orchestrator`].
//!
//! Reads newline-delimited JSON-RPC messages from stdin, feeds them to
//! `handle_message`, and writes whatever it returns to stdout — the same
//! read/process/write task split as the teacher's own stdio server, just
//! with `Orchestrator::handle_message` standing in for `MessageProcessor`.
//! Installing a `tracing` subscriber is this binary's job alone; the
//! library crate never does it on a caller's behalf.

use std::sync::Arc;

use async_trait::async_trait;
use mcp_core::ConnectionId;
use mcp_core::DispatchContext;
use mcp_core::HookChain;
use mcp_core::Orchestrator;
use mcp_core::Router;
use mcp_core::ServerConfig;
use mcp_core::router::Handler;
use mcp_core::router::HandlerResult;
use mcp_types::Implementation;
use mcp_types::ServerCapabilities;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::{self};
use tracing_subscriber::EnvFilter;

struct ListTools;

#[async_trait]
impl Handler for ListTools {
    async fn call(&self, _ctx: &DispatchContext, _method: &str, _params: Option<Value>) -> HandlerResult {
        Ok(json!({ "tools": [] }))
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let router = Router::new();
    router
        .register("tools/list", Arc::new(ListTools))
        .expect("tools/list is the only method registered here");

    let server_info = Implementation {
        name: "mcp-core-stdio-demo".to_string(),
        title: None,
        version: "0.0.0".to_string(),
    };

    let orchestrator = Orchestrator::new(
        Arc::new(router),
        HookChain::new(),
        ServerConfig::new(),
        server_info,
        ServerCapabilities::default(),
    );

    let connection_id = ConnectionId::new("stdio");
    orchestrator
        .open_connection(connection_id.as_str())
        .expect("the single stdio connection is created exactly once");

    let stdin = io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = orchestrator
            .handle_message(Some(connection_id.clone()), line.as_bytes())
            .await
        {
            stdout.write_all(&response).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    orchestrator.close_connection(connection_id.as_str()).await;
    Ok(())
}
