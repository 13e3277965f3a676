//! Construction-time server configuration (ambient stack addition).
//!
//! Typed, immutable for the life of the server: every resource ceiling
//! named in spec.md §5 is a plain field fixed once at construction, never
//! read from a file or environment variable by this crate (that is
//! CLI/config-loading territory, out of scope per spec.md §1/§9). Mirrors
//! how the teacher's `MessageProcessor::new` takes a pre-built `Config`
//! rather than loading one itself.

use std::sync::Arc;
use std::time::Duration;

/// Injection point for protocol-version selection (spec.md §10 decision 2):
/// `mcp-core` never chooses a version on its own behalf, it only echoes
/// whatever this trait returns.
pub trait NegotiateVersion: Send + Sync {
    fn negotiate(&self, requested: &str) -> String;
}

/// Default policy: echo back exactly what the client asked for.
pub struct EchoRequestedVersion;

impl NegotiateVersion for EchoRequestedVersion {
    fn negotiate(&self, requested: &str) -> String {
        requested.to_string()
    }
}

/// What the async dispatcher does when its bounded queue is full
/// (spec.md §4.7).
#[derive(Debug, Clone, Copy)]
pub enum BackpressurePolicy {
    Block(Duration),
    Reject,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub handshake_timeout: Duration,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub request_deadline: Duration,
    pub max_message_size: usize,
    pub redact_errors: bool,
    pub validate_schemas: bool,
    pub backpressure: BackpressurePolicy,
    pub negotiate_version: Arc<dyn NegotiateVersion>,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn with_redact_errors(mut self, redact_errors: bool) -> Self {
        self.redact_errors = redact_errors;
        self
    }

    pub fn with_validate_schemas(mut self, validate_schemas: bool) -> Self {
        self.validate_schemas = validate_schemas;
        self
    }

    pub fn with_backpressure(mut self, backpressure: BackpressurePolicy) -> Self {
        self.backpressure = backpressure;
        self
    }

    pub fn with_negotiate_version(mut self, negotiate_version: Arc<dyn NegotiateVersion>) -> Self {
        self.negotiate_version = negotiate_version;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            worker_count: 8,
            queue_capacity: 128,
            request_deadline: Duration::from_secs(60),
            max_message_size: 10 * 1024 * 1024,
            redact_errors: true,
            validate_schemas: true,
            backpressure: BackpressurePolicy::Reject,
            negotiate_version: Arc::new(EchoRequestedVersion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_overrides_apply() {
        let config = ServerConfig::new()
            .with_worker_count(4)
            .with_queue_capacity(16)
            .with_handshake_timeout(Duration::from_millis(250));
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.handshake_timeout, Duration::from_millis(250));
    }

    #[test]
    fn default_echo_negotiator_returns_requested_version() {
        let config = ServerConfig::default();
        assert_eq!(config.negotiate_version.negotiate("2025-06-18"), "2025-06-18");
    }
}
