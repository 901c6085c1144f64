//! Trail: the immutable record of one command execution

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Execution record produced for every command, cached or not.
///
/// A trail is read-only once published. `Clone` produces a fully independent
/// copy; the registry hands one to each observer so that no observer can see
/// another's view.
#[derive(Debug, Clone)]
pub struct Trail {
    /// The query text that was executed (or served from cache).
    pub query: String,
    /// The bound parameters, as an ordered JSON mapping of name to value.
    pub parameters: Value,
    /// UTC instant the execution started.
    pub start: DateTime<Utc>,
    /// Elapsed execution time. Zero for cache hits.
    pub runtime: Duration,
    /// Host the command ran on.
    pub machine_name: String,
    /// Name of the executing program.
    pub program_name: String,
    /// Failure payload if the underlying execution failed.
    pub error: Option<String>,
    /// Whether the result was served from the cache cascade.
    pub is_cache_hit: bool,
}

impl Trail {
    /// A synthetic trail for a cache-cascade hit: zero runtime, started now.
    pub fn cache_hit(query: impl Into<String>, parameters: Value) -> Self {
        Self {
            query: query.into(),
            parameters,
            start: Utc::now(),
            runtime: Duration::ZERO,
            machine_name: machine_name().to_string(),
            program_name: program_name().to_string(),
            error: None,
            is_cache_hit: true,
        }
    }

    /// A trail for an execution against the underlying store.
    pub fn executed(
        query: impl Into<String>,
        parameters: Value,
        start: DateTime<Utc>,
        runtime: Duration,
        error: Option<String>,
    ) -> Self {
        Self {
            query: query.into(),
            parameters,
            start,
            runtime,
            machine_name: machine_name().to_string(),
            program_name: program_name().to_string(),
            error,
            is_cache_hit: false,
        }
    }

    /// Whether the tracked command executed successfully.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn runtime_ms(&self) -> u64 {
        self.runtime.as_millis() as u64
    }
}

/// The host name, resolved once per process.
pub fn machine_name() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string())
    })
}

/// The executing program's name, resolved once per process.
pub fn program_name() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| {
        env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .or_else(|| env::args().next())
            .unwrap_or_else(|| "unknown-program".to_string())
    })
}
