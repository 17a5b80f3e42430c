//! Request/response correlation for diagnostics.
//!
//! A [`Tracer`] is handed to the facade at construction. Each public call
//! opens a [`TraceId`] and every line written for that call (the request, any
//! supplemental statements, the response) carries the same id, so the `in`
//! and `out` halves can be matched up in a busy log.

use chrono::Local;
use log::info;
use std::env;
use std::fmt;

/// Environment variable that turns tracing on in [`Tracer::from_env`].
pub const TRACE_ENV: &str = "DEBUG_OMNIDB";

const SIGNATURE: &str = "omnidb";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// Fresh id from four random bytes, hex encoded.
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let id = uuid.as_bytes()[..4]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tracer {
    enabled: bool,
}

impl Tracer {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub const fn disabled() -> Self {
        Self::new(false)
    }

    /// Enabled whenever `DEBUG_OMNIDB` is set, whatever its value.
    pub fn from_env() -> Self {
        Self::new(env::var_os(TRACE_ENV).is_some())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Open a call and log its request half.
    pub fn begin(&self, operation: &str, request: impl fmt::Display) -> TraceId {
        let id = TraceId::generate();
        self.emit(&id, operation, "in", &request.to_string());
        id
    }

    /// Log the response half of a call opened with [`Tracer::begin`].
    pub fn end(&self, id: &TraceId, operation: &str, response: impl fmt::Display) {
        self.emit(id, operation, "out", &response.to_string());
    }

    /// Log an intermediate step, typically a supplemental statement.
    pub fn note(&self, id: &TraceId, operation: &str, detail: impl fmt::Display) {
        self.emit(id, operation, "..", &detail.to_string());
    }

    fn emit(&self, id: &TraceId, operation: &str, phase: &str, message: &str) {
        if !self.enabled {
            return;
        }
        let now = Local::now().format("%H:%M:%S%.3f");
        info!(
            "[{}] {} : {} {} {} {}",
            SIGNATURE,
            now,
            id,
            phase,
            operation,
            squash_message(message)
        );
    }
}

/// Collapse a multi-line message onto one line.
///
/// Each line is trimmed and the pieces are joined with single spaces.
pub fn squash_message(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_shape() {
        let id = TraceId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, TraceId::generate());
    }

    #[test]
    fn test_squash_message() {
        assert_eq!(squash_message(""), "");
        assert_eq!(
            squash_message("  SELECT\r\n      a,\n      b\n    FROM t  "),
            "SELECT a, b FROM t"
        );
    }

    #[test]
    fn test_disabled_tracer_still_hands_out_ids() {
        let tracer = Tracer::disabled();
        assert!(!tracer.is_enabled());
        let id = tracer.begin("tables", "{}");
        tracer.end(&id, "tables", "0 rows");
        assert_eq!(id.as_str().len(), 8);
    }
}
