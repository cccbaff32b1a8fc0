use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crate::sys::SysResult;

/// Placeholder printed instead of byte payloads when they are redacted.
pub const REDACTED: &str = "(data)";

/// Where log records go. One call per record, already formatted.
pub trait LogSink: Send + Sync {
    fn record(&self, line: &str);
}

/// Writes each record as one line. The mutex keeps lines whole; it does
/// not keep a call's two records next to each other.
pub struct WriterSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn record(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!(error = %err, "failed to write log record");
        }
    }
}

/// Forwards records to `tracing` at info level.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, line: &str) {
        tracing::info!(target: "wasm_fs::logfs", "{line}");
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for BufferSink {
    fn record(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Whether read and write payloads are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Payload {
    Raw,
    #[default]
    Redacted,
}

/// Settings shared by a [`super::LoggingFs`] and every handle it opens.
pub struct LogConfig {
    name: String,
    sink: Arc<dyn LogSink>,
    payload: Payload,
}

impl LogConfig {
    pub fn new(name: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            name: name.into(),
            sink,
            payload: Payload::default(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }

    pub(super) fn emit(&self, handle: Option<&str>, op: &str, body: &str) {
        let line = match handle {
            Some(handle) => format!("LogFS {} {handle:?} {op}: {body}", self.name),
            None => format!("LogFS {} {op}: {body}", self.name),
        };
        self.sink.record(&line);
    }

    pub(super) fn before(&self, handle: Option<&str>, op: &str, params: &str) {
        self.emit(handle, op, &format!("calling with params: {params}"));
    }

    pub(super) fn after(&self, handle: Option<&str>, op: &str, results: &str) {
        self.emit(handle, op, &format!("returned results: {results}"));
    }

    /// Log around `f` and hand back exactly what it returned.
    pub(super) fn call<T>(
        &self,
        handle: Option<&str>,
        op: &str,
        params: &str,
        f: impl FnOnce() -> SysResult<T>,
        show: impl FnOnce(&T) -> String,
    ) -> SysResult<T> {
        self.before(handle, op, params);
        let result = f();
        self.after(handle, op, &results(&result, show));
        result
    }

    pub(super) fn bytes(&self, data: &[u8]) -> String {
        match self.payload {
            Payload::Raw => format!("{data:?}"),
            Payload::Redacted => REDACTED.to_string(),
        }
    }
}

/// Render a result as `<value> errno=0` or `errno=<NAME>`.
pub(super) fn results<T>(result: &SysResult<T>, show: impl FnOnce(&T) -> String) -> String {
    match result {
        Ok(value) => {
            let value = show(value);
            if value.is_empty() {
                "errno=0".to_string()
            } else {
                format!("{value} errno=0")
            }
        }
        Err(errno) => format!("errno={}", errno.name()),
    }
}
