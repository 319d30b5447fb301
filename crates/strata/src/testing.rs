//! In-memory doubles for exercising stacks and routers without sockets.

use std::io;
use std::sync::Arc;

use http::StatusCode;
use parking_lot::Mutex;

use crate::env::LogSink;
use crate::writer::ResponseWriter;
use crate::logger::LogEntry;

/// A [`ResponseWriter`] that records everything written to it.
///
/// The recorder is a clonable handle: pass one clone to `serve` and keep
/// another for assertions.
///
/// ```rust
/// use strata::testing::ResponseRecorder;
/// use strata::{Env, Request, Rw, Stack};
///
/// let stack = Stack::new(Env::shared()).then(|rw: Rw| {
///     let _ = rw.write_str("pong");
/// });
///
/// let recorder = ResponseRecorder::new();
/// stack.serve(recorder.clone(), Request::get("/ping"));
/// assert_eq!(recorder.body_string(), "pong");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    state: Arc<Mutex<RecorderState>>,
}

#[derive(Debug, Default)]
struct RecorderState {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The first status code written, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.state.lock().status
    }

    /// The last value set for a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.state
            .lock()
            .headers
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    /// The accumulated body bytes.
    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        self.state.lock().body.clone()
    }

    /// The body as UTF-8 (lossy).
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().body).into_owned()
    }
}

impl ResponseWriter for ResponseRecorder {
    fn set_header(&mut self, name: &str, value: &str) {
        self.state
            .lock()
            .headers
            .push((name.to_ascii_lowercase(), value.to_string()));
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.status.is_none() {
            state.status = Some(StatusCode::OK);
        }
        state.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn write_status(&mut self, status: StatusCode) {
        let mut state = self.state.lock();
        if state.status.is_none() {
            state.status = Some(status);
        }
    }
}

/// A log sink that collects committed entries for assertions.
#[derive(Debug, Clone, Default)]
pub struct CapturedLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CapturedLog {
    /// Creates an empty capture buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink suitable for [`Env::with_log_sink`](crate::Env::with_log_sink).
    #[must_use]
    pub fn sink(&self) -> LogSink {
        let entries = self.entries.clone();
        Arc::new(move |entry: &LogEntry| {
            entries.lock().push(entry.clone());
        })
    }

    /// The entries committed so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_captures_everything() {
        let recorder = ResponseRecorder::new();
        let mut writer = recorder.clone();
        writer.set_header("X-Thing", "one");
        writer.write_status(StatusCode::CREATED);
        writer.write(b"abc").unwrap();

        assert_eq!(recorder.status(), Some(StatusCode::CREATED));
        assert_eq!(recorder.header("x-thing"), Some("one".to_string()));
        assert_eq!(recorder.body_string(), "abc");
    }

    #[test]
    fn test_recorder_implicit_200() {
        let recorder = ResponseRecorder::new();
        let mut writer = recorder.clone();
        writer.write(b"ok").unwrap();
        assert_eq!(recorder.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_captured_log_collects() {
        let captured = CapturedLog::new();
        let sink = captured.sink();
        let entry = LogEntry::begin(
            "1.1.1.1".to_string(),
            chrono::Utc::now(),
            http::Method::GET,
            "/x".to_string(),
        );
        sink(&entry);
        assert_eq!(captured.entries().len(), 1);
        assert_eq!(captured.entries()[0].request_uri, "/x");
    }
}
