//! Per-request log entries.
//!
//! A [`Log`] handle is created when a request enters the chain and
//! committed by a deferred handler after everything else (including the
//! error handler) has run. Handlers that want to annotate the entry take
//! `Log` as a parameter:
//!
//! ```rust
//! use strata::{Log, Request};
//!
//! fn check_auth(req: Request, log: Log) {
//!     if let Some(user) = req.form_value("user") {
//!         log.note("user", user);
//!     }
//! }
//! # let _ = check_auth;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use http::Method;
use parking_lot::Mutex;

use crate::response_writer::Recorded;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

/// Requests slower than this are colored yellow in the default log line.
const SLOW_REQUEST: Duration = Duration::from_millis(30);

/// The information tracked per request.
///
/// Everything except `notes` and `quiet` is filled in automatically by the
/// logging middleware.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Client address (honoring proxy headers).
    pub remote_ip: String,
    /// When the request entered the chain.
    pub start: DateTime<Utc>,
    /// Request method.
    pub method: Method,
    /// Full request URI.
    pub request_uri: String,
    /// Final response status (0 until committed).
    pub status_code: u16,
    /// Response body bytes written.
    pub response_size: usize,
    /// Wall time from start to commit.
    pub elapsed: Duration,
    /// Internal error detail attached by an error handler.
    pub error: Option<String>,
    /// Free-form per-request annotations.
    pub notes: BTreeMap<String, String>,
    /// Suppresses the default sink's output when set.
    pub quiet: bool,
}

impl LogEntry {
    /// Creates an entry with the request facts known at arrival time.
    #[must_use]
    pub fn begin(remote_ip: String, start: DateTime<Utc>, method: Method, uri: String) -> Self {
        Self {
            remote_ip,
            start,
            method,
            request_uri: uri,
            status_code: 0,
            response_size: 0,
            elapsed: Duration::ZERO,
            error: None,
            notes: BTreeMap::new(),
            quiet: false,
        }
    }

    /// Renders the notes and error suffix: sorted `key="value"` pairs,
    /// then the error on its own indented line.
    #[must_use]
    pub fn notes_and_error(&self) -> String {
        let mut msg = self
            .notes
            .iter()
            .map(|(k, v)| format!("{k}={v:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(error) = &self.error {
            msg.push_str("\n  ERROR: ");
            msg.push_str(error);
        }
        msg
    }

    /// Renders the default one-line, ANSI-colorized form: green for
    /// normal requests, yellow for slow ones, red for errors.
    #[must_use]
    pub fn render_line(&self) -> String {
        let (color, reset) = self.colors();
        format!(
            "{color}{} {} \"{} {}\" ({} {}B {:?}) {}{reset}\n",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.remote_ip,
            self.method,
            self.request_uri,
            self.status_code,
            self.response_size,
            self.elapsed,
            self.notes_and_error(),
        )
    }

    fn colors(&self) -> (&'static str, &'static str) {
        if self.status_code >= 400 || self.error.is_some() {
            (RED, RESET)
        } else if self.elapsed > SLOW_REQUEST {
            (YELLOW, RESET)
        } else {
            (GREEN, RESET)
        }
    }
}

/// The shared, injectable handle around a [`LogEntry`].
#[derive(Debug, Clone)]
pub struct Log {
    entry: Arc<Mutex<LogEntry>>,
}

impl strata_chain::Injectable for Log {}

impl Log {
    /// Wraps an entry for sharing across handlers.
    #[must_use]
    pub fn start(entry: LogEntry) -> Self {
        Self {
            entry: Arc::new(Mutex::new(entry)),
        }
    }

    /// Adds a note to the entry.
    pub fn note(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entry.lock().notes.insert(key.into(), value.into());
    }

    /// Records internal error detail.
    pub fn set_error(&self, detail: impl Into<String>) {
        self.entry.lock().error = Some(detail.into());
    }

    /// Suppresses output of this entry by the default sink.
    pub fn quiet(&self) {
        self.entry.lock().quiet = true;
    }

    /// Fills in the response-side fields at commit time.
    pub fn commit(&self, recorded: &Recorded, now: DateTime<Utc>) {
        let mut entry = self.entry.lock();
        entry.elapsed = (now - entry.start).to_std().unwrap_or_default();
        entry.response_size = recorded.bytes_written();
        entry.status_code = recorded.status().map_or(0, |s| s.as_u16());
    }

    /// A copy of the current entry state.
    #[must_use]
    pub fn snapshot(&self) -> LogEntry {
        self.entry.lock().clone()
    }
}

/// The logging middleware of the "usual" presets: creates the [`Log`]
/// when the request enters the chain and commits it through the
/// environment's sink after everything else has run.
///
/// The commit half reads the response facts from [`Recorded`], so this
/// wrap expects [`wrap_response_writer`](crate::wrap_response_writer) to
/// be installed earlier in the chain.
#[must_use]
pub fn log_requests(env: &std::sync::Arc<crate::Env>) -> crate::Wrap {
    let start_env = env.clone();
    let start = move |req: crate::Request| -> Log {
        Log::start(LogEntry::begin(
            req.remote_ip().to_string(),
            start_env.now(),
            req.method().clone(),
            req.uri().to_string(),
        ))
    };
    let commit_env = env.clone();
    let commit = move |log: Log, recorded: Recorded| {
        log.commit(&recorded, commit_env.now());
        (commit_env.write_log)(&log.snapshot());
    };
    crate::Wrap::new(start, commit)
}

/// Middleware that suppresses log output for the current request.
///
/// ```rust,ignore
/// // Reduce favicon noise:
/// router.get("/favicon.ico", (strata::no_log, serve_favicon));
/// ```
pub fn no_log(log: Log) {
    log.quiet();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry() -> LogEntry {
        LogEntry::begin(
            "1.2.3.4".to_string(),
            Utc.with_ymd_and_hms(2001, 2, 3, 4, 5, 6).unwrap(),
            Method::GET,
            "/hello".to_string(),
        )
    }

    #[test]
    fn test_notes_are_sorted() {
        let mut e = entry();
        e.notes.insert("zebra".to_string(), "last".to_string());
        e.notes.insert("alpha".to_string(), "first".to_string());
        assert_eq!(e.notes_and_error(), "alpha=\"first\" zebra=\"last\"");
    }

    #[test]
    fn test_error_appended() {
        let mut e = entry();
        e.error = Some("(404) no such user".to_string());
        assert!(e.notes_and_error().ends_with("ERROR: (404) no such user"));
    }

    #[test]
    fn test_render_line_colors() {
        let mut e = entry();
        e.status_code = 200;
        assert!(e.render_line().starts_with(GREEN));

        e.elapsed = Duration::from_millis(45);
        assert!(e.render_line().starts_with(YELLOW));

        e.status_code = 500;
        assert!(e.render_line().starts_with(RED));
        assert!(e.render_line().ends_with(&format!("{RESET}\n")));
    }

    #[test]
    fn test_render_line_contents() {
        let mut e = entry();
        e.status_code = 200;
        e.response_size = 11;
        e.elapsed = Duration::from_millis(13);
        let line = e.render_line();
        assert!(line.contains("2001-02-03T04:05:06Z"));
        assert!(line.contains("1.2.3.4"));
        assert!(line.contains("\"GET /hello\""));
        assert!(line.contains("(200 11B 13ms)"));
    }

    #[test]
    fn test_log_handle_shares_entry() {
        let log = Log::start(entry());
        let other = log.clone();
        other.note("user", "bob");
        assert_eq!(log.snapshot().notes.get("user").unwrap(), "bob");
    }

    #[test]
    fn test_no_log_sets_quiet() {
        let log = Log::start(entry());
        no_log(log.clone());
        assert!(log.snapshot().quiet);
    }
}
