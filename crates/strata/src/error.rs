//! The structured HTTP error carrier and the standard error handlers.

use std::fmt;

use http::StatusCode;
use strata_chain::Failure;

use crate::writer::Rw;
use crate::logger::Log;

/// An error that tells the error handler three things: the status code to
/// respond with, the sanitized client-facing message, and the internal
/// detail that belongs in the server log.
///
/// ```rust
/// use http::StatusCode;
/// use strata::Error;
///
/// fn lookup(id: &str) -> Result<(), Error> {
///     Err(Error::new(StatusCode::UNAUTHORIZED, format!("Invalid id: {id}"))
///         .log(format!("rejected lookup of {id:?}")))
/// }
/// # let _ = lookup("ghost");
/// ```
#[derive(Debug, Default)]
pub struct Error {
    /// HTTP status for the response. `None` falls back to 500.
    pub code: Option<StatusCode>,
    /// Client-visible message. Empty falls back to the status reason.
    pub client_msg: String,
    /// Internal message for the request log; never sent to the client.
    pub log_msg: String,
    /// Underlying cause, logged but never sent to the client.
    pub cause: Option<anyhow::Error>,
    done: bool,
}

impl Error {
    /// Creates an error with a status code and client message.
    #[must_use]
    pub fn new(code: StatusCode, client_msg: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            client_msg: client_msg.into(),
            ..Self::default()
        }
    }

    /// Attaches an internal log message.
    #[must_use]
    pub fn log(mut self, log_msg: impl Into<String>) -> Self {
        self.log_msg = log_msg.into();
        self
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn caused_by(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// The sentinel that aborts a chain without producing an error
    /// response: the standard handlers treat it as a no-op.
    ///
    /// Useful when a handler already wrote the full response itself.
    #[must_use]
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }

    /// Returns `true` for the [`done`](Error::done) sentinel.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The effective status code (500 when unset).
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.code.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The effective client message (the status reason when empty).
    #[must_use]
    pub fn client_message(&self) -> &str {
        if self.client_msg.is_empty() {
            self.status().canonical_reason().unwrap_or("Internal Server Error")
        } else {
            &self.client_msg
        }
    }

    /// Whether this error carries anything worth logging.
    #[must_use]
    pub fn loggable(&self) -> bool {
        !self.log_msg.is_empty() || self.cause.is_some()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.status().as_u16(), self.log_msg)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(&**cause),
            None => None,
        }
    }
}

/// How a [`Failure`] should be answered over HTTP.
///
/// Failures carrying an [`Error`] keep their declared status and client
/// message; anything else is a generic 500 whose detail goes only to the
/// log.
struct Response<'a> {
    status: StatusCode,
    client_msg: &'a str,
    loggable: bool,
    done: bool,
}

fn classify(failure: &Failure) -> Response<'_> {
    if failure.downcast_ref::<Done>().is_some() {
        return Response {
            status: StatusCode::OK,
            client_msg: "",
            loggable: false,
            done: true,
        };
    }
    match failure.downcast_ref::<Error>() {
        Some(err) => Response {
            status: err.status(),
            client_msg: err.client_message(),
            loggable: err.loggable(),
            done: err.is_done(),
        },
        None => Response {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            client_msg: "Internal Server Error",
            loggable: true,
            done: false,
        },
    }
}

/// The standalone abort sentinel, for chains that use their own error
/// types: returning `Done` stops the chain and the standard handlers
/// write nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Done;

impl fmt::Display for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<done>")
    }
}

impl std::error::Error for Done {}

/// The default error handler of the "usual" presets.
///
/// Responds with the failure's status code and client message as plain
/// text and attaches the internal detail to the request log. The
/// [`Done`]/[`Error::done`] sentinels are a no-op.
pub fn handle_error(rw: Rw, log: Log, failure: Failure) {
    let response = classify(&failure);
    if response.done {
        return;
    }
    if response.loggable {
        log.set_error(failure.to_string());
    }
    rw.set_header("content-type", "text/plain; charset=utf-8");
    rw.write_status(response.status);
    let _ = rw.write_str(response.client_msg);
    let _ = rw.write_str("\n");
}

/// Like [`handle_error`], but responds as `{"error": "<client message>"}`
/// with a JSON content type.
pub fn handle_error_json(rw: Rw, log: Log, failure: Failure) {
    let response = classify(&failure);
    if response.done {
        return;
    }
    if response.loggable {
        log.set_error(failure.to_string());
    }
    rw.set_header("content-type", "application/json");
    rw.write_status(response.status);
    let body = serde_json::json!({ "error": response.client_msg });
    let _ = rw.write_str(&body.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LogEntry;
    use crate::testing::ResponseRecorder;
    use chrono::Utc;

    fn test_log() -> Log {
        Log::start(LogEntry::begin(
            "127.0.0.1".to_string(),
            Utc::now(),
            http::Method::GET,
            "/".to_string(),
        ))
    }

    #[test]
    fn test_display_includes_cause() {
        let err = Error::new(StatusCode::BAD_GATEWAY, "upstream broken")
            .log("fetch failed")
            .caused_by(std::io::Error::new(std::io::ErrorKind::Other, "refused"));
        assert_eq!(err.to_string(), "(502) fetch failed: refused");
    }

    #[test]
    fn test_defaults() {
        let err = Error::default();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal Server Error");
        assert!(!err.loggable());
    }

    #[test]
    fn test_handle_error_writes_status_and_message() {
        let sink = ResponseRecorder::new();
        let log = test_log();
        let failure = Failure::of(Error::new(StatusCode::UNAUTHORIZED, "Invalid id: ghost"));
        handle_error(Rw::new(sink.clone()), log, failure);

        assert_eq!(sink.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(sink.body_string(), "Invalid id: ghost\n");
        assert_eq!(
            sink.header("content-type"),
            Some("text/plain; charset=utf-8".to_string())
        );
    }

    #[test]
    fn test_handle_error_logs_internal_detail() {
        let sink = ResponseRecorder::new();
        let log = test_log();
        let failure = Failure::of(
            Error::new(StatusCode::NOT_FOUND, "No such user").log("uid 42 not in db"),
        );
        handle_error(Rw::new(sink), log.clone(), failure);
        assert!(log.snapshot().error.unwrap().contains("uid 42 not in db"));
    }

    #[test]
    fn test_client_only_error_is_not_logged() {
        let sink = ResponseRecorder::new();
        let log = test_log();
        let failure = Failure::of(Error::new(StatusCode::BAD_REQUEST, "Must specify user ID"));
        handle_error(Rw::new(sink), log.clone(), failure);
        assert!(log.snapshot().error.is_none());
    }

    #[test]
    fn test_generic_failure_becomes_500() {
        #[derive(Debug, thiserror::Error)]
        #[error("disk on fire")]
        struct Oops;

        let sink = ResponseRecorder::new();
        let log = test_log();
        handle_error(Rw::new(sink.clone()), log.clone(), Failure::of(Oops));

        assert_eq!(sink.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(sink.body_string(), "Internal Server Error\n");
        assert!(log.snapshot().error.unwrap().contains("disk on fire"));
    }

    #[test]
    fn test_done_writes_nothing() {
        let sink = ResponseRecorder::new();
        let log = test_log();
        handle_error(Rw::new(sink.clone()), log.clone(), Failure::of(Done));
        handle_error(
            Rw::new(sink.clone()),
            log.clone(),
            Failure::of(Error::done()),
        );

        assert_eq!(sink.status(), None);
        assert!(sink.body_string().is_empty());
        assert!(log.snapshot().error.is_none());
    }

    #[test]
    fn test_json_handler() {
        let sink = ResponseRecorder::new();
        let log = test_log();
        let failure = Failure::of(Error::new(StatusCode::FORBIDDEN, "nope"));
        handle_error_json(Rw::new(sink.clone()), log, failure);

        assert_eq!(sink.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(sink.body_string(), r#"{"error":"nope"}"#);
        assert_eq!(
            sink.header("content-type"),
            Some("application/json".to_string())
        );
    }
}
