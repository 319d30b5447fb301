//! Response observation: byte and status tracking on top of any writer.

use std::io;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use http::StatusCode;

use crate::writer::{ResponseWriter, Rw};

/// Wraps the current writer to record response size and status.
///
/// Returns the replacement [`Rw`] (which the chain rebinds for all later
/// handlers) and the [`Recorded`] observable. The double return is how the
/// chain learns both facts: the new writer *replaces* the old binding
/// while the observable becomes *additionally* available.
///
/// Installed by the "usual" presets so the log commit can read the final
/// status code and byte count.
#[must_use]
pub fn wrap_response_writer(rw: Rw) -> (Rw, Recorded) {
    let state = Arc::new(RecordState::default());
    let recorded = Recorded {
        state: state.clone(),
    };
    let wrapped = Rw::new(RecordingWriter { inner: rw, state });
    (wrapped, recorded)
}

#[derive(Debug, Default)]
struct RecordState {
    bytes: AtomicUsize,
    /// First status code written, or 0 while unset.
    status: AtomicU16,
}

/// Observable counters for one response.
///
/// On the first body write without an explicit status, the status is
/// implicitly recorded as `200`.
#[derive(Debug, Clone)]
pub struct Recorded {
    state: Arc<RecordState>,
}

impl Recorded {
    /// Total body bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.state.bytes.load(Ordering::Relaxed)
    }

    /// The first status code observed, if any was written yet.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self.state.status.load(Ordering::Relaxed) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }
}

impl strata_chain::Injectable for Recorded {}

struct RecordingWriter {
    inner: Rw,
    state: Arc<RecordState>,
}

impl RecordingWriter {
    fn record_status(&self, status: StatusCode) {
        let _ = self.state.status.compare_exchange(
            0,
            status.as_u16(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }
}

impl ResponseWriter for RecordingWriter {
    fn set_header(&mut self, name: &str, value: &str) {
        self.inner.set_header(name, value);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.record_status(StatusCode::OK);
        let n = self.inner.write(buf)?;
        self.state.bytes.fetch_add(n, Ordering::Relaxed);
        Ok(n)
    }

    fn write_status(&mut self, status: StatusCode) {
        self.record_status(status);
        self.inner.write_status(status);
    }

    fn flush(&mut self) {
        self.inner.flush();
    }
}
