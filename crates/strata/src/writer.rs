//! The abstract response writer the engine drives.
//!
//! Actual socket handling lives outside this crate; anything that can
//! absorb status, headers, and bytes can implement [`ResponseWriter`] and
//! be driven by a chain.

use std::fmt;
use std::io;
use std::sync::Arc;

use http::StatusCode;
use parking_lot::Mutex;

/// The sink a chain writes its response into.
///
/// Implementations are free to buffer or stream. `write_status` is
/// expected to be effective only the first time it is called before any
/// body bytes; enforcing that is the wrapper's job (see
/// [`wrap_response_writer`](crate::wrap_response_writer)), not the
/// implementor's.
pub trait ResponseWriter: Send {
    /// Sets a response header, replacing any existing value.
    fn set_header(&mut self, name: &str, value: &str);

    /// Writes body bytes, returning how many were accepted.
    ///
    /// # Errors
    ///
    /// Propagates the underlying sink's I/O failure.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes the response status line.
    fn write_status(&mut self, status: StatusCode);

    /// Flushes buffered output. The default does nothing.
    fn flush(&mut self) {}
}

/// The clonable, injectable handle around a boxed [`ResponseWriter`].
///
/// Handlers receive `Rw` by value; all clones share the same underlying
/// writer. Middleware that wants to interpose on writes rebinds `Rw` by
/// returning a new one, exactly like
/// [`wrap_response_writer`](crate::wrap_response_writer) does.
#[derive(Clone)]
pub struct Rw {
    inner: Arc<Mutex<Box<dyn ResponseWriter>>>,
}

impl Rw {
    /// Wraps a concrete writer.
    #[must_use]
    pub fn new(writer: impl ResponseWriter + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Sets a response header.
    pub fn set_header(&self, name: &str, value: &str) {
        self.inner.lock().set_header(name, value);
    }

    /// Writes body bytes.
    ///
    /// # Errors
    ///
    /// Propagates the underlying writer's failure.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    /// Writes a string body.
    ///
    /// # Errors
    ///
    /// Propagates the underlying writer's failure.
    pub fn write_str(&self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    /// Writes the status line.
    pub fn write_status(&self, status: StatusCode) {
        self.inner.lock().write_status(status);
    }

    /// Flushes the underlying writer.
    pub fn flush(&self) {
        self.inner.lock().flush();
    }
}

impl strata_chain::Injectable for Rw {}

impl fmt::Debug for Rw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rw").finish_non_exhaustive()
    }
}

