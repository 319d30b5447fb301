//! The immutable request snapshot handed to every chain.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

/// An immutable snapshot of an incoming HTTP request.
///
/// Built by the surrounding I/O layer (or by tests through
/// [`Request::builder`]) and injected into every chain.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: String,
}

impl Request {
    /// Starts building a request.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Shorthand for a bodyless GET request.
    ///
    /// # Panics
    ///
    /// Panics if `uri` does not parse.
    #[must_use]
    pub fn get(uri: &str) -> Self {
        Self::builder().method(Method::GET).uri(uri).build()
    }

    /// The request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The path portion of the URI.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The query string, if present.
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A single header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The peer address as reported by the transport.
    #[must_use]
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The client address for logging: `X-Real-IP`, then
    /// `X-Forwarded-For`, then the transport address.
    #[must_use]
    pub fn remote_ip(&self) -> &str {
        self.header("x-real-ip")
            .or_else(|| self.header("x-forwarded-for"))
            .unwrap_or(&self.remote_addr)
    }

    /// Looks up a form field by name, searching the query string first and
    /// then an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn form_value(&self, name: &str) -> Option<String> {
        if let Some(value) = lookup_urlencoded(self.query_string().unwrap_or(""), name) {
            return Some(value);
        }
        let form_body = self
            .header("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !form_body {
            return None;
        }
        let body = std::str::from_utf8(&self.body).ok()?;
        lookup_urlencoded(body, name)
    }
}

fn lookup_urlencoded(encoded: &str, name: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded).ok()?;
    pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

impl strata_chain::Injectable for Request {}

/// Builder for [`Request`], mainly for tests and adapters.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    uri: Option<Uri>,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<String>,
}

impl RequestBuilder {
    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the URI.
    ///
    /// # Panics
    ///
    /// Panics if `uri` does not parse; builder inputs are programmer
    /// constants.
    #[must_use]
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = Some(uri.parse().expect("invalid test uri"));
        self
    }

    /// Adds a header. Invalid values are silently skipped.
    #[must_use]
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn form(self, body: &str) -> Self {
        self.header("content-type", "application/x-www-form-urlencoded")
            .body(body.to_string())
    }

    /// Sets the transport peer address.
    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Builds the request.
    ///
    /// # Panics
    ///
    /// Panics if method or uri were not set.
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method.expect("method is required"),
            uri: self.uri.expect("uri is required"),
            headers: self.headers,
            body: self.body,
            remote_addr: self.remote_addr.unwrap_or_else(|| "127.0.0.1:0".to_string()),
        }
    }
}
