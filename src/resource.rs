//! Resource descriptors: the unit of discovery, and the fetched message a
//! completed request produces.

use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::error::SpiderError;

/// A discovered or seeded fetchable unit. Immutable once created.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Uppercase HTTP method.
    pub method: String,
    pub uri: Url,
    /// Header name/value pairs sent with the request.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Distance from the seed that led here; seeds are depth 0.
    pub depth: u32,
    /// Parser-level hint: record this resource but do not fetch it.
    pub dont_fetch: bool,
    /// The fetched message this resource was extracted from, if any.
    pub source: Option<Arc<FetchedMessage>>,
}

impl ResourceDescriptor {
    /// A GET seed at depth 0.
    pub fn seed(uri: Url) -> Self {
        Self::seed_with_method(uri, "GET")
    }

    /// A seed at depth 0 with an explicit method.
    pub fn seed_with_method(uri: Url, method: &str) -> Self {
        ResourceDescriptor {
            method: method.to_ascii_uppercase(),
            uri,
            headers: Vec::new(),
            body: Bytes::new(),
            depth: 0,
            dont_fetch: false,
            source: None,
        }
    }

    /// A resource extracted by a parser, one level below its source.
    ///
    /// Fails on unparseable URIs so a bad link never reaches the dedup loop.
    pub fn discovered(
        method: &str,
        uri: &str,
        source: &Arc<FetchedMessage>,
    ) -> Result<Self, SpiderError> {
        let parsed = source
            .request
            .uri
            .join(uri)
            .map_err(|e| SpiderError::InvalidSeed {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;
        Ok(ResourceDescriptor {
            method: method.to_ascii_uppercase(),
            uri: parsed,
            headers: Vec::new(),
            body: Bytes::new(),
            depth: source.request.depth + 1,
            dont_fetch: false,
            source: Some(Arc::clone(source)),
        })
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Marks the resource as record-only.
    pub fn not_fetched(mut self) -> Self {
        self.dont_fetch = true;
        self
    }
}

/// The response half of a fetched message.
#[derive(Debug, Clone)]
pub struct ResponseData {
    /// HTTP status code; `0` marks a synthetic failure response.
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseData {
    pub fn new(status: u16, reason: &str, body: Bytes) -> Self {
        ResponseData {
            status,
            reason: reason.to_string(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Whether this response was synthesized for a transport failure.
    pub fn is_synthetic_failure(&self) -> bool {
        self.status == 0
    }
}

/// A request paired with the response the transport produced for it.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub request: ResourceDescriptor,
    pub response: ResponseData,
}

impl FetchedMessage {
    pub fn new(request: ResourceDescriptor, response: ResponseData) -> Self {
        FetchedMessage { request, response }
    }
}
