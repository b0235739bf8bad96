//! Transport collaborator contract and failure classification.
//!
//! The engine does not implement the network layer. It hands each request to
//! a [`Transport`] and classifies the failures it reports; a failed fetch is
//! converted into a synthetic placeholder response so the crawl continues.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::resource::{ResourceDescriptor, ResponseData};

/// Classified I/O failures a transport may report.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,

    #[error("request timed out")]
    Timeout,

    #[error("socket error: {0}")]
    Socket(String),

    #[error("could not resolve host")]
    UnresolvedHost,

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("transport failure: {0}")]
    Other(String),
}

/// Performs the actual request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_and_receive(
        &self,
        request: &ResourceDescriptor,
    ) -> Result<ResponseData, TransportError>;
}

/// Builds the placeholder response reported for a failed fetch: status `0`,
/// the classification as the reason phrase, and a diagnostic body. TLS
/// failures carry an enriched explanation.
pub(crate) fn failure_response(error: &TransportError) -> ResponseData {
    let diagnostic = match error {
        TransportError::Tls(detail) => format!(
            "The connection could not be established over TLS. The handshake failed \
             or the server certificate was not accepted: {detail}"
        ),
        other => format!("The resource could not be fetched: {other}"),
    };
    ResponseData::new(0, &error.to_string(), Bytes::from(diagnostic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_response_is_synthetic() {
        let response = failure_response(&TransportError::ConnectionRefused);
        assert!(response.is_synthetic_failure());
        assert_eq!(response.reason, "connection refused");
        assert!(!response.body.is_empty());
    }

    #[test]
    fn tls_failure_carries_enriched_diagnostic() {
        let response = failure_response(&TransportError::Tls("unknown issuer".to_string()));
        let body = String::from_utf8_lossy(&response.body);
        assert!(body.contains("TLS"));
        assert!(body.contains("unknown issuer"));
    }
}
