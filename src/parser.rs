//! Resource parser contract.
//!
//! Parsers turn a fetched response into zero or more newly discovered
//! resources. They are pluggable and ordered; each parser is asked whether
//! it can handle the message given whether an earlier parser in the same
//! pass already consumed it. Discovered resources are delivered by calling
//! back into the controller, not returned, so a single response can yield
//! many resources and each one is deduplicated the moment it surfaces.

use std::sync::Arc;

use async_trait::async_trait;

use crate::controller::Controller;
use crate::resource::FetchedMessage;

/// Pluggable extractor for fetched responses.
#[async_trait]
pub trait ResourceParser: Send + Sync {
    /// Whether this parser wants the message. `already_consumed` is true
    /// when an earlier parser in the same pass structurally consumed it;
    /// non-exclusive parsers (a generic text scanner, say) may still return
    /// true.
    fn can_parse(&self, message: &FetchedMessage, path: &str, already_consumed: bool) -> bool;

    /// Extracts resources, reporting each via
    /// [`Controller::resource_found`]. Returns true when the message was
    /// structurally consumed.
    async fn parse(
        &self,
        message: &Arc<FetchedMessage>,
        controller: &Controller,
    ) -> bool;
}
