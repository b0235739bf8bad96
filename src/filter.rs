//! # Filter Module
//!
//! Fetch and parse filter contracts plus the built-in filters the engine
//! installs from its configuration.
//!
//! ## Overview
//!
//! Fetch filters are pure predicates over a candidate resource, evaluated in
//! order: the first filter that rejects wins and its reason is reported to
//! listeners verbatim. Parse filters run after a successful fetch and decide
//! whether the response body is worth handing to the parser pipeline; a
//! `Wanted` vote from any filter suppresses the default tie-breaker.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use regex::Regex;

use crate::resource::{FetchedMessage, ResourceDescriptor};
use crate::scope::SpiderScope;

/// Why a candidate resource was not fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    OutOfScope,
    ExcludedByPattern,
    TooManyChildren,
    IllegalUri,
    /// Rejection from a caller-supplied filter, with its own reason text.
    UserRejected(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutOfScope => write!(f, "out of crawl scope"),
            RejectReason::ExcludedByPattern => write!(f, "excluded by URL pattern"),
            RejectReason::TooManyChildren => write!(f, "too many children for node"),
            RejectReason::IllegalUri => write!(f, "illegal URI"),
            RejectReason::UserRejected(reason) => write!(f, "{reason}"),
        }
    }
}

/// Outcome of a fetch-filter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCheck {
    Valid,
    Rejected(RejectReason),
}

/// Decides whether a resource may be fetched at all.
pub trait FetchFilter: Send + Sync {
    fn check(&self, resource: &ResourceDescriptor) -> FetchCheck;
}

/// Decision of a parse filter for a fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseDecision {
    /// No objection; later filters and the default tie-breaker still apply.
    NotFiltered,
    /// Positively wants the message parsed; disables the default tie-breaker.
    Wanted,
    /// Do not parse, with a listener-visible reason.
    Filtered(String),
}

/// Decides whether a fetched response's body should be parsed for links.
pub trait ParseFilter: Send + Sync {
    fn filter(&self, message: &FetchedMessage) -> ParseDecision;
}

/// Rejects resources whose host lies outside the seed-derived scope.
pub struct ScopeFetchFilter {
    scope: Arc<RwLock<SpiderScope>>,
}

impl ScopeFetchFilter {
    pub fn new(scope: Arc<RwLock<SpiderScope>>) -> Self {
        ScopeFetchFilter { scope }
    }
}

impl FetchFilter for ScopeFetchFilter {
    fn check(&self, resource: &ResourceDescriptor) -> FetchCheck {
        if self.scope.read().is_in_scope(&resource.uri) {
            FetchCheck::Valid
        } else {
            FetchCheck::Rejected(RejectReason::OutOfScope)
        }
    }
}

/// Rejects resources whose URL matches the configured skip pattern.
pub struct SkipPatternFilter {
    pattern: Regex,
}

impl SkipPatternFilter {
    pub fn new(pattern: Regex) -> Self {
        SkipPatternFilter { pattern }
    }
}

impl FetchFilter for SkipPatternFilter {
    fn check(&self, resource: &ResourceDescriptor) -> FetchCheck {
        if self.pattern.is_match(resource.uri.as_str()) {
            FetchCheck::Rejected(RejectReason::ExcludedByPattern)
        } else {
            FetchCheck::Valid
        }
    }
}

/// Caps how many distinct children a single site node may spawn.
///
/// Dedup runs before the filter chain, so each unique resource charges its
/// parent node exactly once.
pub struct ChildLimitFilter {
    max_children: u32,
    counts: DashMap<String, u32>,
}

impl ChildLimitFilter {
    pub fn new(max_children: u32) -> Self {
        ChildLimitFilter {
            max_children,
            counts: DashMap::new(),
        }
    }

    fn parent_key(resource: &ResourceDescriptor) -> String {
        let path = resource.uri.path();
        let dir_end = path.rfind('/').map(|i| i + 1).unwrap_or(path.len());
        format!(
            "{}{}",
            resource.uri.host_str().unwrap_or_default(),
            &path[..dir_end]
        )
    }
}

impl FetchFilter for ChildLimitFilter {
    fn check(&self, resource: &ResourceDescriptor) -> FetchCheck {
        if self.max_children == 0 {
            return FetchCheck::Valid;
        }
        let mut count = self.counts.entry(Self::parent_key(resource)).or_insert(0);
        if *count >= self.max_children {
            return FetchCheck::Rejected(RejectReason::TooManyChildren);
        }
        *count += 1;
        FetchCheck::Valid
    }
}

/// Tie-breaking parse filter applied when no registered filter wanted the
/// message: rejects synthetic failure responses and oversized bodies.
pub struct DefaultParseFilter {
    max_parse_size: usize,
}

impl DefaultParseFilter {
    pub fn new(max_parse_size: usize) -> Self {
        DefaultParseFilter { max_parse_size }
    }
}

impl ParseFilter for DefaultParseFilter {
    fn filter(&self, message: &FetchedMessage) -> ParseDecision {
        if message.response.is_synthetic_failure() {
            return ParseDecision::Filtered("response could not be fetched".to_string());
        }
        if self.max_parse_size > 0 && message.response.body.len() > self.max_parse_size {
            return ParseDecision::Filtered(format!(
                "response body exceeds maximum parse size ({} bytes)",
                self.max_parse_size
            ));
        }
        ParseDecision::NotFiltered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use url::Url;

    use crate::resource::ResponseData;

    fn resource(uri: &str) -> ResourceDescriptor {
        ResourceDescriptor::seed(Url::parse(uri).unwrap())
    }

    #[test]
    fn scope_filter_rejects_foreign_hosts() {
        let scope = Arc::new(RwLock::new(SpiderScope::new()));
        scope.write().widen(&Url::parse("http://example.com/").unwrap());
        let filter = ScopeFetchFilter::new(scope);

        assert_eq!(filter.check(&resource("http://example.com/a")), FetchCheck::Valid);
        assert_eq!(
            filter.check(&resource("http://other.org/a")),
            FetchCheck::Rejected(RejectReason::OutOfScope)
        );
    }

    #[test]
    fn skip_pattern_filter_matches_full_url() {
        let filter = SkipPatternFilter::new(Regex::new(r"(?i)\.(png|jpg)$").unwrap());
        assert_eq!(
            filter.check(&resource("http://example.com/logo.PNG")),
            FetchCheck::Rejected(RejectReason::ExcludedByPattern)
        );
        assert_eq!(filter.check(&resource("http://example.com/page")), FetchCheck::Valid);
    }

    #[test]
    fn child_limit_counts_per_parent_node() {
        let filter = ChildLimitFilter::new(2);
        assert_eq!(filter.check(&resource("http://example.com/dir/a")), FetchCheck::Valid);
        assert_eq!(filter.check(&resource("http://example.com/dir/b")), FetchCheck::Valid);
        assert_eq!(
            filter.check(&resource("http://example.com/dir/c")),
            FetchCheck::Rejected(RejectReason::TooManyChildren)
        );
        // A different node has its own budget.
        assert_eq!(filter.check(&resource("http://example.com/other/a")), FetchCheck::Valid);
    }

    #[test]
    fn default_parse_filter_rejects_oversized_and_failed() {
        let filter = DefaultParseFilter::new(4);
        let request = resource("http://example.com/a");

        let ok = FetchedMessage::new(
            request.clone(),
            ResponseData::new(200, "OK", Bytes::from_static(b"ab")),
        );
        assert_eq!(filter.filter(&ok), ParseDecision::NotFiltered);

        let large = FetchedMessage::new(
            request.clone(),
            ResponseData::new(200, "OK", Bytes::from_static(b"abcdef")),
        );
        assert!(matches!(filter.filter(&large), ParseDecision::Filtered(_)));

        let failed = FetchedMessage::new(
            request,
            ResponseData::new(0, "connection refused", Bytes::new()),
        );
        assert!(matches!(filter.filter(&failed), ParseDecision::Filtered(_)));
    }
}
