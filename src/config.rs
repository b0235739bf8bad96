//! # Configuration Module
//!
//! Flat, validated set of tunables consumed read-only by the crawl engine.
//!
//! ## Overview
//!
//! `SpiderConfig` collects every knob a crawl honors: depth and duration
//! caps, worker-pool sizing, per-request delay, derived-seed synthesis
//! toggles, URL exclusion, and the parameter-handling policy used when
//! building canonical resource identities.
//!
//! The configuration is immutable once a crawl has started. Loading from a
//! file or UI is an external concern; the struct derives `serde` so callers
//! can deserialize it from whatever format they own.

use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SpiderError;

/// Policy for handling query (and OData path) parameters when deriving the
/// canonical identity of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamPolicy {
    /// Ignore every parameter: `/page?a=1` and `/page?b=2` are the same unit.
    IgnoreAll,
    /// Keep parameter names, drop their values.
    IgnoreValue,
    /// Use the full parameter list, names and values.
    #[default]
    UseAll,
}

/// Immutable-per-run crawl tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiderConfig {
    /// Maximum crawl depth; `0` means unlimited.
    pub max_depth: u32,
    /// Number of concurrent crawl workers.
    pub thread_count: usize,
    /// Delay inserted before each request, in milliseconds.
    pub request_delay_ms: u64,
    /// Synthesize a `/robots.txt` seed for every registered seed host.
    pub handle_robots_txt: bool,
    /// Synthesize a `/sitemap.xml` seed for every registered seed host.
    pub handle_sitemap_xml: bool,
    /// Synthesize `.svn`/`.git` metadata seeds next to every registered seed.
    pub handle_vcs_metadata: bool,
    /// Whether form parsers may auto-submit discovered forms.
    pub submit_forms: bool,
    /// HTTP method form parsers use when auto-submitting.
    pub form_submit_method: String,
    /// Resources whose URL matches this pattern are never fetched.
    pub skip_url_pattern: Option<String>,
    /// Wall-clock cap on the whole crawl, in seconds; `0` means unlimited.
    pub max_duration_secs: u64,
    /// Maximum discovered children per site node; `0` means unlimited.
    pub max_children: u32,
    /// Whether the transport should accept cookies (pass-through knob).
    pub accept_cookies: bool,
    /// Responses larger than this many bytes are not parsed for links.
    pub max_parse_size: usize,
    /// Query parameters excluded from canonical identities (session ids etc.).
    pub irrelevant_parameters: HashSet<String>,
    /// Parameter-handling policy for canonical identities.
    pub param_policy: ParamPolicy,
    /// How long `stop()` waits for in-flight tasks before force-cancelling.
    pub shutdown_grace_ms: u64,
    /// Capacity of the listener event bus.
    pub event_capacity: usize,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        SpiderConfig {
            max_depth: 5,
            thread_count: num_cpus::get().clamp(2, 8),
            request_delay_ms: 0,
            handle_robots_txt: true,
            handle_sitemap_xml: true,
            handle_vcs_metadata: false,
            submit_forms: false,
            form_submit_method: "POST".to_string(),
            skip_url_pattern: None,
            max_duration_secs: 0,
            max_children: 0,
            accept_cookies: true,
            max_parse_size: 2_621_440,
            irrelevant_parameters: HashSet::new(),
            param_policy: ParamPolicy::default(),
            shutdown_grace_ms: 2_000,
            event_capacity: 1_024,
        }
    }
}

impl SpiderConfig {
    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), SpiderError> {
        if self.thread_count == 0 {
            return Err(SpiderError::Configuration(
                "thread_count must be greater than 0".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SpiderError::Configuration(
                "event_capacity must be greater than 0".to_string(),
            ));
        }
        if self.form_submit_method.trim().is_empty() {
            return Err(SpiderError::Configuration(
                "form_submit_method must not be empty".to_string(),
            ));
        }
        self.compiled_skip_pattern().map(|_| ())
    }

    /// Compiles the URL skip pattern, if one is configured.
    pub(crate) fn compiled_skip_pattern(&self) -> Result<Option<Regex>, SpiderError> {
        match &self.skip_url_pattern {
            None => Ok(None),
            Some(raw) => Regex::new(raw).map(Some).map_err(|e| {
                SpiderError::Configuration(format!("invalid skip_url_pattern `{raw}`: {e}"))
            }),
        }
    }

    /// Per-request delay as a `Duration`.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Wall-clock crawl cap, or `None` when unlimited.
    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration_secs > 0).then(|| Duration::from_secs(self.max_duration_secs))
    }

    /// Grace period granted to in-flight tasks during `stop()`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Whether `depth` lies past the configured maximum.
    pub(crate) fn depth_exceeded(&self, depth: u32) -> bool {
        self.max_depth != 0 && depth >= self.max_depth
    }
}
