//! # Controller Module
//!
//! Discovery intake: dedup, filtering, task creation, and the parser
//! pipeline. Parsers call back into the controller for every resource they
//! extract, which keeps the at-most-once guarantee in one place.
//!
//! ## Ordering
//!
//! For each candidate resource the controller runs, in order: canonical
//! identity dedup, the fetch filter chain, the `dont_fetch` shortcut, then
//! task submission. Dedup comes first so a rejected resource is never
//! re-evaluated when rediscovered.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::ParamPolicy;
use crate::filter::{
    DefaultParseFilter, FetchCheck, FetchFilter, ParseDecision, ParseFilter,
};
use crate::identity::canonical_identity;
use crate::listener::FoundStatus;
use crate::parser::ResourceParser;
use crate::resource::{FetchedMessage, ResourceDescriptor};
use crate::spider::SpiderCore;
use crate::store::PendingHandle;
use crate::task::SpiderTask;

/// Discovery intake shared by the orchestrator and every parser.
pub struct Controller {
    core: Arc<SpiderCore>,
    weak: Weak<Controller>,
    fetch_filters: Vec<Box<dyn FetchFilter>>,
    parse_filters: Vec<Box<dyn ParseFilter>>,
    default_parse_filter: DefaultParseFilter,
    parsers: Vec<Arc<dyn ResourceParser>>,
    policy: ParamPolicy,
    irrelevant: HashSet<String>,
    visited: Mutex<HashSet<String>>,
}

impl Controller {
    pub(crate) fn new(
        core: Arc<SpiderCore>,
        fetch_filters: Vec<Box<dyn FetchFilter>>,
        parse_filters: Vec<Box<dyn ParseFilter>>,
        parsers: Vec<Arc<dyn ResourceParser>>,
    ) -> Arc<Self> {
        // The controller hands an owning reference of itself to every task,
        // hence the cyclic construction.
        Arc::new_cyclic(|weak| Controller {
            default_parse_filter: DefaultParseFilter::new(core.config.max_parse_size),
            policy: core.config.param_policy,
            irrelevant: core.config.irrelevant_parameters.clone(),
            weak: weak.clone(),
            core,
            fetch_filters,
            parse_filters,
            parsers,
            visited: Mutex::new(HashSet::new()),
        })
    }

    /// Canonical identity of a resource under the configured parameter
    /// policy.
    pub fn identity(&self, resource: &ResourceDescriptor) -> String {
        canonical_identity(resource, self.policy, &self.irrelevant)
    }

    /// Runs the fetch filter chain; the first rejection wins.
    pub(crate) fn check_fetch_filters(&self, resource: &ResourceDescriptor) -> FetchCheck {
        for filter in &self.fetch_filters {
            if let FetchCheck::Rejected(reason) = filter.check(resource) {
                return FetchCheck::Rejected(reason);
            }
        }
        FetchCheck::Valid
    }

    /// Intake for a pre-filtered seed: dedup and submit, no filter re-run.
    pub(crate) async fn add_seed(&self, resource: ResourceDescriptor) {
        if !self.mark_visited(&resource) {
            trace!(uri = %resource.uri, "duplicate seed ignored");
            return;
        }
        self.core.emit_found(&resource, FoundStatus::Seed);
        self.submit_new_task(resource).await;
    }

    /// Intake for a parser-discovered resource. At most one task is ever
    /// created per canonical identity, whatever the outcome here.
    pub async fn resource_found(&self, resource: ResourceDescriptor) {
        if !self.mark_visited(&resource) {
            trace!(uri = %resource.uri, "duplicate resource ignored");
            return;
        }
        match self.check_fetch_filters(&resource) {
            FetchCheck::Rejected(reason) => {
                debug!(uri = %resource.uri, %reason, "resource rejected");
                self.core
                    .emit_found(&resource, FoundStatus::Skipped(reason));
            }
            FetchCheck::Valid if resource.dont_fetch => {
                self.core
                    .emit_found(&resource, FoundStatus::AcceptedNotFetched);
            }
            FetchCheck::Valid => {
                self.core.emit_found(&resource, FoundStatus::Accepted);
                self.submit_new_task(resource).await;
            }
        }
    }

    /// Convenience intake for a raw URI extracted from a message. Bad URIs
    /// are logged and dropped; a broken link must never abort a parse pass.
    pub async fn resource_found_uri(
        &self,
        method: &str,
        uri: &str,
        source: &Arc<FetchedMessage>,
    ) {
        match ResourceDescriptor::discovered(method, uri, source) {
            Ok(resource) => self.resource_found(resource).await,
            Err(error) => {
                debug!(uri, %error, "discarding unparseable discovered URI");
            }
        }
    }

    fn mark_visited(&self, resource: &ResourceDescriptor) -> bool {
        let identity = self.identity(resource);
        self.visited.lock().insert(identity)
    }

    async fn submit_new_task(&self, resource: ResourceDescriptor) {
        let Some(controller) = self.weak.upgrade() else {
            return;
        };
        let id = match self.core.store.persist(&resource) {
            Ok(id) => id,
            Err(error) => {
                warn!(uri = %resource.uri, %error, "failed to stage pending request, abandoning task");
                return;
            }
        };
        let pending = PendingHandle::new(id, Arc::clone(&self.core.store));
        let task = SpiderTask::new(Arc::clone(&self.core), controller, resource, pending);
        self.core.submit_task(task).await;
    }

    /// Parse-filter verdict for a fetched message, applying the default
    /// tie-breaker unless a registered filter positively wanted the message.
    pub(crate) fn parse_decision(&self, message: &FetchedMessage) -> Option<String> {
        let mut wanted = false;
        for filter in &self.parse_filters {
            match filter.filter(message) {
                ParseDecision::Filtered(reason) => return Some(reason),
                ParseDecision::Wanted => wanted = true,
                ParseDecision::NotFiltered => {}
            }
        }
        if !wanted {
            if let ParseDecision::Filtered(reason) = self.default_parse_filter.filter(message) {
                return Some(reason);
            }
        }
        None
    }

    /// Runs the parser pipeline over a fetched message. The consumed flag
    /// folds across parsers so a structural parser can claim the message
    /// while non-exclusive scanners still get a look.
    pub(crate) async fn parse_message(&self, message: &Arc<FetchedMessage>) {
        let path = message.request.uri.path().to_string();
        let mut consumed = false;
        for parser in &self.parsers {
            if parser.can_parse(message, &path, consumed) {
                consumed = parser.parse(message, self).await || consumed;
            }
        }
        if !consumed {
            trace!(uri = %message.request.uri, "no parser consumed message");
        }
    }

    /// Number of distinct resources seen so far.
    pub fn visited_count(&self) -> usize {
        self.visited.lock().len()
    }

    /// Clears the dedup state for a fresh run against the same collaborators.
    pub fn reset(&self) {
        debug!("clearing visited-resource state");
        self.visited.lock().clear();
    }
}
