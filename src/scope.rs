//! Seed-derived crawl scope: the set of hosts the crawl may fetch from.

use std::collections::HashSet;

use url::Url;

/// Hosts the crawl is permitted to touch, widened by every registered seed.
#[derive(Debug, Default)]
pub struct SpiderScope {
    hosts: HashSet<String>,
}

impl SpiderScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the URL's host to the scope.
    pub fn widen(&mut self, url: &Url) {
        if let Some(host) = url.host_str() {
            self.hosts.insert(host.to_ascii_lowercase());
        }
    }

    /// Host comparison is case-insensitive and ignores the port.
    pub fn is_in_scope(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| self.hosts.contains(&host.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
