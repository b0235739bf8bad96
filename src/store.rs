//! Pending-request staging collaborator.
//!
//! Every task persists its request before fetching so an abrupt shutdown
//! leaves no unresolved in-flight state behind. The engine treats the store
//! as opaque: persist, complete, release. A [`PendingHandle`] releases its
//! staging entry on drop, so force-cancelled tasks cannot leak entries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::StoreError;
use crate::resource::{ResourceDescriptor, ResponseData};

/// Durable staging area for in-flight requests.
pub trait PendingStore: Send + Sync {
    /// Stages a request, returning its handle id.
    fn persist(&self, request: &ResourceDescriptor) -> Result<u64, StoreError>;

    /// Resolves a staged request with its response.
    fn complete(&self, id: u64, response: &ResponseData);

    /// Discards a staged request that will never be resolved.
    fn release(&self, id: u64);
}

/// Owning handle for one staged request. Dropping an unconsumed handle
/// releases the staging entry.
pub struct PendingHandle {
    id: u64,
    store: Arc<dyn PendingStore>,
    consumed: bool,
}

impl PendingHandle {
    pub(crate) fn new(id: u64, store: Arc<dyn PendingStore>) -> Self {
        PendingHandle {
            id,
            store,
            consumed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolves the staged request and consumes the handle.
    pub fn complete(mut self, response: &ResponseData) {
        self.store.complete(self.id, response);
        self.consumed = true;
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        if !self.consumed {
            trace!(id = self.id, "releasing unconsumed pending handle");
            self.store.release(self.id);
        }
    }
}

/// In-memory staging store. The production suite persists into its history
/// database; tests and embedded use get this.
#[derive(Default)]
pub struct InMemoryPendingStore {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, String>>,
    released: AtomicU64,
    completed: AtomicU64,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged requests neither completed nor released.
    pub fn outstanding(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

impl PendingStore for InMemoryPendingStore {
    fn persist(&self, request: &ResourceDescriptor) -> Result<u64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .insert(id, request.uri.as_str().to_string());
        Ok(id)
    }

    fn complete(&self, id: u64, _response: &ResponseData) {
        if self.entries.lock().remove(&id).is_some() {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn release(&self, id: u64) {
        if self.entries.lock().remove(&id).is_some() {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use url::Url;

    fn staged(store: &Arc<InMemoryPendingStore>) -> PendingHandle {
        let request =
            ResourceDescriptor::seed(Url::parse("http://example.com/a").unwrap());
        let id = store.persist(&request).unwrap();
        PendingHandle::new(id, Arc::clone(store) as Arc<dyn PendingStore>)
    }

    #[test]
    fn dropped_handle_releases_entry() {
        let store = Arc::new(InMemoryPendingStore::new());
        let handle = staged(&store);
        assert_eq!(store.outstanding(), 1);
        drop(handle);
        assert_eq!(store.outstanding(), 0);
        assert_eq!(store.released_count(), 1);
    }

    #[test]
    fn completed_handle_is_not_double_released() {
        let store = Arc::new(InMemoryPendingStore::new());
        let handle = staged(&store);
        handle.complete(&ResponseData::new(200, "OK", Bytes::new()));
        assert_eq!(store.outstanding(), 0);
        assert_eq!(store.completed_count(), 1);
        assert_eq!(store.released_count(), 0);
    }
}
