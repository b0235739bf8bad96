//! Convenience re-exports for embedding the engine.

pub use crate::config::{ParamPolicy, SpiderConfig};
pub use crate::controller::Controller;
pub use crate::error::{SpiderError, StoreError};
pub use crate::filter::{
    FetchCheck, FetchFilter, ParseDecision, ParseFilter, RejectReason,
};
pub use crate::listener::{
    FoundStatus, SpiderEvent, SpiderListener, TaskOutcome, TaskResult,
};
pub use crate::parser::ResourceParser;
pub use crate::resource::{FetchedMessage, ResourceDescriptor, ResponseData};
pub use crate::scope::SpiderScope;
pub use crate::spider::{Spider, SpiderBuilder};
pub use crate::store::{InMemoryPendingStore, PendingHandle, PendingStore};
pub use crate::transport::{Transport, TransportError};
