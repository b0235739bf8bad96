//! # Sentinel Spider
//!
//! An embeddable web-crawl engine for security assessment tooling: it maps
//! the attack surface of a target application by fetching seeds, parsing
//! responses for further resources, and reporting everything it finds to
//! listeners. The network layer and persistence are collaborator traits, so
//! the engine slots into a larger proxy suite or a test harness alike.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sentinel_spider::config::SpiderConfig;
//! use sentinel_spider::spider::Spider;
//! # use sentinel_spider::resource::{ResourceDescriptor, ResponseData};
//! # use sentinel_spider::transport::{Transport, TransportError};
//! # struct HttpTransport;
//! # #[async_trait::async_trait]
//! # impl Transport for HttpTransport {
//! #     async fn send_and_receive(
//! #         &self,
//! #         _request: &ResourceDescriptor,
//! #     ) -> Result<ResponseData, TransportError> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let spider = Spider::builder(SpiderConfig::default())
//!     .transport(Arc::new(HttpTransport))
//!     .build()?;
//! spider.add_seed(url::Url::parse("http://target.example/")?)?;
//!
//! let mut events = spider.subscribe();
//! spider.start().await;
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`spider`]: orchestrator, builder, worker pool, lifecycle.
//! - [`controller`]: discovery intake: dedup, filters, task creation.
//! - [`task`]: the per-resource unit of work (crate-internal).
//! - [`identity`]: canonical dedup keys.
//! - [`filter`] / [`parser`]: the pluggable extension seams.
//! - [`transport`] / [`store`]: the I/O collaborator contracts.
//! - [`listener`]: the event bus every outcome is published on.

pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod identity;
pub mod listener;
pub mod parser;
pub mod prelude;
pub mod resource;
pub mod scope;
pub mod spider;
pub mod store;
pub mod transport;

mod seed;
mod state;
mod task;

pub use error::{SpiderError, StoreError};
pub use spider::{Spider, SpiderBuilder};
