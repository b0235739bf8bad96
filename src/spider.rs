//! # Spider Module
//!
//! The crawl orchestrator: worker pool, pause/stop lifecycle, seed
//! expansion, scope inference, completion detection, and listener
//! notification.
//!
//! ## Overview
//!
//! A [`Spider`] is assembled through [`SpiderBuilder`], seeded with one or
//! more origin URLs, and driven by `start()`. Each deduplicated resource
//! becomes one task executed on a bounded worker pool; tasks report back
//! through a post-execution hook that maintains the submitted/completed
//! counters and fires completion exactly once, only after the whole seed
//! set has been enqueued.
//!
//! ## Lifecycle
//!
//! - `pause()` / `resume()`: a shared watch flag; workers block before each
//!   unit of work while paused and are woken by `resume()`.
//! - `stop()`: idempotent; resumes first (a stopped worker parked on the
//!   pause gate would otherwise never wake), waits a bounded grace period
//!   for in-flight tasks, then force-cancels the rest. Cancelled tasks
//!   still release their pending-request handles.
//! - A wall-clock duration cap is enforced by a once-per-second watchdog
//!   tick, so the crawl can overrun the cap by at most one tick. Status
//!   queries are pure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::SpiderConfig;
use crate::controller::Controller;
use crate::error::SpiderError;
use crate::filter::{
    ChildLimitFilter, FetchCheck, FetchFilter, ParseFilter, ScopeFetchFilter, SkipPatternFilter,
};
use crate::listener::{EventBus, FoundStatus, SpiderEvent, SpiderListener};
use crate::parser::ResourceParser;
use crate::resource::ResourceDescriptor;
use crate::scope::SpiderScope;
use crate::seed::derived_seeds;
use crate::state::RunState;
use crate::store::{InMemoryPendingStore, PendingStore};
use crate::task::SpiderTask;
use crate::transport::Transport;

/// Shared orchestrator state reachable from tasks and the controller.
pub(crate) struct SpiderCore {
    pub(crate) config: SpiderConfig,
    pub(crate) scope: Arc<RwLock<SpiderScope>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn PendingStore>,
    bus: EventBus,
    run_state: Mutex<RunState>,
    stopped: AtomicBool,
    pause_tx: watch::Sender<bool>,
    // Keeps the pause channel open: `watch::Sender::send` fails without
    // updating the value once every receiver is gone.
    _pause_rx: watch::Receiver<bool>,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
    workers: Arc<Semaphore>,
}

impl SpiderCore {
    fn new(
        config: SpiderConfig,
        scope: Arc<RwLock<SpiderScope>>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn PendingStore>,
    ) -> Self {
        let (pause_tx, pause_rx) = watch::channel(false);
        let bus = EventBus::new(config.event_capacity);
        let workers = Arc::new(Semaphore::new(config.thread_count));
        SpiderCore {
            config,
            scope,
            transport,
            store,
            bus,
            run_state: Mutex::new(RunState::new()),
            stopped: AtomicBool::new(false),
            pause_tx,
            _pause_rx: pause_rx,
            tasks: tokio::sync::Mutex::new(JoinSet::new()),
            workers,
        }
    }

    pub(crate) fn emit(&self, event: SpiderEvent) {
        self.bus.emit(event);
    }

    pub(crate) fn emit_found(&self, resource: &ResourceDescriptor, status: FoundStatus) {
        self.emit(SpiderEvent::FoundUri {
            uri: resource.uri.to_string(),
            method: resource.method.clone(),
            status,
        });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SpiderEvent> {
        self.bus.subscribe()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }

    fn pause(&self) {
        if !self.is_stopped() && !self.is_paused() {
            info!("crawl paused");
            let _ = self.pause_tx.send(true);
        }
    }

    fn resume(&self) {
        if self.is_paused() {
            info!("crawl resumed");
        }
        let _ = self.pause_tx.send(false);
    }

    /// Blocks the caller while the crawl is paused; woken by `resume()`.
    pub(crate) async fn wait_while_paused(&self) {
        let mut rx = self.pause_tx.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Enqueues a task onto the worker pool. A no-op once the crawl is
    /// stopped: a submission racing a concurrent `stop()` is expected and
    /// swallowed, and the dropped task releases its pending handle itself.
    pub(crate) async fn submit_task(&self, task: SpiderTask) {
        if self.is_stopped() {
            trace!("crawl stopped, dropping submitted task");
            return;
        }
        let mut tasks = self.tasks.lock().await;
        if self.is_stopped() {
            return;
        }
        {
            self.run_state.lock().tasks_submitted += 1;
        }
        let workers = Arc::clone(&self.workers);
        tasks.spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            task.run().await;
        });
    }

    /// Called unconditionally by every task on exit. Work finishing during
    /// or after a stop is not counted.
    pub(crate) fn post_task_execution(&self) {
        if self.is_stopped() {
            return;
        }
        let (percent, done, remaining, complete) = {
            let mut run_state = self.run_state.lock();
            run_state.tasks_completed += 1;
            let complete = run_state.is_drained() && !run_state.completion_fired;
            if complete {
                run_state.completion_fired = true;
            }
            (
                run_state.percent_done(),
                run_state.tasks_completed,
                run_state.remaining(),
                complete,
            )
        };
        self.emit(SpiderEvent::Progress {
            percent,
            done,
            remaining,
        });
        if complete {
            self.stopped.store(true, Ordering::SeqCst);
            info!(done, "crawl complete");
            self.emit(SpiderEvent::Complete { successful: true });
        }
    }

    /// Completion check for the window where every task finished before the
    /// seed set was fully enqueued.
    fn complete_if_drained(&self) {
        if self.is_stopped() {
            return;
        }
        let complete = {
            let mut run_state = self.run_state.lock();
            if run_state.is_drained() && !run_state.completion_fired {
                run_state.completion_fired = true;
                true
            } else {
                false
            }
        };
        if complete {
            self.stopped.store(true, Ordering::SeqCst);
            info!("crawl complete");
            self.emit(SpiderEvent::Complete { successful: true });
        }
    }

    /// Unsuccessful zero-progress completion for an empty/invalid seed set.
    fn complete_empty(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let fire = {
            let mut run_state = self.run_state.lock();
            run_state.initialized = true;
            if run_state.completion_fired {
                false
            } else {
                run_state.completion_fired = true;
                true
            }
        };
        self.emit(SpiderEvent::Progress {
            percent: 100,
            done: 0,
            remaining: 0,
        });
        if fire {
            self.emit(SpiderEvent::Complete { successful: false });
        }
    }

    /// Cooperative shutdown: bounded graceful drain, then force-cancel.
    async fn shutdown(&self, reason: &str) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(reason, "stopping crawl");
        // Wake workers parked on the pause gate before draining, or a
        // paused crawl could never observe the stop.
        self.resume();

        let grace = self.config.shutdown_grace();
        let mut tasks = self.tasks.lock().await;
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "graceful drain timed out, force-cancelling remaining tasks"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
        drop(tasks);

        let fire = {
            let mut run_state = self.run_state.lock();
            if run_state.completion_fired {
                false
            } else {
                run_state.completion_fired = true;
                true
            }
        };
        if fire {
            self.emit(SpiderEvent::Complete { successful: false });
        }
    }
}

fn spawn_duration_watchdog(core: Arc<SpiderCore>, cap: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if core.is_stopped() {
                break;
            }
            let expired = {
                core.run_state
                    .lock()
                    .start_time
                    .map(|start| start.elapsed() >= cap)
                    .unwrap_or(false)
            };
            if expired {
                core.shutdown("maximum crawl duration reached").await;
                break;
            }
        }
    });
}

/// The crawl orchestrator.
pub struct Spider {
    core: Arc<SpiderCore>,
    controller: Arc<Controller>,
    seeds: Mutex<Vec<Url>>,
}

impl Spider {
    pub fn builder(config: SpiderConfig) -> SpiderBuilder {
        SpiderBuilder::new(config)
    }

    /// Registers a URI as crawl origin, widening the scope to its host and
    /// synthesizing the derived seeds the configuration asks for.
    pub fn add_seed(&self, uri: Url) -> Result<(), SpiderError> {
        if !matches!(uri.scheme(), "http" | "https") {
            return Err(SpiderError::InvalidSeed {
                uri: uri.to_string(),
                reason: format!("unsupported scheme `{}`", uri.scheme()),
            });
        }
        self.core.scope.write().widen(&uri);

        let derived = derived_seeds(&uri, &self.core.config);
        let mut seeds = self.seeds.lock();
        for candidate in std::iter::once(uri).chain(derived) {
            if !seeds.iter().any(|existing| existing == &candidate) {
                debug!(seed = %candidate, "registered seed");
                seeds.push(candidate);
            }
        }
        Ok(())
    }

    /// The registered seed set, in registration order.
    pub fn seeds(&self) -> Vec<Url> {
        self.seeds.lock().clone()
    }

    pub fn controller(&self) -> Arc<Controller> {
        Arc::clone(&self.controller)
    }

    /// A receiver for all crawl events.
    pub fn subscribe(&self) -> broadcast::Receiver<SpiderEvent> {
        self.core.subscribe()
    }

    /// Bridges a listener onto the event bus.
    pub fn attach_listener(
        &self,
        listener: Arc<dyn SpiderListener>,
    ) -> tokio::task::JoinHandle<()> {
        self.controller_bus().attach_listener(listener)
    }

    fn controller_bus(&self) -> &EventBus {
        &self.core.bus
    }

    /// Starts the crawl: filters the seed set, submits one task per
    /// surviving seed, and only then marks the run initialized. All
    /// failures past this point are observable exclusively through the
    /// listener contract.
    pub async fn start(&self) {
        {
            self.core.run_state.lock().start_time = Some(Instant::now());
        }
        if let Some(cap) = self.core.config.max_duration() {
            spawn_duration_watchdog(Arc::clone(&self.core), cap);
        }

        let seeds = self.seeds();
        info!(seed_count = seeds.len(), "starting crawl");

        let mut surviving = Vec::new();
        for uri in seeds {
            let descriptor = ResourceDescriptor::seed(uri);
            match self.controller.check_fetch_filters(&descriptor) {
                FetchCheck::Valid => surviving.push(descriptor),
                FetchCheck::Rejected(reason) => {
                    debug!(uri = %descriptor.uri, %reason, "seed rejected by fetch filter");
                    self.core
                        .emit_found(&descriptor, FoundStatus::Skipped(reason));
                }
            }
        }

        if surviving.is_empty() {
            warn!("no valid seed to crawl, signalling unsuccessful completion");
            self.core.complete_empty();
            return;
        }

        for descriptor in surviving {
            self.controller.add_seed(descriptor).await;
        }
        {
            self.core.run_state.lock().initialized = true;
        }
        // Every seed task may already have finished; the post-execution
        // hook could not fire completion while `initialized` was false.
        self.core.complete_if_drained();
    }

    /// Idempotent cooperative stop; resolves once remaining tasks have
    /// drained or been force-cancelled.
    pub async fn stop(&self) {
        self.core.shutdown("stop requested").await;
    }

    pub fn pause(&self) {
        self.core.pause();
    }

    pub fn resume(&self) {
        self.core.resume();
    }

    /// Pure status query.
    pub fn is_stopped(&self) -> bool {
        self.core.is_stopped()
    }

    pub fn is_paused(&self) -> bool {
        self.core.is_paused()
    }
}

/// Assembles a [`Spider`] from its configuration and collaborators.
///
/// Built-in fetch filters (scope, skip pattern, child limit) run before any
/// caller-supplied filter. Custom parsers are inserted at the front of the
/// parser list: the parser added last has the highest priority.
pub struct SpiderBuilder {
    config: SpiderConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn PendingStore>>,
    fetch_filters: Vec<Box<dyn FetchFilter>>,
    parse_filters: Vec<Box<dyn ParseFilter>>,
    parsers: Vec<Arc<dyn ResourceParser>>,
}

impl SpiderBuilder {
    pub fn new(config: SpiderConfig) -> Self {
        SpiderBuilder {
            config,
            transport: None,
            store: None,
            fetch_filters: Vec::new(),
            parse_filters: Vec::new(),
            parsers: Vec::new(),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn PendingStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn add_fetch_filter<F>(mut self, filter: F) -> Self
    where
        F: FetchFilter + 'static,
    {
        self.fetch_filters.push(Box::new(filter));
        self
    }

    pub fn add_parse_filter<F>(mut self, filter: F) -> Self
    where
        F: ParseFilter + 'static,
    {
        self.parse_filters.push(Box::new(filter));
        self
    }

    /// Registers a parser at the front of the parser list.
    pub fn add_parser<P>(mut self, parser: P) -> Self
    where
        P: ResourceParser + 'static,
    {
        self.parsers.insert(0, Arc::new(parser));
        self
    }

    pub fn build(self) -> Result<Spider, SpiderError> {
        self.config.validate()?;
        let transport = self.transport.ok_or_else(|| {
            SpiderError::Configuration("a transport collaborator is required".to_string())
        })?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryPendingStore::new()) as Arc<dyn PendingStore>);

        let scope = Arc::new(RwLock::new(SpiderScope::new()));
        let mut fetch_filters: Vec<Box<dyn FetchFilter>> =
            vec![Box::new(ScopeFetchFilter::new(Arc::clone(&scope)))];
        if let Some(pattern) = self.config.compiled_skip_pattern()? {
            fetch_filters.push(Box::new(SkipPatternFilter::new(pattern)));
        }
        if self.config.max_children > 0 {
            fetch_filters.push(Box::new(ChildLimitFilter::new(self.config.max_children)));
        }
        fetch_filters.extend(self.fetch_filters);

        let core = Arc::new(SpiderCore::new(self.config, scope, transport, store));
        let controller = Controller::new(Arc::clone(&core), fetch_filters, self.parse_filters, self.parsers);

        Ok(Spider {
            core,
            controller,
            seeds: Mutex::new(Vec::new()),
        })
    }
}
