//! # Task Module
//!
//! One unit of crawl work: fetch a resource, resolve its staged pending
//! entry, decide whether the response is parseable, and hand it to the
//! parser pipeline. Every exit path reports a task result (except a stop
//! observed before the fetch, where nothing happened yet) and runs the
//! post-execution hook exactly once.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::controller::Controller;
use crate::listener::{SpiderEvent, TaskOutcome, TaskResult};
use crate::resource::{FetchedMessage, ResourceDescriptor, ResponseData};
use crate::spider::SpiderCore;
use crate::store::PendingHandle;
use crate::transport::failure_response;

pub(crate) struct SpiderTask {
    core: Arc<SpiderCore>,
    controller: Arc<Controller>,
    resource: ResourceDescriptor,
    pending: Option<PendingHandle>,
}

impl SpiderTask {
    pub(crate) fn new(
        core: Arc<SpiderCore>,
        controller: Arc<Controller>,
        resource: ResourceDescriptor,
        pending: PendingHandle,
    ) -> Self {
        SpiderTask {
            core,
            controller,
            resource,
            pending: Some(pending),
        }
    }

    pub(crate) async fn run(mut self) {
        self.core.wait_while_paused().await;
        if self.core.is_stopped() {
            trace!(uri = %self.resource.uri, "crawl stopped before fetch, skipping task");
            self.finish();
            return;
        }

        let delay = self.core.config.request_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        debug!(
            method = %self.resource.method,
            uri = %self.resource.uri,
            depth = self.resource.depth,
            "fetching resource"
        );
        let response = match self.core.transport.send_and_receive(&self.resource).await {
            Ok(response) => response,
            Err(error) => {
                warn!(uri = %self.resource.uri, %error, "fetch failed");
                let message = self.seal(failure_response(&error));
                self.report(message, TaskOutcome::NotProcessed(format!("fetch failed: {error}")));
                self.finish();
                return;
            }
        };
        let message = self.seal(response);

        // The crawl state may have changed while the request was on the wire.
        self.core.wait_while_paused().await;
        if self.core.is_stopped() {
            self.report(message, TaskOutcome::NotProcessed("crawl stopped".to_string()));
            self.finish();
            return;
        }

        if let Some(reason) = self.controller.parse_decision(&message) {
            debug!(uri = %message.request.uri, reason, "response not parsed");
            self.report(message, TaskOutcome::NotProcessed(reason));
            self.finish();
            return;
        }

        if self.core.config.depth_exceeded(self.resource.depth) {
            self.report(
                message,
                TaskOutcome::NotProcessed("maximum depth reached".to_string()),
            );
        } else {
            self.report(Arc::clone(&message), TaskOutcome::Processed);
            self.controller.parse_message(&message).await;
        }
        self.finish();
    }

    /// Resolves the staged pending entry and freezes the fetched message.
    fn seal(&mut self, response: ResponseData) -> Arc<FetchedMessage> {
        if let Some(pending) = self.pending.take() {
            pending.complete(&response);
        }
        Arc::new(FetchedMessage::new(self.resource.clone(), response))
    }

    fn report(&self, message: Arc<FetchedMessage>, outcome: TaskOutcome) {
        self.core
            .emit(SpiderEvent::TaskResult(TaskResult { message, outcome }));
    }

    /// Releases a still-staged pending entry and runs the post-execution
    /// hook. Must be the last thing a task does, on every path.
    fn finish(mut self) {
        self.pending.take();
        self.core.post_task_execution();
    }
}
