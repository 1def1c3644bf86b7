use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SquidError;
use crate::keeper::{ContractEvent, EventFilter, EventStream, Ledger};

/// Creates [`Subscription`]s against a shared ledger.
#[derive(Clone)]
pub struct EventListener {
    ledger: Arc<dyn Ledger>,
}

impl EventListener {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Registers interest in `contract.event` matching `filter`.
    ///
    /// Only events emitted after this call returns are observed.
    pub async fn subscribe(
        &self,
        contract: &str,
        event: &str,
        filter: EventFilter,
    ) -> Result<Subscription, SquidError> {
        let stream = self
            .ledger
            .subscribe(contract, event, &filter)
            .await
            .map_err(|e| SquidError::SubscriptionTransport {
                contract: contract.to_string(),
                event: event.to_string(),
                reason: e.to_string(),
            })?;

        debug!(contract, event, filtered = !filter.is_empty(), "subscribed");
        Ok(Subscription {
            contract: contract.to_string(),
            event: event.to_string(),
            filter,
            stream,
        })
    }
}

/// A single-use subscription.
///
/// Consuming methods resolve at most once; the underlying stream is dropped
/// when they return or when the subscription itself is dropped.
pub struct Subscription {
    contract: String,
    event: String,
    filter: EventFilter,
    stream: EventStream,
}

impl Subscription {
    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    fn is_match(&self, ev: &ContractEvent) -> bool {
        ev.contract == self.contract && ev.name == self.event && self.filter.matches(ev)
    }

    fn transport_error(&self, reason: impl Into<String>) -> SquidError {
        SquidError::SubscriptionTransport {
            contract: self.contract.clone(),
            event: self.event.clone(),
            reason: reason.into(),
        }
    }

    /// Waits for the first matching event.
    pub async fn once(mut self) -> Result<ContractEvent, SquidError> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(ev) if self.is_match(&ev) => {
                    return Ok(ev);
                }
                Ok(ev) => {
                    debug!(
                        contract = %ev.contract,
                        event = %ev.name,
                        block = ev.block_number,
                        "ignoring non-matching event"
                    );
                }
                Err(e) => {
                    warn!(
                        contract = %self.contract,
                        event = %self.event,
                        error = %e,
                        "subscription failed"
                    );
                    return Err(self.transport_error(e.to_string()));
                }
            }
        }
        Err(self.transport_error("event stream closed"))
    }

    /// Like [`Subscription::once`], bounded by `timeout` when given.
    pub async fn once_within(self, timeout: Option<Duration>) -> Result<ContractEvent, SquidError> {
        let Some(waited) = timeout else {
            return self.once().await;
        };
        let what = format!("{}.{}", self.contract, self.event);
        match tokio::time::timeout(waited, self.once()).await {
            Ok(result) => result,
            Err(_) => Err(SquidError::Timeout { waited, what }),
        }
    }

    /// Spawns a task that waits for the event and hands the outcome to
    /// `handler`, exactly once.
    pub fn listen_once<F, Fut>(
        self,
        timeout: Option<Duration>,
        handler: F,
    ) -> ListenerHandle<Fut::Output>
    where
        F: FnOnce(Result<ContractEvent, SquidError>) -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let task = tokio::spawn(async move {
            let outcome = self.once_within(timeout).await;
            handler(outcome).await
        });
        ListenerHandle { task }
    }
}

/// Handle to a spawned [`Subscription::listen_once`] task.
pub struct ListenerHandle<T> {
    task: JoinHandle<T>,
}

impl<T> ListenerHandle<T> {
    /// Stops waiting. The handler will not run if it has not started.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the handler's result.
    pub async fn join(self) -> Result<T, SquidError> {
        match self.task.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_cancelled() => Err(SquidError::Cancelled),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}
