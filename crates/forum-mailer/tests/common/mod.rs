//! Shared fixtures for mailer integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use forum_mailer::{
    Dispatcher, DispatcherOptions, MailError, MailQueue, MailResult, MailTransport, OutgoingMail,
    RetryPolicy,
};
use forum_repository::InMemoryMailQueueStore;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// What the fake transport does for one call.
#[derive(Debug, Clone)]
pub enum Step {
    Accept,
    Reject(&'static str),
    Hang(Duration),
}

/// Transport that follows a per-recipient script and records every call.
/// Recipients without a script are accepted.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    delivered: Mutex<Vec<OutgoingMail>>,
    calls: Mutex<usize>,
    latency: Duration,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn script(self, recipient: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().insert(recipient.to_string(), steps.into());
        self
    }

    /// Successful deliveries.
    pub fn delivered(&self) -> Vec<OutgoingMail> {
        self.delivered.lock().clone()
    }

    /// All calls, successful or not.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<()> {
        *self.calls.lock() += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let step = self
            .scripts
            .lock()
            .get_mut(&mail.to)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Accept);

        match step {
            Step::Accept => {
                self.delivered.lock().push(mail.clone());
                Ok(())
            }
            Step::Reject(reason) => Err(MailError::Delivery(reason.to_string())),
            Step::Hang(duration) => {
                tokio::time::sleep(duration).await;
                self.delivered.lock().push(mail.clone());
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Store, queue, transport and dispatcher wired together.
pub struct Harness {
    pub store: Arc<InMemoryMailQueueStore>,
    pub queue: MailQueue,
    pub transport: Arc<FakeTransport>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new(transport: FakeTransport, policy: RetryPolicy, options: DispatcherOptions) -> Self {
        let store = Arc::new(InMemoryMailQueueStore::new());
        let transport = Arc::new(transport);
        Self {
            queue: MailQueue::new(store.clone()),
            dispatcher: Dispatcher::new(store.clone(), transport.clone(), policy, options),
            store,
            transport,
        }
    }

    /// Three attempts, retries a few milliseconds apart.
    pub fn fast_retries(transport: FakeTransport) -> Self {
        Self::new(
            transport,
            RetryPolicy::linear(3, Duration::from_millis(5)),
            DispatcherOptions::default(),
        )
    }
}

/// Sleeps past any retry scheduled by [`Harness::fast_retries`].
pub async fn wait_for_retry() {
    tokio::time::sleep(Duration::from_millis(40)).await;
}
