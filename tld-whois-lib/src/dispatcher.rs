//! Bounded-concurrency dispatch of WHOIS queries.
//!
//! Two scheduling modes are available:
//!
//! - [`DispatchMode::PerItem`]: one task per identifier. A concurrency slot
//!   (semaphore permit) is acquired *before* the task is spawned and moves
//!   into the task, so it is released on every exit path, including panics.
//!   Only executing tasks are bounded; the total number spawned is not.
//! - [`DispatchMode::Pool`]: `min(C, N)` long-lived workers pull identifiers
//!   from a shared queue, which also bounds the number of task objects.
//!
//! Every outcome is pushed into an `mpsc` channel. The dispatcher drops its
//! own sender once everything is spawned, so the channel closes exactly when
//! the last worker finishes. That closing is the collector's completion
//! signal. In the other direction, once the collector drops its receiver no
//! further identifiers are dispatched.

use crate::protocols::WhoisClient;
use crate::types::{DispatchMode, QueryOutcome, ScanConfig};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// What the dispatcher did during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Tasks spawned (one per identifier in per-item mode, one per worker in pool mode)
    pub tasks: usize,
    /// Queries started, one per identifier
    pub started: usize,
    /// Outcomes accepted by the channel
    pub delivered: usize,
    /// Outcomes whose receiver was already gone
    pub undelivered: usize,
    /// Tasks that panicked
    pub panicked: usize,
    /// Highest number of queries observed executing at once
    pub peak_in_flight: usize,
}

/// Shared counters updated by worker tasks.
#[derive(Default)]
struct Counters {
    started: AtomicUsize,
    delivered: AtomicUsize,
    undelivered: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Counters {
    /// Mark a query as executing until the returned guard is dropped.
    fn enter(&self) -> InFlightGuard<'_> {
        self.started.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }
}

/// RAII guard that decrements the in-flight count on drop.
struct InFlightGuard<'a>(&'a Counters);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Lock-free queue handing out identifiers with their feed position.
struct WorkQueue {
    items: Vec<String>,
    cursor: AtomicUsize,
}

impl WorkQueue {
    fn new(items: Vec<String>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Option<(usize, &str)> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i).map(|item| (i, item.as_str()))
    }

    fn total(&self) -> usize {
        self.items.len()
    }
}

/// Spawns query workers under a fixed concurrency cap.
pub struct Dispatcher {
    client: Arc<WhoisClient>,
    concurrency: usize,
    mode: DispatchMode,
}

impl Dispatcher {
    /// Create a per-item dispatcher. `concurrency` is raised to at least 1.
    pub fn new(client: WhoisClient, concurrency: usize) -> Self {
        Self {
            client: Arc::new(client),
            concurrency: concurrency.max(1),
            mode: DispatchMode::PerItem,
        }
    }

    pub fn with_config(config: &ScanConfig) -> Self {
        Self::new(WhoisClient::with_config(config), config.concurrency).with_mode(config.mode)
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Query every identifier once and push each outcome into `outcomes`.
    ///
    /// Returns after all spawned work has finished. Per-identifier failures
    /// travel inside the outcomes; this never fails.
    pub async fn dispatch(
        &self,
        identifiers: Vec<String>,
        outcomes: mpsc::Sender<QueryOutcome>,
    ) -> DispatchReport {
        let counters = Arc::new(Counters::default());

        let mut tasks = match self.mode {
            DispatchMode::PerItem => self.spawn_per_item(identifiers, outcomes, &counters).await,
            DispatchMode::Pool => self.spawn_pool(identifiers, outcomes, &counters),
        };
        let spawned = tasks.len();
        let panicked = join_workers(&mut tasks).await;

        let report = DispatchReport {
            tasks: spawned,
            started: counters.started.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            undelivered: counters.undelivered.load(Ordering::Relaxed),
            panicked,
            peak_in_flight: counters.peak_in_flight.load(Ordering::SeqCst),
        };
        tracing::debug!(?report, "dispatch finished");
        report
    }

    async fn spawn_per_item(
        &self,
        identifiers: Vec<String>,
        outcomes: mpsc::Sender<QueryOutcome>,
        counters: &Arc<Counters>,
    ) -> JoinSet<()> {
        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        let total = identifiers.len();

        for (index, identifier) in identifiers.into_iter().enumerate() {
            // Blocks the loop, not the running workers, while all slots are held.
            let permit = tokio::select! {
                biased;
                _ = outcomes.closed() => {
                    tracing::warn!(
                        remaining = total - index,
                        "collector stopped listening, not dispatching remaining identifiers"
                    );
                    break;
                }
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::error!("concurrency slots closed, stopping dispatch");
                        break;
                    }
                },
            };

            let client = Arc::clone(&self.client);
            let counters = Arc::clone(counters);
            let outcomes = outcomes.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = {
                    let _in_flight = counters.enter();
                    client.resolve(&identifier, index).await
                };
                deliver(&outcomes, outcome, &counters).await;
            });
        }

        tasks
    }

    fn spawn_pool(
        &self,
        identifiers: Vec<String>,
        outcomes: mpsc::Sender<QueryOutcome>,
        counters: &Arc<Counters>,
    ) -> JoinSet<()> {
        let queue = Arc::new(WorkQueue::new(identifiers));
        let workers = self.concurrency.min(queue.total());
        let mut tasks = JoinSet::new();

        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let client = Arc::clone(&self.client);
            let counters = Arc::clone(counters);
            let outcomes = outcomes.clone();

            tasks.spawn(async move {
                while let Some((index, identifier)) = queue.next() {
                    if outcomes.is_closed() {
                        break;
                    }
                    let outcome = {
                        let _in_flight = counters.enter();
                        client.resolve(identifier, index).await
                    };
                    deliver(&outcomes, outcome, &counters).await;
                }
            });
        }

        tasks
    }
}

/// Wait for every task in `tasks`, returning how many panicked.
async fn join_workers(tasks: &mut JoinSet<()>) -> usize {
    let mut panicked = 0;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            panicked += 1;
            tracing::error!(error = %e, "query worker terminated abnormally");
        }
    }
    panicked
}

/// Forward one outcome to the collector, counting it either way.
async fn deliver(outcomes: &mpsc::Sender<QueryOutcome>, outcome: QueryOutcome, counters: &Counters) {
    if let Err(mpsc::error::SendError(outcome)) = outcomes.send(outcome).await {
        counters.undelivered.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            identifier = %outcome.identifier,
            status = %outcome.status,
            "collector stopped listening, outcome dropped"
        );
    } else {
        counters.delivered.fetch_add(1, Ordering::Relaxed);
    }
}
