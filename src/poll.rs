//! Background feed polling.
//!
//! [`follow`] spawns one task per connection that drives a [`Source`] and
//! sends results to the consumer over a bounded [`mpsc`] channel.
//!
//! ## Lifecycle
//!
//! ```text
//! Initializing ──prepare() ok──► Running ──cancel / receiver gone──► Closed
//!      │                                                               ▲
//!      └──prepare() failed: send one error ────────────────────────────┘
//! ```
//!
//! While running, the task fetches once immediately and then on every tick
//! of a fixed interval. Each fetch is bounded by its own timeout so a stuck
//! request cannot hold up the loop. A failed fetch becomes one error result
//! and polling carries on.
//!
//! Every wait (timer, fetch, channel send) also watches the
//! [`CancellationToken`]. Once it fires the task stops without sending
//! anything else and drops the sender, which closes the channel. A full
//! channel blocks the task rather than dropping results.
//!
//! A source's cursor must only ever have one writer. [`Exclusive`] admits
//! one running task per source; a second connection made while the first
//! is still running gets a single [`FetchError::AlreadyConnected`] error.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FetchError, FollowError, Phase};
use crate::source::Source;

/// What the consumer receives: one item or one error per message.
pub type FollowResult<T> = Result<T, FollowError>;

/// Receiving half of a follower connection. Closed when the follower stops.
pub type FollowReceiver<T> = mpsc::Receiver<FollowResult<T>>;

/// Timing and buffering for a poll task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time between fetches.
    pub polling_interval: Duration,
    /// Upper bound on one fetch, including the cold start request.
    pub fetch_timeout: Duration,
    /// Capacity of the result channel.
    pub channel_size: usize,
}

/// Spawn the poll task for `source`.
///
/// Returns immediately with the receiver; the task runs until `cancel`
/// fires or the receiver is dropped. Must be called from within a tokio
/// runtime. Nothing stops two tasks sharing `source`; see [`Exclusive`].
pub fn follow<S: Source>(
    source: Arc<S>,
    schedule: Schedule,
    cancel: CancellationToken,
) -> FollowReceiver<S::Item> {
    spawn(source, schedule, cancel, None)
}

/// Admits at most one running poll task at a time.
#[derive(Debug, Default)]
pub struct Exclusive {
    running: Arc<AtomicBool>,
}

impl Exclusive {
    /// Like [`follow`], unless a task started here is still running, in
    /// which case the receiver yields one `Connect` error and closes.
    pub fn follow<S: Source>(
        &self,
        source: Arc<S>,
        schedule: Schedule,
        cancel: CancellationToken,
    ) -> FollowReceiver<S::Item> {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!(feed = S::FEED, "rejecting second connection while one is running");
            let (tx, rx) = mpsc::channel(1);
            let err = FollowError::new(Phase::Connect, source.position(), FetchError::AlreadyConnected);
            let _ = tx.try_send(Err(err));
            return rx;
        }
        spawn(source, schedule, cancel, Some(Running(self.running.clone())))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Clears the [`Exclusive`] flag when the task ends.
struct Running(Arc<AtomicBool>);

impl Drop for Running {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn spawn<S: Source>(
    source: Arc<S>,
    schedule: Schedule,
    cancel: CancellationToken,
    running: Option<Running>,
) -> FollowReceiver<S::Item> {
    let (tx, rx) = mpsc::channel(schedule.channel_size);
    tokio::spawn(async move {
        run(source, schedule, &tx, cancel).await;
        // release before the channel closes, so a consumer that saw the
        // close can reconnect straight away
        drop(running);
        drop(tx);
    });
    rx
}

async fn run<S: Source>(
    source: Arc<S>,
    schedule: Schedule,
    tx: &mpsc::Sender<FollowResult<S::Item>>,
    cancel: CancellationToken,
) {
    match bounded(&cancel, schedule.fetch_timeout, source.prepare()).await {
        None => return,
        Some(Err(e)) => {
            let err = FollowError::new(Phase::ColdStart, source.position(), e);
            warn!(feed = S::FEED, error = %err, "follower could not start");
            let _ = offer(tx, Err(err), &cancel).await;
            return;
        }
        Some(Ok(())) => {}
    }

    let period = schedule.polling_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if poll_once(&*source, &schedule, tx, &cancel).await.is_continue() {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tx.closed() => break,
                _ = ticker.tick() => {
                    if poll_once(&*source, &schedule, tx, &cancel).await.is_break() {
                        break;
                    }
                }
            }
        }
    }
    debug!(feed = S::FEED, position = %source.position(), "follower stopped");
}

/// One fetch and the delivery of its results.
async fn poll_once<S: Source>(
    source: &S,
    schedule: &Schedule,
    tx: &mpsc::Sender<FollowResult<S::Item>>,
    cancel: &CancellationToken,
) -> ControlFlow<()> {
    let position = source.position();
    counter!("npm_follower_fetches_total", "feed" => S::FEED).increment(1);

    match bounded(cancel, schedule.fetch_timeout, source.fetch()).await {
        None => ControlFlow::Break(()),
        Some(Ok(items)) => {
            counter!("npm_follower_items_total", "feed" => S::FEED).increment(items.len() as u64);
            for item in items {
                if offer(tx, Ok(item), cancel).await.is_break() {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        }
        Some(Err(e)) => {
            counter!("npm_follower_fetch_errors_total", "feed" => S::FEED).increment(1);
            let err = FollowError::new(S::PHASE, position, e);
            warn!(feed = S::FEED, error = %err, "fetch failed");
            offer(tx, Err(err), cancel).await
        }
    }
}

/// Run `fut` under `budget`, giving up early if cancelled (`None`).
async fn bounded<T, F>(cancel: &CancellationToken, budget: Duration, fut: F) -> Option<Result<T, FetchError>>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        res = time::timeout(budget, fut) => Some(res.unwrap_or(Err(FetchError::TimedOut(budget)))),
    }
}

/// Send one result, waiting for capacity. Breaks if cancelled first or if
/// the receiver has gone away.
async fn offer<T>(tx: &mpsc::Sender<T>, value: T, cancel: &CancellationToken) -> ControlFlow<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => ControlFlow::Break(()),
        sent = tx.send(value) => match sent {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        },
    }
}
