use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;

use crate::matching::domain::alias_index::{FuzzyMatcher, LookupError};
use crate::matching::domain::match_context::MatchContext;
use crate::matching::domain::match_logger::MatchResultLogger;
use crate::matching::domain::match_result::{MatchResult, NoMatchReason};
use crate::matching::domain::pending_item::{PendingAsrItem, PendingId};
use crate::matching::matcher_config::{ConfigError, MatcherConfig};
use crate::shared::ring_buffer::{BoundedRingBuffer, PushOutcome};
use crate::shared::text_normalizer::normalize;

/// Called on the worker thread once a deferred hypothesis has a result.
pub type ResultListener = Arc<dyn Fn(PendingId, &MatchResult) + Send + Sync>;

/// Called on the worker thread when a hypothesis exhausts its retries.
/// Receives the original text.
pub type TimeoutListener = Arc<dyn Fn(PendingId, &str) + Send + Sync>;

enum WorkerState {
    Stopped,
    Running(JoinHandle<()>),
}

enum Step {
    Idle,
    Processed,
}

enum HeavyOutcome {
    Completed(Result<MatchResult, LookupError>),
    TimedOut,
    Cancelled,
}

struct Shared {
    queue: BoundedRingBuffer<PendingAsrItem>,
    matcher: Arc<dyn FuzzyMatcher>,
    logger: Arc<dyn MatchResultLogger>,
    result_listener: Mutex<Option<ResultListener>>,
    timeout_listener: Mutex<Option<TimeoutListener>>,
    worker: Mutex<WorkerState>,
    cancelled: AtomicBool,
    match_timeout: Duration,
    poll_interval: Duration,
    max_retries: u32,
    #[cfg(test)]
    crash_next_step: AtomicBool,
}

/// Slow-path tier: a bounded queue of deferred hypotheses drained by a
/// single background worker.
///
/// The worker starts on the first enqueue and handles one item at a time.
/// Each heavy match is bounded by the configured timeout; a timed-out
/// item is re-queued up to `max_retries` times, after which a terminal
/// `NoMatch(pending_timed_out)` is logged. The result listener only fires
/// for items that actually completed.
///
/// When the queue is full the overflow policy decides: by default the
/// oldest queued item is dropped in favour of the fresh one.
pub struct PendingMatchBuffer {
    shared: Arc<Shared>,
}

impl PendingMatchBuffer {
    pub fn new(
        matcher: Arc<dyn FuzzyMatcher>,
        logger: Arc<dyn MatchResultLogger>,
        config: &MatcherConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = BoundedRingBuffer::new(config.pending_capacity, config.overflow_policy)?;

        Ok(Self {
            shared: Arc::new(Shared {
                queue,
                matcher,
                logger,
                result_listener: Mutex::new(None),
                timeout_listener: Mutex::new(None),
                worker: Mutex::new(WorkerState::Stopped),
                cancelled: AtomicBool::new(false),
                match_timeout: config.match_timeout(),
                poll_interval: config.poll_interval(),
                max_retries: config.max_retries,
                #[cfg(test)]
                crash_next_step: AtomicBool::new(false),
            }),
        })
    }

    pub fn set_result_listener(&self, listener: ResultListener) {
        *lock(&self.shared.result_listener) = Some(listener);
    }

    pub fn set_timeout_listener(&self, listener: TimeoutListener) {
        *lock(&self.shared.timeout_listener) = Some(listener);
    }

    /// Queues a hypothesis for the slow path.
    ///
    /// Returns `None` if the item was refused (full queue under the
    /// reject policy, or the buffer has been shut down).
    pub fn enqueue_pending(
        &self,
        text: &str,
        confidence: f32,
        context: Arc<MatchContext>,
        partials: Vec<String>,
    ) -> Option<PendingId> {
        if self.shared.cancelled.load(Ordering::SeqCst) {
            log::warn!("Pending buffer is shut down, dropping \"{text}\"");
            return None;
        }

        let item = PendingAsrItem::new(text, confidence, context, partials);
        let id = item.id;
        self.ensure_worker();

        match self.shared.queue.push(item) {
            PushOutcome::Added => {
                log::debug!("Queued {id} \"{text}\" (confidence {confidence:.2})");
                Some(id)
            }
            PushOutcome::Evicted(oldest) => {
                log::debug!(
                    "Queued {id} \"{text}\", pending queue full: dropped {} \"{}\"",
                    oldest.id,
                    oldest.text
                );
                Some(id)
            }
            PushOutcome::Rejected(_) => {
                log::warn!("Pending queue full, dropping \"{text}\"");
                None
            }
        }
    }

    /// Ids of items still waiting to be polled, oldest first.
    pub fn queued_ids(&self) -> Vec<PendingId> {
        self.shared
            .queue
            .to_snapshot()
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    pub fn queued_len(&self) -> usize {
        self.shared.queue.size()
    }

    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.shared.worker), WorkerState::Running(_))
    }

    /// Stops the worker and waits for it to exit. An in-flight heavy match
    /// is abandoned; queued items are discarded.
    pub fn shutdown(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        let state = std::mem::replace(&mut *lock(&self.shared.worker), WorkerState::Stopped);

        if let WorkerState::Running(handle) = state {
            if handle.thread().id() == thread::current().id() {
                // Called from a listener; the loop exits on its next check.
                return;
            }
            if handle.join().is_err() {
                log::error!("Pending match worker panicked during shutdown");
            }
        }
        self.shared.queue.clear();
    }

    fn ensure_worker(&self) {
        let mut state = lock(&self.shared.worker);
        if matches!(*state, WorkerState::Running(_)) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name("pending-match".to_string())
            .spawn(move || run_worker(shared))
        {
            Ok(handle) => *state = WorkerState::Running(handle),
            Err(e) => log::error!("Failed to start pending match worker: {e}"),
        }
    }
}

impl Drop for PendingMatchBuffer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: Arc<Shared>) {
    log::debug!("Pending match worker started");

    while !shared.cancelled.load(Ordering::SeqCst) {
        match panic::catch_unwind(AssertUnwindSafe(|| worker_step(&shared))) {
            Ok(Step::Processed) => {}
            Ok(Step::Idle) => thread::sleep(shared.poll_interval),
            Err(payload) => {
                log::error!(
                    "Pending match worker crashed with {} items queued: {}",
                    shared.queue.size(),
                    panic_message(payload.as_ref())
                );
                *lock(&shared.worker) = WorkerState::Stopped;
                return;
            }
        }
    }

    log::debug!("Pending match worker stopped");
}

fn worker_step(shared: &Shared) -> Step {
    #[cfg(test)]
    if shared.crash_next_step.swap(false, Ordering::SeqCst) {
        panic!("worker step crashed");
    }

    let Some(item) = shared.queue.poll() else {
        return Step::Idle;
    };
    process_item(shared, item);
    Step::Processed
}

fn process_item(shared: &Shared, item: PendingAsrItem) {
    let normalized = normalize(&item.text);
    if normalized.is_empty() {
        let result = MatchResult::no_match(item.text.as_str(), NoMatchReason::EmptyInput);
        handle_success(shared, &item, result);
        return;
    }

    let start = Instant::now();
    match run_heavy_match(shared, normalized, Arc::clone(&item.context)) {
        HeavyOutcome::Completed(Ok(result)) => {
            log::debug!(
                "Heavy match for {} finished in {:.1}ms",
                item.id,
                start.elapsed().as_secs_f64() * 1000.0
            );
            handle_success(shared, &item, result);
        }
        HeavyOutcome::Completed(Err(e)) => {
            log::warn!("Heavy match for \"{}\" failed: {e}", item.text);
            let result = MatchResult::no_match(item.text.as_str(), NoMatchReason::LookupFailed);
            handle_success(shared, &item, result);
        }
        HeavyOutcome::TimedOut => handle_timeout(shared, item),
        HeavyOutcome::Cancelled => {
            log::debug!("Abandoning {} \"{}\" on shutdown", item.id, item.text);
        }
    }
}

/// Runs the heavy matcher on a helper thread and waits for it until the
/// deadline. The wait is sliced by the poll interval so shutdown is seen
/// promptly. A call that misses the deadline keeps running detached and
/// its result is discarded.
fn run_heavy_match(
    shared: &Shared,
    normalized: String,
    context: Arc<MatchContext>,
) -> HeavyOutcome {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let matcher = Arc::clone(&shared.matcher);

    let spawned = thread::Builder::new()
        .name("heavy-match".to_string())
        .spawn(move || {
            let _ = tx.send(matcher.match_text(&normalized, &context));
        });
    if let Err(e) = spawned {
        return HeavyOutcome::Completed(Err(e.into()));
    }

    let deadline = Instant::now() + shared.match_timeout;
    loop {
        if shared.cancelled.load(Ordering::SeqCst) {
            return HeavyOutcome::Cancelled;
        }
        let now = Instant::now();
        if now >= deadline {
            return HeavyOutcome::TimedOut;
        }

        match rx.recv_timeout((deadline - now).min(shared.poll_interval)) {
            Ok(result) => return HeavyOutcome::Completed(result),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return HeavyOutcome::Completed(Err("heavy matcher aborted".into()));
            }
        }
    }
}

fn handle_success(shared: &Shared, item: &PendingAsrItem, result: MatchResult) {
    log::debug!(
        "Pending {} resolved as {} after {:.1}ms",
        item.id,
        result.kind(),
        item.enqueued_at.elapsed().as_secs_f64() * 1000.0
    );
    log_result(shared, item, &result);

    let listener = lock(&shared.result_listener).clone();
    if let Some(listener) = listener {
        let id = item.id;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(id, &result))) {
            log::error!(
                "Result listener failed for {id}: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

fn handle_timeout(shared: &Shared, item: PendingAsrItem) {
    if item.attempts < shared.max_retries {
        let retry = item.next_attempt();
        log::debug!(
            "Heavy match for {} timed out, retry {}/{}",
            retry.id,
            retry.attempts,
            shared.max_retries
        );
        match shared.queue.push(retry) {
            PushOutcome::Added => {}
            PushOutcome::Evicted(oldest) => {
                log::debug!("Retry displaced {} \"{}\"", oldest.id, oldest.text);
            }
            PushOutcome::Rejected(retry) => {
                log::warn!("Pending queue full, retry of \"{}\" dropped", retry.text);
            }
        }
        return;
    }

    log::debug!(
        "Heavy match for {} timed out after {} attempts",
        item.id,
        item.attempts + 1
    );
    let result = MatchResult::no_match(item.text.as_str(), NoMatchReason::PendingTimedOut);
    log_result(shared, &item, &result);

    let listener = lock(&shared.timeout_listener).clone();
    if let Some(listener) = listener {
        let id = item.id;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(id, &item.text))) {
            log::error!(
                "Timeout listener failed for {id}: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

/// Sends `result` to the result logger. A panicking logger is reported and
/// otherwise ignored.
fn log_result(shared: &Shared, item: &PendingAsrItem, result: &MatchResult) {
    let hypotheses = [(item.text.clone(), item.confidence)];
    let logged = panic::catch_unwind(AssertUnwindSafe(|| {
        shared
            .logger
            .log_match_result(&item.text, result, &item.partials, &hypotheses)
    }));
    if let Err(payload) = logged {
        log::error!(
            "Result logger failed for {}: {}",
            item.id,
            panic_message(payload.as_ref())
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
