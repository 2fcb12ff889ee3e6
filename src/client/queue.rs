//! Bounded, non-blocking event queue
//!
//! Producers on any thread push into a per-process ring buffer; a single
//! worker thread drains it in batches and hands them to a [`BatchSender`].
//!
//! The buffer and its worker are bound to the pid that created them. When
//! `enqueue` observes a different pid (the process has forked) it installs a
//! fresh binding and worker for the new process and leaves the inherited
//! buffer untouched, so records buffered before the fork are only ever sent
//! by the parent.

use arc_swap::ArcSwapOption;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use super::transport::BatchSender;
use crate::model::LogRecord;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Buffered records kept before the oldest are dropped
    pub max_size: usize,
    pub batch_size: usize,
    /// Flush whatever is buffered at least this often
    pub flush_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            batch_size: 50,
            flush_interval: Duration::from_millis(500),
        }
    }
}

/// Buffer and worker state owned by one process
struct Binding {
    pid: u32,
    buffer: Mutex<VecDeque<LogRecord>>,
    wake: Notify,
    stopping: AtomicBool,
    /// Set by `shutdown`; past it the worker abandons what is left
    deadline: Mutex<Option<Instant>>,
    deadline_set: Notify,
    /// Records were dropped at the deadline instead of delivered
    abandoned: AtomicBool,
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

impl Binding {
    fn new(pid: u32, capacity: usize) -> Self {
        Self {
            pid,
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            wake: Notify::new(),
            stopping: AtomicBool::new(false),
            deadline: Mutex::new(None),
            deadline_set: Notify::new(),
            abandoned: AtomicBool::new(false),
            finished: Mutex::new(false),
            finished_cv: Condvar::new(),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<LogRecord>> {
        // A producer that panicked mid-push leaves a usable VecDeque behind
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live_for(&self, pid: u32) -> bool {
        self.pid == pid && !self.stopping.load(Ordering::Acquire)
    }

    /// Time left before delivery is abandoned; `None` until shutdown
    fn time_left(&self) -> Option<Duration> {
        let deadline = *self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
        deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn mark_finished(&self) {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.finished_cv.notify_all();
    }

    fn wait_finished(&self, grace: Duration) -> bool {
        let finished = self.finished.lock().unwrap_or_else(PoisonError::into_inner);
        let (finished, _) = self
            .finished_cv
            .wait_timeout_while(finished, grace, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
        *finished
    }
}

pub struct EventQueue {
    config: QueueConfig,
    sender: Arc<dyn BatchSender>,
    binding: ArcSwapOption<Binding>,
    closed: AtomicBool,
    dropped: Arc<AtomicU64>,
}

impl EventQueue {
    pub fn new(config: QueueConfig, sender: Arc<dyn BatchSender>) -> Self {
        let config = QueueConfig {
            max_size: config.max_size.max(1),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval.max(Duration::from_millis(1)),
        };

        Self {
            config,
            sender,
            binding: ArcSwapOption::empty(),
            closed: AtomicBool::new(false),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Ensure a worker is running for the current process
    pub fn start(&self) {
        self.closed.store(false, Ordering::Release);
        let _ = self.bind(std::process::id());
    }

    /// Buffer a record for delivery. Never blocks on I/O and never fails;
    /// when full, the oldest buffered record is discarded.
    pub fn enqueue(&self, record: LogRecord) {
        self.enqueue_for(std::process::id(), record);
    }

    fn enqueue_for(&self, pid: u32, record: LogRecord) {
        let Some(binding) = self.bind(pid) else {
            self.record_drops(1);
            return;
        };

        let (evicted, ready) = {
            let mut buffer = binding.buffer();
            let mut evicted = 0u64;
            while buffer.len() >= self.config.max_size {
                buffer.pop_front();
                evicted += 1;
            }
            buffer.push_back(record);
            (evicted, buffer.len() >= self.config.batch_size)
        };

        if evicted > 0 {
            self.record_drops(evicted);
        }
        if ready {
            binding.wake.notify_one();
        }
    }

    /// Request a final flush and wait up to `grace` for it.
    ///
    /// Returns whether the worker finished in time with nothing left
    /// buffered. Once the deadline passes the worker stops sending, and any
    /// record it has not delivered by then is dropped and counted. Calling
    /// again reports on the same worker without moving the deadline.
    pub fn shutdown(&self, grace: Duration) -> bool {
        self.closed.store(true, Ordering::Release);

        let Some(binding) = self.binding.load_full() else {
            return true;
        };
        if binding.pid != std::process::id() {
            return true;
        }

        binding
            .deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| Instant::now() + grace);
        binding.deadline_set.notify_one();
        binding.stopping.store(true, Ordering::Release);
        binding.wake.notify_one();

        let finished = binding.wait_finished(grace);
        let pending = binding.buffer().len();
        if !finished {
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                pending = pending,
                "Log queue did not drain before shutdown deadline"
            );
        }
        finished && pending == 0 && !binding.abandoned.load(Ordering::Acquire)
    }

    /// Records discarded on overflow or while closed
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records currently buffered for this process
    pub fn len(&self) -> usize {
        let pid = std::process::id();
        match self.binding.load_full() {
            Some(binding) if binding.pid == pid => binding.buffer().len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_drops(&self, count: u64) {
        count_drops(&self.dropped, count);
    }

    /// The live binding for `pid`, creating it (and its worker) if the
    /// current one belongs to another process or has been stopped.
    fn bind(&self, pid: u32) -> Option<Arc<Binding>> {
        loop {
            let current = self.binding.load_full();
            if let Some(binding) = &current {
                if binding.is_live_for(pid) {
                    return Some(binding.clone());
                }
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }

            let fresh = Arc::new(Binding::new(pid, self.config.max_size));
            let previous = self.binding.compare_and_swap(&current, Some(fresh.clone()));
            let won = match (&*previous, &current) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if !won {
                continue;
            }

            if let Some(stale) = &current {
                if stale.pid != pid {
                    tracing::debug!(
                        parent_pid = stale.pid,
                        pid = pid,
                        "Process fork detected, starting a fresh log queue worker"
                    );
                }
            }
            self.spawn_worker(&fresh);
            return Some(fresh);
        }
    }

    fn spawn_worker(&self, binding: &Arc<Binding>) {
        let worker = Worker {
            binding: binding.clone(),
            sender: self.sender.clone(),
            config: self.config.clone(),
            dropped: self.dropped.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("logdock-queue".to_string())
            .spawn(move || {
                let binding = worker.binding.clone();
                worker.run();
                binding.mark_finished();
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Failed to spawn log queue worker, records will be buffered only");
            binding.mark_finished();
        }
    }

    #[cfg(test)]
    fn enqueue_as(&self, pid: u32, record: LogRecord) {
        self.enqueue_for(pid, record);
    }
}

fn count_drops(counter: &AtomicU64, count: u64) {
    counter.fetch_add(count, Ordering::Relaxed);
    crate::metrics::record_queue_dropped(count);
}

struct Worker {
    binding: Arc<Binding>,
    sender: Arc<dyn BatchSender>,
    config: QueueConfig,
    dropped: Arc<AtomicU64>,
}

impl Worker {
    fn run(self) {
        // Built after binding, so a forked child never touches a runtime
        // inherited from its parent
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build runtime for log queue worker");
                return;
            }
        };

        runtime.block_on(self.drain_loop());
    }

    async fn drain_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        while !self.binding.stopping.load(Ordering::Acquire) {
            tokio::select! {
                _ = self.binding.wake.notified() => {
                    self.flush(false).await;
                }
                _ = ticker.tick() => {
                    self.flush(true).await;
                }
            }
        }

        self.flush(true).await;
        tracing::debug!(pid = self.binding.pid, "Log queue worker stopped");
    }

    /// Send full batches, plus the trailing partial batch when `partial` is set
    async fn flush(&self, partial: bool) {
        loop {
            let batch: Vec<LogRecord> = {
                let mut buffer = self.binding.buffer();
                if buffer.is_empty() || (!partial && buffer.len() < self.config.batch_size) {
                    return;
                }
                let n = buffer.len().min(self.config.batch_size);
                buffer.drain(..n).collect()
            };
            let records = batch.len() as u64;

            if self.binding.time_left().is_some_and(|left| left.is_zero()) {
                self.abandon(records);
                return;
            }

            // A send already in flight when shutdown starts is still cut off
            // at the deadline
            let delivered = tokio::select! {
                _ = self.sender.send(batch) => true,
                _ = self.deadline_passed() => false,
            };

            if !delivered {
                self.abandon(records);
                return;
            }
        }
    }

    async fn deadline_passed(&self) {
        loop {
            match self.binding.time_left() {
                Some(left) => {
                    tokio::time::sleep(left).await;
                    return;
                }
                None => self.binding.deadline_set.notified().await,
            }
        }
    }

    /// Drop the in-flight batch and everything still buffered
    fn abandon(&self, in_flight: u64) {
        let pending = {
            let mut buffer = self.binding.buffer();
            let pending = buffer.len() as u64;
            buffer.clear();
            pending
        };
        self.binding.abandoned.store(true, Ordering::Release);
        count_drops(&self.dropped, in_flight + pending);
        tracing::debug!(
            dropped = in_flight + pending,
            "Shutdown deadline passed, abandoning undelivered records"
        );
    }
}
