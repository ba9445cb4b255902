use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

// ---------------------------------------------------------------------------
// Shared counters
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PoolShared {
    name: String,
    min: usize,
    max: usize,
    idle_timeout: Duration,
    live: AtomicUsize,
    idle: AtomicUsize,
    spawned: AtomicUsize,
}

impl PoolShared {
    /// Reserve a worker slot if fewer than `max` are alive.
    fn reserve(&self) -> bool {
        let mut live = self.live.load(Ordering::SeqCst);
        loop {
            if live >= self.max {
                return false;
            }
            match self
                .live
                .compare_exchange(live, live + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => live = actual,
            }
        }
    }

    /// Give up a worker slot if more than `min` are alive.
    fn retire(&self) -> bool {
        let mut live = self.live.load(Ordering::SeqCst);
        loop {
            if live <= self.min {
                return false;
            }
            match self
                .live
                .compare_exchange(live, live - 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => live = actual,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Elastic thread pool with an unbounded FIFO queue.
///
/// Threads are started on demand when queued work outnumbers idle threads,
/// up to `max`. A thread that sits idle for `idle_timeout` exits unless only
/// `min` remain. Jobs always run to completion; dropping the pool lets the
/// queue drain and then stops every thread.
pub struct WorkerPool {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, min: usize, max: usize, idle_timeout: Duration) -> Self {
        let min = min.max(1);
        let max = max.max(min);
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            shared: Arc::new(PoolShared {
                name: name.into(),
                min,
                max,
                idle_timeout,
                live: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue `job`, starting another thread if every live one is busy.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            // Unreachable while `self.rx` is alive.
            error!(pool = %self.shared.name, "Worker queue closed, job dropped");
            return;
        }
        if self.rx.len() > self.shared.idle.load(Ordering::SeqCst) {
            spawn_worker(&self.rx, &self.shared);
        }
    }

    /// Threads currently alive.
    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Jobs waiting for a thread.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max
    }
}

fn spawn_worker(rx: &Receiver<Job>, shared: &Arc<PoolShared>) {
    if !shared.reserve() {
        return;
    }
    // Counted idle before it starts so a burst of submissions does not
    // start one thread per job.
    shared.idle.fetch_add(1, Ordering::SeqCst);
    let id = shared.spawned.fetch_add(1, Ordering::Relaxed);
    let worker_rx = rx.clone();
    let worker_shared = Arc::clone(shared);

    let result = thread::Builder::new()
        .name(format!("{}-{id}", shared.name))
        .spawn(move || worker_loop(worker_rx, worker_shared));
    match result {
        Ok(_) => debug!(
            pool = %shared.name,
            id,
            live = shared.live.load(Ordering::SeqCst),
            "Worker started"
        ),
        Err(e) => {
            shared.idle.fetch_sub(1, Ordering::SeqCst);
            shared.live.fetch_sub(1, Ordering::SeqCst);
            error!(pool = %shared.name, "Failed to spawn worker: {e}");
        }
    }
}

fn worker_loop(rx: Receiver<Job>, shared: Arc<PoolShared>) {
    loop {
        match rx.recv_timeout(shared.idle_timeout) {
            Ok(job) => {
                shared.idle.fetch_sub(1, Ordering::SeqCst);
                // A submitter may have counted this thread as idle just
                // before it took an earlier job.
                if !rx.is_empty() && shared.idle.load(Ordering::SeqCst) == 0 {
                    spawn_worker(&rx, &shared);
                }
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(pool = %shared.name, "Worker job panicked");
                }
                shared.idle.fetch_add(1, Ordering::SeqCst);
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.retire() {
                    debug!(pool = %shared.name, "Idle worker retired");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                shared.live.fetch_sub(1, Ordering::SeqCst);
                break;
            }
        }
    }
    shared.idle.fetch_sub(1, Ordering::SeqCst);
}
