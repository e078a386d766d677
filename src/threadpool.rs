//! Bounded-submission worker pool for block compression jobs.
//!
//! Backed by a `rayon::ThreadPool`, with a `crossbeam_channel::bounded`
//! token channel acting as the admission semaphore: submitters take a token
//! before posting and workers return it on completion, so at most
//! `nb_threads + queue_size` jobs are ever in flight. The compression
//! pipeline sizes the queue to its slot ring, which gives the reader natural
//! backpressure.

use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::ThreadPool as RayonPool;
use std::sync::{Arc, Condvar, Mutex};

type JobFn = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    pending: usize,
}

/// Fixed-size pool with blocking submission.
pub struct WorkerPool {
    pool: Arc<RayonPool>,
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    state: Arc<(Mutex<PoolState>, Condvar)>,
}

impl WorkerPool {
    /// Creates a pool of `nb_threads` workers admitting up to
    /// `nb_threads + queue_size` concurrent jobs. Both arguments must be ≥ 1.
    pub fn new(nb_threads: usize, queue_size: usize) -> Option<Self> {
        if nb_threads < 1 || queue_size < 1 {
            return None;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nb_threads)
            .build()
            .ok()?;

        let capacity = queue_size + nb_threads;
        let (slot_tx, slot_rx) = bounded(capacity);
        for _ in 0..capacity {
            slot_tx.send(()).ok()?;
        }

        let state = Arc::new((Mutex::new(PoolState { pending: 0 }), Condvar::new()));

        Some(WorkerPool {
            pool: Arc::new(pool),
            slot_tx,
            slot_rx,
            state,
        })
    }

    /// Submits a job, blocking while the pool is at capacity.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_boxed(Box::new(job));
    }

    fn submit_boxed(&self, job: JobFn) {
        self.slot_rx.recv().expect("worker pool slot channel closed");

        {
            let (lock, _cvar) = &*self.state;
            let mut s = lock.lock().unwrap();
            s.pending += 1;
        }

        let state = Arc::clone(&self.state);
        let slot_tx = self.slot_tx.clone();
        self.pool.spawn(move || {
            job();

            let (lock, cvar) = &*state;
            let mut s = lock.lock().unwrap();
            s.pending -= 1;
            if s.pending == 0 {
                cvar.notify_all();
            }
            drop(s);
            let _ = slot_tx.send(());
        });
    }

    /// Blocks until every submitted job has finished. The pool remains
    /// usable afterwards.
    pub fn wait_idle(&self) {
        let (lock, cvar) = &*self.state;
        let mut s = lock.lock().unwrap();
        while s.pending > 0 {
            s = cvar.wait(s).unwrap();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.wait_idle();
    }
}
