//! Scheduler (C5): a persistent worker pool that fans block jobs out and
//! collects per-block results, with first-failure cancellation.
//!
//! Job dispatch is a `crossbeam-channel` job queue; results come back on a
//! per-call channel so multiple outstanding calls never cross streams. With
//! `nthreads <= 1` the pool is torn down and every job runs inline on the
//! caller's thread (§4.5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Mode {
    Inline,
    Pooled {
        tx: Sender<Job>,
        handles: Vec<JoinHandle<()>>,
    },
}

/// Owns the persistent thread pool used by one [`crate::context::Context`].
pub struct Scheduler {
    mode: Mode,
    nthreads: usize,
}

impl Scheduler {
    /// Builds a pool of `nthreads` workers, falling back to single-threaded
    /// inline execution (and logging a `tracing::warn!`) if the OS refuses
    /// to spawn the requested threads (§7 `ResourceExhausted`). Use
    /// [`Scheduler::try_new`] to observe that failure instead of degrading.
    pub fn new(nthreads: usize) -> Scheduler {
        let nthreads = nthreads.max(1);
        if nthreads == 1 {
            return Scheduler {
                mode: Mode::Inline,
                nthreads,
            };
        }
        match Mode::spawn(nthreads) {
            Ok(mode) => Scheduler { mode, nthreads },
            Err(e) => {
                warn!(
                    requested = nthreads,
                    error = %e,
                    "could not spawn worker pool, falling back to single-threaded execution"
                );
                Scheduler {
                    mode: Mode::Inline,
                    nthreads: 1,
                }
            }
        }
    }

    /// Like [`Scheduler::new`] but returns `Err(Error::ResourceExhausted)`
    /// instead of silently degrading when the pool can't be spawned.
    pub fn try_new(nthreads: usize) -> Result<Scheduler> {
        let nthreads = nthreads.max(1);
        if nthreads == 1 {
            return Ok(Scheduler {
                mode: Mode::Inline,
                nthreads,
            });
        }
        Ok(Scheduler {
            mode: Mode::spawn(nthreads)?,
            nthreads,
        })
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads
    }

    /// `set_nthreads`: tears down the existing pool and spins up a new one,
    /// returning the previous thread count.
    pub fn set_nthreads(&mut self, n: usize) -> usize {
        let previous = self.nthreads;
        let n = n.max(1);
        *self = Scheduler::new(n);
        debug!(previous, new = n, "resized thread pool");
        previous
    }

    /// Runs `nblocks` independent jobs, each producing `Result<(usize,
    /// Vec<u8>)>` keyed by its block index. On the first error, already
    /// dispatched jobs are allowed to finish but their outputs are
    /// discarded, no further jobs are dispatched, and this call returns
    /// that error (§4.5 cancellation).
    pub fn run_blocks<F>(&self, nblocks: usize, make_job: F) -> Result<Vec<Vec<u8>>>
    where
        F: Fn(usize) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        if nblocks == 0 {
            return Ok(Vec::new());
        }
        let make_job = Arc::new(make_job);
        let abort = Arc::new(AtomicBool::new(false));

        match &self.mode {
            Mode::Inline => {
                let mut out = Vec::with_capacity(nblocks);
                for i in 0..nblocks {
                    match make_job(i) {
                        Ok(bytes) => out.push(bytes),
                        Err(e) => {
                            warn!(block = i, error = %e, "block failed, cancelling call");
                            return Err(e);
                        }
                    }
                }
                Ok(out)
            }
            Mode::Pooled { tx, .. } => {
                let (result_tx, result_rx): (Sender<(usize, Result<Vec<u8>>)>, Receiver<_>) =
                    unbounded();
                for i in 0..nblocks {
                    let make_job = Arc::clone(&make_job);
                    let abort = Arc::clone(&abort);
                    let result_tx = result_tx.clone();
                    let job: Job = Box::new(move || {
                        if abort.load(Ordering::Acquire) {
                            return;
                        }
                        let result = make_job(i);
                        let _ = result_tx.send((i, result));
                    });
                    if tx.send(job).is_err() {
                        return Err(Error::ResourceExhausted(
                            "scheduler job queue is closed".into(),
                        ));
                    }
                }
                drop(result_tx);

                let mut slots: Vec<Option<Vec<u8>>> = (0..nblocks).map(|_| None).collect();
                let mut received = 0;
                let mut first_error: Option<Error> = None;
                while received < nblocks {
                    let (i, result) = match result_rx.recv() {
                        Ok(v) => v,
                        Err(_) => break, // all senders dropped without finishing
                    };
                    received += 1;
                    match result {
                        Ok(bytes) => slots[i] = Some(bytes),
                        Err(e) => {
                            if first_error.is_none() {
                                warn!(block = i, error = %e, "block failed, cancelling call");
                                abort.store(true, Ordering::Release);
                                first_error = Some(e);
                            }
                        }
                    }
                }
                if let Some(e) = first_error {
                    return Err(e);
                }
                slots
                    .into_iter()
                    .enumerate()
                    .map(|(i, slot)| {
                        slot.ok_or_else(|| {
                            Error::CorruptInput(format!("block {i} never completed"))
                        })
                    })
                    .collect()
            }
        }
    }
}

impl Mode {
    fn spawn(nthreads: usize) -> Result<Mode> {
        let (tx, rx): (Sender<Job>, Receiver<Job>) = unbounded();
        let mut handles = Vec::with_capacity(nthreads);
        for tid in 0..nthreads {
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("blosc-worker-{tid}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
                .map_err(|e| {
                    Error::ResourceExhausted(format!("failed to spawn worker thread {tid}: {e}"))
                })?;
            handles.push(handle);
        }
        Ok(Mode::Pooled { tx, handles })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Mode::Pooled { tx, handles } = &mut self.mode {
            // Dropping the sender closes the channel; workers exit their
            // recv loop and we join them so the pool is fully torn down.
            let handles = std::mem::take(handles);
            drop(std::mem::replace(tx, unbounded().0));
            for h in handles {
                let _ = h.join();
            }
        }
    }
}

/// Picks a thread count within `[1, available_parallelism]` the way the
/// global API's default does when the caller doesn't specify one.
pub fn default_nthreads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
