//! Bounded decode executor.
//!
//! Page rendering and image decoding run on separate bounded pools so a
//! burst of image work cannot starve interactive layout; callers build
//! one [`DecodePool`] per concern. Submission is fire-and-forget: a
//! saturated or shut-down pool logs and drops the job, because a missed
//! decode just leaves a blank image area. In-flight jobs are never
//! cancelled; shutdown only stops new submissions.

use crate::error::{RasterError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::warn;

/// A bounded fire-and-forget worker pool.
pub struct DecodePool {
    pool: rayon::ThreadPool,
    inflight: Arc<AtomicUsize>,
    capacity: usize,
    shutdown: Arc<AtomicBool>,
}

impl DecodePool {
    /// Build a pool with `threads` workers accepting at most `capacity`
    /// queued-or-running jobs.
    pub fn new(threads: usize, capacity: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map_err(|e| RasterError::Executor(e.to_string()))?;
        Ok(Self {
            pool,
            inflight: Arc::new(AtomicUsize::new(0)),
            capacity: capacity.max(1),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Submit a job. Returns whether the job was accepted; rejections
    /// (shutdown or overload) are logged and never retried.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown.load(Ordering::Acquire) {
            warn!("decode pool is shut down; dropping job");
            return false;
        }
        if self.inflight.load(Ordering::Acquire) >= self.capacity {
            warn!(capacity = self.capacity, "decode pool saturated; dropping job");
            return false;
        }
        self.inflight.fetch_add(1, Ordering::AcqRel);
        let inflight = Arc::clone(&self.inflight);
        self.pool.spawn(move || {
            job();
            inflight.fetch_sub(1, Ordering::AcqRel);
        });
        true
    }

    /// Stop accepting new jobs. Running jobs finish; nothing is aborted.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Jobs currently queued or running.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }
}
