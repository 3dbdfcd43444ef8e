//! # Deadlines
//!
//! Cooperative cancellation for commits, destroys and query enumeration.
//! A `Deadline` combines an optional expiry instant with a manual cancel
//! flag; clones share the flag, so any thread holding a clone can cancel.

use crate::types::{LodestoreError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Expiry and/or manual cancellation shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// A deadline that never expires on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A deadline that expires `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel every holder of this deadline.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// `Err(Cancelled)` once the deadline has passed or been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(LodestoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Check an optional deadline.
pub(crate) fn check(deadline: Option<&Deadline>) -> Result<()> {
    deadline.map_or(Ok(()), Deadline::check)
}
