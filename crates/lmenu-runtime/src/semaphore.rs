#![forbid(unsafe_code)]

//! Counting semaphore with FIFO waiters and reactive occupancy.
//!
//! [`Semaphore`] hands out up to `capacity` permits. Callers beyond that are
//! queued and served strictly in arrival order. Each grant comes with a
//! [`Release`] handle; releasing it (or dropping its last clone) returns the
//! permit and wakes the longest waiter.
//!
//! Occupancy is mirrored into a reactive field so that UI code can read
//! [`Semaphore::is_locked`] through a [`Hook`] and be invalidated when the
//! semaphore frees up or fills.
//!
//! # Invariants
//!
//! 1. Permits granted minus permits released never exceeds `capacity`.
//! 2. A [`Release`] returns its permit at most once, however often it is
//!    called or cloned.
//! 3. Waiters are granted permits in the order their `acquire` was first
//!    polled.
//! 4. [`Semaphore::available`] matches the free permit count whenever no
//!    call is in progress, including after a queued `acquire` is dropped.
//!
//! # Failure Modes
//!
//! - **Stuck holder**: there are no timeouts. A holder that never releases
//!   blocks every waiter; guard against runaway work at a higher layer.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use lmenu_reactive::{Field, Hook};
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

use crate::error::{SemaphoreError, SemaphoreResult};

struct SemaphoreInner {
    permits: Arc<tokio::sync::Semaphore>,
    capacity: usize,
    available: Field<usize>,
    /// Outstanding grant of a capacity-1 semaphore, for [`Semaphore::release`].
    ambient: RefCell<Weak<ReleaseInner>>,
}

impl SemaphoreInner {
    fn sync_available(&self) {
        self.available.set(self.permits.available_permits());
    }
}

/// Re-reads the free permit count when dropped.
///
/// A waiter cancelled after being handed a permit gives it back to the pool
/// without passing through [`Release`].
struct Resync<'a>(&'a SemaphoreInner);

impl Drop for Resync<'_> {
    fn drop(&mut self) {
        self.0.sync_available();
    }
}

/// FIFO counting semaphore for single-threaded async code.
///
/// Cloning yields another handle to the same permits.
#[derive(Clone)]
pub struct Semaphore {
    inner: Rc<SemaphoreInner>,
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("capacity", &self.inner.capacity)
            .field("available", &self.inner.permits.available_permits())
            .field("closed", &self.inner.permits.is_closed())
            .finish()
    }
}

impl Semaphore {
    /// Create a semaphore with `capacity` permits.
    ///
    /// # Errors
    ///
    /// [`SemaphoreError::InvalidCapacity`] when `capacity` is zero or larger
    /// than the underlying implementation supports.
    pub fn new(capacity: usize) -> SemaphoreResult<Self> {
        if capacity == 0 || capacity > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(SemaphoreError::InvalidCapacity { capacity });
        }
        Ok(Self::with_capacity(capacity))
    }

    /// Capacity-1 semaphore, i.e. an async mutex without data.
    #[must_use]
    pub fn mutex() -> Self {
        Self::with_capacity(1)
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Rc::new(SemaphoreInner {
                permits: Arc::new(tokio::sync::Semaphore::new(capacity)),
                capacity,
                available: Field::new(capacity),
                ambient: RefCell::new(Weak::new()),
            }),
        }
    }

    /// Wait for a permit.
    ///
    /// Resolves to the number of permits still available right after the
    /// grant, and the handle that returns the permit.
    ///
    /// # Errors
    ///
    /// [`SemaphoreError::Closed`] if the semaphore is closed before a permit
    /// is granted.
    pub async fn acquire(&self) -> SemaphoreResult<(usize, Release)> {
        if self.inner.permits.available_permits() == 0 {
            debug!(capacity = self.inner.capacity, "semaphore saturated; queueing");
        }
        let _resync = Resync(&self.inner);
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| SemaphoreError::Closed)?;
        Ok(self.grant(permit))
    }

    /// Take a permit if one is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<(usize, Release)> {
        let permit = Arc::clone(&self.inner.permits).try_acquire_owned().ok()?;
        Some(self.grant(permit))
    }

    fn grant(&self, permit: OwnedSemaphorePermit) -> (usize, Release) {
        let remaining = self.inner.permits.available_permits();
        self.inner.sync_available();
        debug!(remaining, capacity = self.inner.capacity, "permit granted");

        let release = Release {
            inner: Rc::new(ReleaseInner {
                permit: RefCell::new(Some(permit)),
                owner: Rc::downgrade(&self.inner),
            }),
        };
        if self.inner.capacity == 1 {
            *self.inner.ambient.borrow_mut() = Rc::downgrade(&release.inner);
        }
        (remaining, release)
    }

    /// Run `task` while holding a permit.
    ///
    /// The permit is returned when the task completes, and also when the
    /// returned future is dropped early or the task panics.
    ///
    /// # Errors
    ///
    /// [`SemaphoreError::Closed`] if no permit could be acquired.
    pub async fn run_exclusive<T, Fut>(&self, task: impl FnOnce() -> Fut) -> SemaphoreResult<T>
    where
        Fut: Future<Output = T>,
    {
        let (_, release) = self.acquire().await?;
        let output = task().await;
        release.release();
        Ok(output)
    }

    /// Return the permit of a capacity-1 semaphore.
    ///
    /// A no-op when the permit is not held.
    ///
    /// # Errors
    ///
    /// [`SemaphoreError::AmbiguousRelease`] for larger capacities, where the
    /// handle returned by [`acquire`](Self::acquire) must be used instead.
    pub fn release(&self) -> SemaphoreResult<()> {
        if self.inner.capacity != 1 {
            return Err(SemaphoreError::AmbiguousRelease {
                capacity: self.inner.capacity,
            });
        }
        let held = std::mem::take(&mut *self.inner.ambient.borrow_mut());
        if let Some(inner) = held.upgrade() {
            inner.release();
        }
        Ok(())
    }

    /// Whether no permit is currently available.
    #[must_use]
    pub fn is_locked(&self, hook: Option<&Hook>) -> bool {
        self.inner.available.get(hook) == 0
    }

    /// Number of permits currently available.
    #[must_use]
    pub fn available(&self, hook: Option<&Hook>) -> usize {
        self.inner.available.get(hook)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Fail all pending and future acquisitions.
    pub fn close(&self) {
        debug!(capacity = self.inner.capacity, "semaphore closed");
        self.inner.permits.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }
}

struct ReleaseInner {
    permit: RefCell<Option<OwnedSemaphorePermit>>,
    owner: Weak<SemaphoreInner>,
}

impl ReleaseInner {
    fn release(&self) {
        let Some(permit) = self.permit.borrow_mut().take() else {
            return;
        };
        drop(permit);
        if let Some(owner) = self.owner.upgrade() {
            owner.sync_available();
            debug!(
                available = owner.permits.available_permits(),
                "permit released"
            );
        }
    }
}

impl Drop for ReleaseInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handle returning one permit to its semaphore.
///
/// Idempotent: only the first [`release`](Self::release) has an effect.
/// Dropping the last clone of an unreleased handle releases it.
#[derive(Clone)]
pub struct Release {
    inner: Rc<ReleaseInner>,
}

impl Release {
    /// Return the permit, waking the next waiter if any.
    pub fn release(&self) {
        self.inner.release();
    }

    /// Whether the permit has been returned.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.permit.borrow().is_none()
    }
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("released", &self.is_released())
            .finish()
    }
}
