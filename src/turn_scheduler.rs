// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Fair Turn Scheduler
//!
//! Readers-writers with strict arrival-order admission. Two tokens are
//! involved:
//!
//! - the **turn token** orders admission decisions only; every reader and
//!   writer passes through it before anything else, in FIFO order
//! - the **exclusion token** guards the resource; it is held either by the
//!   current group of readers or by a single writer
//!
//! A reader that finds a group already reading joins it. Otherwise it takes
//! the exclusion token on behalf of the group, and the last reader out hands
//! it back. A writer queued behind the turn token therefore blocks every
//! later arrival, reader or not, which is what keeps writers from starving.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio::sync::{OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore};

use crate::metrics::{MetricsAggregator, WaitSample};
use crate::{Actor, Error, Result};

const ENGINE: &str = "turn scheduler";

fn closed<E>(_: E) -> Error {
    Error::Closed { engine: ENGINE }
}

#[derive(Debug, Default)]
struct ReaderGroup {
    active: usize,
    /// Exclusion token held on behalf of every active reader
    exclusion: Option<OwnedSemaphorePermit>,
}

/// FIFO-fair readers-writers gate around a value of type `T`.
///
/// [`read`](Self::read) and [`write`](Self::write) return guards; dropping a
/// guard is the departure half of the protocol. Each admission records one
/// wait sample from the actor's arrival to its admission, and the same
/// interval as overhead since the actor was blocked throughout.
///
/// # Example
///
/// ```rust
/// use syncbench::{Actor, FairTurnScheduler, Role};
///
/// # #[tokio::main]
/// # async fn main() -> syncbench::Result<()> {
/// let books = FairTurnScheduler::new(1u32);
///
/// *books.write(&Actor::new(Role::Writer, 1)).await? += 3;
///
/// let first = books.read(&Actor::new(Role::Reader, 1)).await?;
/// let second = books.read(&Actor::new(Role::Reader, 2)).await?;
/// assert_eq!((*first, *second), (4, 4));
/// assert_eq!(books.active_readers(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FairTurnScheduler<T> {
    turn: Semaphore,
    exclusion: Arc<Semaphore>,
    readers: Mutex<ReaderGroup>,
    // Admission already serializes access; the lock only hands out the
    // matching borrow and is never contended.
    resource: RwLock<T>,
    metrics: MetricsAggregator,
}

impl<T> FairTurnScheduler<T> {
    pub fn new(resource: T) -> Self {
        Self {
            turn: Semaphore::new(1),
            exclusion: Arc::new(Semaphore::new(1)),
            readers: Mutex::new(ReaderGroup::default()),
            resource: RwLock::new(resource),
            metrics: MetricsAggregator::new(),
        }
    }

    fn lock_readers(&self) -> MutexGuard<'_, ReaderGroup> {
        self.readers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for shared access in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if [`close`](Self::close) is called before
    /// the reader's turn comes up.
    pub async fn read(&self, reader: &Actor) -> Result<ReadGuard<'_, T>> {
        let turn = self.turn.acquire().await.map_err(closed)?;

        let joined = {
            let mut group = self.lock_readers();
            if group.active > 0 {
                group.active += 1;
                true
            } else {
                false
            }
        };
        if !joined {
            // The group is empty and cannot be restarted by anyone else while
            // we hold the turn, so the count lock need not be held here.
            let exclusion = self.exclusion.clone().acquire_owned().await.map_err(closed)?;
            let mut group = self.lock_readers();
            group.active = 1;
            group.exclusion = Some(exclusion);
        }
        // From here on a drop must give the seat back.
        let seat = ReaderSeat { scheduler: self };
        drop(turn);

        self.admitted(reader);
        let value = self.resource.read().await;
        Ok(ReadGuard {
            value,
            _seat: seat,
        })
    }

    /// Waits for exclusive access in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if [`close`](Self::close) is called before
    /// the writer's turn comes up.
    pub async fn write(&self, writer: &Actor) -> Result<WriteGuard<'_, T>> {
        let turn = self.turn.acquire().await.map_err(closed)?;
        let exclusion = self.exclusion.clone().acquire_owned().await.map_err(closed)?;
        drop(turn);

        self.admitted(writer);
        let value = self.resource.write().await;
        Ok(WriteGuard {
            value,
            _exclusion: exclusion,
        })
    }

    fn admitted(&self, actor: &Actor) {
        let sample = WaitSample::since_arrival(actor);
        info!(
            "{actor} admitted after {:.3}s ({} active readers)",
            sample.duration.as_secs_f64(),
            self.active_readers()
        );
        self.metrics.record(sample);
        self.metrics.record_overhead(sample.duration);
    }

    fn depart_reader(&self) {
        let released = {
            let mut group = self.lock_readers();
            group.active -= 1;
            if group.active == 0 {
                group.exclusion.take()
            } else {
                None
            }
        };
        if released.is_some() {
            debug!("last reader left, exclusion token released");
        }
    }

    /// Stops admitting: waiting and future arrivals get [`Error::Closed`].
    ///
    /// Guards already handed out stay valid.
    pub fn close(&self) {
        self.turn.close();
    }

    pub fn is_closed(&self) -> bool {
        self.turn.is_closed()
    }

    /// Readers currently holding shared access.
    pub fn active_readers(&self) -> usize {
        self.lock_readers().active
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    /// Consumes the scheduler and returns the protected value.
    pub fn into_inner(self) -> T {
        self.resource.into_inner()
    }
}

struct ReaderSeat<'a, T> {
    scheduler: &'a FairTurnScheduler<T>,
}

impl<T> Drop for ReaderSeat<'_, T> {
    fn drop(&mut self) {
        self.scheduler.depart_reader();
    }
}

/// Shared access granted by [`FairTurnScheduler::read`].
pub struct ReadGuard<'a, T> {
    // Dropped before the seat, so the borrow ends before the token moves on.
    value: RwLockReadGuard<'a, T>,
    _seat: ReaderSeat<'a, T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadGuard").field(&*self.value).finish()
    }
}

/// Exclusive access granted by [`FairTurnScheduler::write`].
pub struct WriteGuard<'a, T> {
    value: RwLockWriteGuard<'a, T>,
    _exclusion: OwnedSemaphorePermit,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for WriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteGuard").field(&*self.value).finish()
    }
}
