// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Bounded Slot Buffer
//!
//! A fixed-capacity FIFO monitor for the producer/consumer pattern. One lock
//! guards the slots; producers wait on "not full" and consumers on
//! "not empty", so each side only ever wakes the other.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::Notify;

use crate::metrics::{MetricsAggregator, WaitSample, WaitTimer};
use crate::{Actor, Error, Result};

const ENGINE: &str = "buffer";

#[derive(Debug)]
struct Slots<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// Fixed-capacity FIFO store shared by producers and consumers.
///
/// [`put`](Self::put) waits while the buffer is full and [`take`](Self::take)
/// waits while it is empty. Every wait re-checks both its predicate and the
/// stop flag, so spurious wakeups are harmless.
///
/// Takes are the served operations: their waits go to
/// [`consumed`](Self::consumed). Producer waits go to
/// [`produced`](Self::produced).
///
/// # Example
///
/// ```rust
/// use syncbench::{Actor, BoundedBuffer, Role};
///
/// # #[tokio::main]
/// # async fn main() -> syncbench::Result<()> {
/// let buffer = BoundedBuffer::new(2)?;
/// buffer.put(&Actor::new(Role::Producer, 0), "a").await?;
/// buffer.put(&Actor::new(Role::Producer, 0), "b").await?;
///
/// let consumer = Actor::new(Role::Consumer, 0);
/// assert_eq!(buffer.take(&consumer).await, Some("a"));
/// assert_eq!(buffer.take(&consumer).await, Some("b"));
///
/// buffer.stop();
/// assert_eq!(buffer.take(&consumer).await, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    capacity: usize,
    slots: Mutex<Slots<T>>,
    not_full: Notify,
    not_empty: Notify,
    produced: MetricsAggregator,
    consumed: MetricsAggregator,
}

impl<T> BoundedBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid("capacity", "buffer capacity must be greater than zero"));
        }
        Ok(Self {
            capacity,
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity),
                stopped: false,
            }),
            not_full: Notify::new(),
            not_empty: Notify::new(),
            produced: MetricsAggregator::new(),
            consumed: MetricsAggregator::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `item`, waiting while the buffer is full.
    ///
    /// Returns the number of occupied slots right after the insertion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the buffer is stopped before a slot frees up.
    pub async fn put(&self, producer: &Actor, item: T) -> Result<usize> {
        self.put_timed(producer, item).await.map(|(occupied, _)| occupied)
    }

    /// Like [`put`](Self::put), also returning the wait recorded for this put.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the buffer is stopped before a slot frees up.
    pub async fn put_timed(&self, producer: &Actor, item: T) -> Result<(usize, Duration)> {
        let called = Instant::now();
        loop {
            // Register before checking so a notify between the check and
            // the await is not lost.
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut slots = self.lock();
                if slots.stopped {
                    return Err(Error::Closed { engine: ENGINE });
                }
                if slots.items.len() < self.capacity {
                    slots.items.push_back(item);
                    let occupied = slots.items.len();
                    drop(slots);

                    self.not_empty.notify_one();
                    let waited = called.elapsed();
                    self.produced.record(WaitSample::new(producer.role(), waited));
                    debug!("{producer} put an item ({occupied}/{})", self.capacity);
                    return Ok((occupied, waited));
                }
            }

            debug!("{producer} waits: buffer full");
            let timer = WaitTimer::new(&self.produced);
            notified.await;
            drop(timer);
        }
    }

    /// Removes the oldest item, waiting while the buffer is empty.
    ///
    /// Items still present after [`stop`](Self::stop) are drained first;
    /// `None` is returned once the buffer is both stopped and empty.
    pub async fn take(&self, consumer: &Actor) -> Option<T> {
        self.take_timed(consumer).await.map(|(item, _)| item)
    }

    /// Like [`take`](Self::take), also returning the wait recorded for this take.
    pub async fn take_timed(&self, consumer: &Actor) -> Option<(T, Duration)> {
        let called = Instant::now();
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut slots = self.lock();
                if let Some(item) = slots.items.pop_front() {
                    let occupied = slots.items.len();
                    drop(slots);

                    self.not_full.notify_one();
                    let waited = called.elapsed();
                    self.consumed.record(WaitSample::new(consumer.role(), waited));
                    debug!("{consumer} took an item ({occupied}/{})", self.capacity);
                    return Some((item, waited));
                }
                if slots.stopped {
                    debug!("{consumer} observed stop on an empty buffer");
                    return None;
                }
            }

            debug!("{consumer} waits: buffer empty");
            let timer = WaitTimer::new(&self.consumed);
            notified.await;
            drop(timer);
        }
    }

    /// Raises the stop flag and wakes every waiting producer and consumer.
    pub fn stop(&self) {
        self.lock().stopped = true;
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Metrics of the served side (one sample per successful take).
    pub fn consumed(&self) -> &MetricsAggregator {
        &self.consumed
    }

    /// Metrics of the producing side (one sample per successful put).
    pub fn produced(&self) -> &MetricsAggregator {
        &self.produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use std::sync::Arc;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = BoundedBuffer::<u8>::new(0).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfiguration { field: "capacity", .. }
        ));
    }

    #[tokio::test]
    async fn test_put_reports_occupancy() {
        let buffer = BoundedBuffer::new(3).unwrap();
        let producer = Actor::new(Role::Producer, 0);

        assert_eq!(buffer.put(&producer, 1).await.unwrap(), 1);
        assert_eq!(buffer.put(&producer, 2).await.unwrap(), 2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.capacity(), 3);
        assert_eq!(buffer.produced().served_count(), 2);
        assert_eq!(buffer.consumed().served_count(), 0);
    }

    #[tokio::test]
    async fn test_full_buffer_blocks_until_take() {
        let buffer = Arc::new(BoundedBuffer::new(1).unwrap());
        let producer = Actor::new(Role::Producer, 0);
        buffer.put(&producer, 10).await.unwrap();

        let blocked = tokio::spawn({
            let buffer = buffer.clone();
            async move { buffer.put(&Actor::new(Role::Producer, 1), 20).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());
        assert_eq!(buffer.len(), 1);

        let consumer = Actor::new(Role::Consumer, 0);
        assert_eq!(buffer.take(&consumer).await, Some(10));
        assert_eq!(blocked.await.unwrap().unwrap(), 1);
        assert_eq!(buffer.take(&consumer).await, Some(20));

        // The second producer was suspended for about 50ms.
        assert!(buffer.produced().overhead() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_timed_take_reports_recorded_wait() {
        let buffer = Arc::new(BoundedBuffer::new(2).unwrap());
        let consumer = tokio::spawn({
            let buffer = buffer.clone();
            async move { buffer.take_timed(&Actor::new(Role::Consumer, 0)).await }
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        let (occupied, put_wait) = buffer
            .put_timed(&Actor::new(Role::Producer, 0), 'k')
            .await
            .unwrap();
        assert_eq!(occupied, 1);
        assert!(put_wait < Duration::from_millis(40));

        let (item, take_wait) = consumer.await.unwrap().unwrap();
        assert_eq!(item, 'k');
        assert!(take_wait >= Duration::from_millis(30));
        assert_eq!(buffer.consumed().served_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_wakes_waiting_consumers() {
        let buffer = Arc::new(BoundedBuffer::<u32>::new(4).unwrap());

        let waiters: Vec<_> = (0..3)
            .map(|id| {
                let buffer = buffer.clone();
                tokio::spawn(async move { buffer.take(&Actor::new(Role::Consumer, id)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        buffer.stop();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), None);
        }
        assert_eq!(buffer.consumed().served_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_drains_remaining_items_first() {
        let buffer = BoundedBuffer::new(4).unwrap();
        let producer = Actor::new(Role::Producer, 0);
        let consumer = Actor::new(Role::Consumer, 0);
        buffer.put(&producer, 'x').await.unwrap();
        buffer.stop();

        assert!(buffer.is_stopped());
        assert_eq!(buffer.take(&consumer).await, Some('x'));
        assert_eq!(buffer.take(&consumer).await, None);
    }

    #[tokio::test]
    async fn test_put_after_stop_is_closed() {
        let buffer = Arc::new(BoundedBuffer::new(1).unwrap());
        let producer = Actor::new(Role::Producer, 0);
        buffer.put(&producer, 1).await.unwrap();

        let blocked = tokio::spawn({
            let buffer = buffer.clone();
            async move { buffer.put(&Actor::new(Role::Producer, 1), 2).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        buffer.stop();

        assert!(blocked.await.unwrap().unwrap_err().is_closed());
        assert!(buffer.put(&producer, 3).await.unwrap_err().is_closed());
    }
}
