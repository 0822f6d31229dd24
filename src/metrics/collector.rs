// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{MetricsSnapshot, RoleStats};
use crate::{Actor, Role};

/// Waits longer than this count as contended in the snapshot's contention ratio.
pub const CONTENTION_THRESHOLD: Duration = Duration::from_micros(100);

/// A single served actor's wait.
///
/// Produced once per served actor and moved into a [`MetricsAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSample {
    pub role: Role,
    pub duration: Duration,
}

impl WaitSample {
    pub fn new(role: Role, duration: Duration) -> Self {
        Self { role, duration }
    }

    /// Sample spanning from the actor's arrival until now.
    pub fn since_arrival(actor: &Actor) -> Self {
        Self::new(actor.role(), actor.waited())
    }
}

/// Online mean and variance (Welford's algorithm).
///
/// Values are in seconds. Nothing is buffered: each `push` is O(1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Welford {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, `M2 / n`. Zero until there are two values.
    pub fn variance(&self) -> f64 {
        if self.n > 1 {
            self.m2 / self.n as f64
        } else {
            0.0
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RoleSlot {
    count: u64,
    total_wait: Duration,
}

#[derive(Debug, Default)]
struct Accumulator {
    served_count: u64,
    total_wait: Duration,
    welford: Welford,
    overhead: Duration,
    contended: u64,
    roles: [RoleSlot; 6],
}

/// Lock-guarded accumulator of wait samples for one engine.
///
/// Recorders from any number of tasks submit through [`record`](Self::record)
/// and [`record_overhead`](Self::record_overhead). The accumulator lock is
/// separate from every engine lock, and engines only call into it after
/// releasing their own state.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use syncbench::{MetricsAggregator, Role, WaitSample};
///
/// let metrics = MetricsAggregator::new();
/// metrics.record(WaitSample::new(Role::Client, Duration::ZERO));
/// metrics.record(WaitSample::new(Role::Client, Duration::from_secs(4)));
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.served_count, 2);
/// assert_eq!(snapshot.fairness, Duration::from_secs(2));
/// ```
#[derive(Debug)]
pub struct MetricsAggregator {
    state: Mutex<Accumulator>,
    /// When the run started (for throughput)
    start_instant: Instant,
}

impl MetricsAggregator {
    /// Creates an aggregator whose run starts now.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Accumulator::default()),
            start_instant: Instant::now(),
        }
    }

    // A panic while holding the lock cannot leave the accumulator half-updated,
    // so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Accumulator> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one served actor's wait.
    pub fn record(&self, sample: WaitSample) {
        let mut acc = self.lock();
        acc.served_count += 1;
        acc.total_wait = acc.total_wait.saturating_add(sample.duration);
        acc.welford.push(sample.duration.as_secs_f64());
        if sample.duration > CONTENTION_THRESHOLD {
            acc.contended += 1;
        }
        let slot = &mut acc.roles[sample.role.slot()];
        slot.count += 1;
        slot.total_wait = slot.total_wait.saturating_add(sample.duration);
    }

    /// Adds time an actor spent blocked waiting for a signal.
    pub fn record_overhead(&self, blocked: Duration) {
        if blocked.is_zero() {
            return;
        }
        let mut acc = self.lock();
        acc.overhead = acc.overhead.saturating_add(blocked);
    }

    /// Number of samples recorded so far.
    pub fn served_count(&self) -> u64 {
        self.lock().served_count
    }

    /// Total overhead recorded so far.
    pub fn overhead(&self) -> Duration {
        self.lock().overhead
    }

    /// Time since the aggregator was created.
    pub fn elapsed(&self) -> Duration {
        self.start_instant.elapsed()
    }

    /// Snapshot using the wall time elapsed since creation.
    ///
    /// Take it after every actor task has been joined so no further samples
    /// can arrive.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_with_elapsed(self.elapsed())
    }

    /// Snapshot using a caller-measured wall time for throughput.
    pub fn snapshot_with_elapsed(&self, elapsed: Duration) -> MetricsSnapshot {
        let acc = self.lock();
        let count = acc.served_count;

        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { count as f64 / secs } else { 0.0 };

        let avg_wait = if count > 0 {
            acc.total_wait.div_f64(count as f64)
        } else {
            Duration::ZERO
        };

        let contention_ratio = if count > 0 {
            acc.contended as f64 / count as f64
        } else {
            0.0
        };

        let roles = Role::ALL
            .iter()
            .filter_map(|&role| {
                let slot = acc.roles[role.slot()];
                (slot.count > 0).then(|| RoleStats {
                    role,
                    count: slot.count,
                    avg_wait: slot.total_wait.div_f64(slot.count as f64),
                })
            })
            .collect();

        MetricsSnapshot {
            served_count: count,
            elapsed,
            throughput,
            avg_wait,
            fairness: Duration::from_secs_f64(acc.welford.stddev()),
            overhead: acc.overhead,
            contention_ratio,
            roles,
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard measuring a blocked interval.
///
/// When dropped, the elapsed time is added to the aggregator's overhead.
///
/// ```rust,ignore
/// let timer = WaitTimer::new(&self.metrics);
/// notified.await;
/// drop(timer); // records the time spent suspended
/// ```
pub struct WaitTimer<'a> {
    metrics: &'a MetricsAggregator,
    start: Instant,
}

impl<'a> WaitTimer<'a> {
    #[inline]
    pub fn new(metrics: &'a MetricsAggregator) -> Self {
        Self {
            metrics,
            start: Instant::now(),
        }
    }

    /// Stops the timer, records the interval and returns it.
    pub fn stop(self) -> Duration {
        let blocked = self.start.elapsed();
        self.metrics.record_overhead(blocked);
        std::mem::forget(self);
        blocked
    }
}

impl Drop for WaitTimer<'_> {
    #[inline]
    fn drop(&mut self) {
        self.metrics.record_overhead(self.start.elapsed());
    }
}
