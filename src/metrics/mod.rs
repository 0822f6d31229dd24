// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Wait Metrics
//!
//! Every engine owns a [`MetricsAggregator`] that served actors report into.
//!
//! # Features
//!
//! - **Served count**: one [`WaitSample`] per served actor
//! - **Throughput**: served actors per second of wall time
//! - **Average wait**: mean time from arrival to service
//! - **Fairness**: population standard deviation of waits (Welford, O(1) per sample)
//! - **Overhead**: time spent blocked on a wake signal, never productive work
//!
//! # Design Principles
//!
//! - **Dedicated lock**: the accumulator lock is never taken while an engine
//!   lock is held, so bookkeeping does not lengthen the coordination path
//! - **Owned per run**: no module-level counters; concurrent runs never interfere
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use syncbench::{MetricsAggregator, Role, WaitSample};
//!
//! let metrics = MetricsAggregator::new();
//! for _ in 0..4 {
//!     metrics.record(WaitSample::new(Role::Reader, Duration::from_secs(2)));
//! }
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.fairness, Duration::ZERO);
//! println!("{snapshot}");
//! ```

mod collector;
mod snapshot;

pub use collector::{MetricsAggregator, WaitSample, WaitTimer, Welford, CONTENTION_THRESHOLD};
pub use snapshot::{MetricsSnapshot, RoleStats};
