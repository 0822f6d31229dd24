// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! # syncbench: Concurrency Coordination Engines with Metrics
//!
//! `syncbench` implements three classic coordination patterns on top of `tokio`
//! and measures how fairly and efficiently each one admits its actors.
//!
//! ## Features
//!
//! - **Bounded Buffer**: FIFO hand-off between producers and consumers with a
//!   fixed capacity. Producers block while it is full, consumers while it is
//!   empty, and a stop signal lets consumers drain what is left.
//! - **Wake Queue**: The sleeping barber. Clients take a waiting seat or balk
//!   when every seat is occupied; servers sleep while nobody waits and are
//!   woken by the next arrival.
//! - **Fair Turn Scheduler**: Readers and writers admitted strictly in arrival
//!   order. Consecutive readers share access, writers get it alone, and
//!   neither side can starve the other.
//! - **Metrics**: Throughput, average wait, fairness (standard deviation of
//!   waits) and synchronization overhead, gathered concurrently and read as a
//!   consistent snapshot.
//!
//! ## Core Concepts
//!
//! - **[`Actor`]**: A simulated participant with a [`Role`], an id and an
//!   arrival instant. Waits are measured from arrival.
//! - **[`MetricsAggregator`]**: Shared by an engine's actors; every completed
//!   admission records one [`WaitSample`].
//! - **[`simulation`]**: Drivers that spawn one task per actor, run an engine
//!   to completion and report a [`MetricsSnapshot`].
//! - **[`config`]**: Validated startup parameters for each simulation.
//!
//! ## Getting Started
//!
//! ```rust
//! use std::sync::Arc;
//! use syncbench::{Actor, BoundedBuffer, Role};
//!
//! #[tokio::main]
//! async fn main() -> syncbench::Result<()> {
//!     let buffer = Arc::new(BoundedBuffer::new(2)?);
//!     let producer = Actor::new(Role::Producer, 0);
//!     let consumer = Actor::new(Role::Consumer, 0);
//!
//!     buffer.put(&producer, "first").await?;
//!     buffer.put(&producer, "second").await?;
//!     buffer.stop();
//!
//!     assert_eq!(buffer.take(&consumer).await, Some("first"));
//!     assert_eq!(buffer.take(&consumer).await, Some("second"));
//!     assert_eq!(buffer.take(&consumer).await, None);
//!
//!     let metrics = buffer.consumed().snapshot();
//!     assert_eq!(metrics.served_count, 2);
//!     println!("{metrics}");
//!     Ok(())
//! }
//! ```
//!
//! ## Optional Features
//!
//! - **`tracing`**: Wraps each simulation run in a `tracing` span and emits
//!   structured balk events alongside the regular `log` output.

mod actor;
mod buffer;
pub mod config;
mod error;
pub mod metrics;
pub mod simulation;
mod turn_scheduler;
mod wake_queue;

pub use actor::{Actor, Item, Role};
pub use buffer::BoundedBuffer;
pub use error::{Error, Result};
pub use metrics::{MetricsAggregator, MetricsSnapshot, RoleStats, WaitSample, WaitTimer, Welford};
pub use turn_scheduler::{FairTurnScheduler, ReadGuard, WriteGuard};
pub use wake_queue::{Arrival, ServerReport, ServerState, Served, ServiceTicket, WakeQueue};
