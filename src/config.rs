// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Startup configuration for the three simulations.
//!
//! Values are fixed for the whole run. Every config validates before any actor
//! is spawned, so a bad value fails fast with
//! [`Error::InvalidConfiguration`].

use std::time::Duration;

use rand::Rng;

use crate::{Error, Result};

/// Inclusive range of durations sampled uniformly, used for arrival delays
/// and simulated work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    /// A range from `min` to `max`. Call [`validate`](Self::validate) (or the
    /// owning config's `validate`) before sampling.
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// A range that always yields `delay`.
    pub const fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn validate(&self, field: &'static str) -> Result<()> {
        if self.min > self.max {
            return Err(Error::invalid(
                field,
                format!("minimum {:?} exceeds maximum {:?}", self.min, self.max),
            ));
        }
        Ok(())
    }

    /// Draws a duration uniformly from the range.
    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let nanos = rand::rng().random_range(self.min.as_nanos()..=self.max.as_nanos());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

fn positive(field: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid(field, "must be a positive integer"));
    }
    Ok(())
}

/// Parses an actor count typed at a prompt.
///
/// Surrounding whitespace is ignored; anything other than a positive integer
/// is rejected.
///
/// ```rust
/// use syncbench::config::parse_actor_count;
///
/// assert_eq!(parse_actor_count(" 4\n", "readers").unwrap(), 4);
/// assert!(parse_actor_count("0", "readers").is_err());
/// assert!(parse_actor_count("four", "readers").is_err());
/// ```
pub fn parse_actor_count(input: &str, field: &'static str) -> Result<usize> {
    let trimmed = input.trim();
    let count: usize = trimmed
        .parse()
        .map_err(|_| Error::invalid(field, format!("'{trimmed}' is not a positive integer")))?;
    positive(field, count)?;
    Ok(count)
}

/// Producer/consumer run over a [`BoundedBuffer`](crate::BoundedBuffer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConsumerConfig {
    /// Slots in the buffer
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    /// Items each producer creates before finishing
    pub items_per_producer: usize,
    /// Time a producer spends making each item
    pub produce_time: DelayRange,
    /// Time a consumer spends before each take
    pub consume_time: DelayRange,
}

impl Default for ProducerConsumerConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            producers: 10,
            consumers: 2,
            items_per_producer: 5,
            produce_time: DelayRange::from_millis(100, 500),
            consume_time: DelayRange::from_millis(100, 600),
        }
    }
}

impl ProducerConsumerConfig {
    pub fn validate(&self) -> Result<()> {
        positive("capacity", self.capacity)?;
        positive("producers", self.producers)?;
        positive("consumers", self.consumers)?;
        positive("items_per_producer", self.items_per_producer)?;
        self.produce_time.validate("produce_time")?;
        self.consume_time.validate("consume_time")
    }

    /// Items the whole run produces (and consumes).
    pub fn total_items(&self) -> usize {
        self.producers * self.items_per_producer
    }
}

/// Sleeping-barber run over a [`WakeQueue`](crate::WakeQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepingBarberConfig {
    pub barbers: usize,
    pub clients: usize,
    /// Seats in the waiting room
    pub seats: usize,
    /// Gap between consecutive client arrivals
    pub arrival_gap: DelayRange,
    /// Haircut length, chosen by each client
    pub service_time: DelayRange,
}

impl Default for SleepingBarberConfig {
    fn default() -> Self {
        Self {
            barbers: 1,
            clients: 50,
            seats: 5,
            arrival_gap: DelayRange::from_millis(0, 1000),
            service_time: DelayRange::from_millis(0, 5000),
        }
    }
}

impl SleepingBarberConfig {
    pub fn validate(&self) -> Result<()> {
        positive("barbers", self.barbers)?;
        positive("clients", self.clients)?;
        positive("seats", self.seats)?;
        self.arrival_gap.validate("arrival_gap")?;
        self.service_time.validate("service_time")
    }
}

/// Readers/writers run over a [`FairTurnScheduler`](crate::FairTurnScheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadersWritersConfig {
    pub readers: usize,
    pub writers: usize,
    /// Delay before each actor arrives, measured from the start of the run
    pub arrival_delay: DelayRange,
    pub read_time: DelayRange,
    pub write_time: DelayRange,
    /// Books on the shelf before anyone writes
    pub initial_books: u64,
    /// Books each writer adds
    pub books_per_write: u64,
}

impl ReadersWritersConfig {
    /// Configuration for `readers` readers and `writers` writers, other
    /// values at their defaults.
    pub fn new(readers: usize, writers: usize) -> Self {
        Self {
            readers,
            writers,
            arrival_delay: DelayRange::from_millis(0, 2000),
            read_time: DelayRange::fixed(Duration::from_secs(1)),
            write_time: DelayRange::fixed(Duration::from_secs(1)),
            initial_books: 1,
            books_per_write: 3,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("readers", self.readers)?;
        positive("writers", self.writers)?;
        self.arrival_delay.validate("arrival_delay")?;
        self.read_time.validate("read_time")?;
        self.write_time.validate("write_time")
    }

    /// Book count once every writer has finished.
    pub fn expected_books(&self) -> u64 {
        self.initial_books + self.writers as u64 * self.books_per_write
    }
}
