// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Readers and writers sharing a shelf of books through a [`FairTurnScheduler`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use super::{in_span, join_actors};
use crate::config::{DelayRange, ReadersWritersConfig};
use crate::metrics::MetricsSnapshot;
use crate::{Actor, FairTurnScheduler, Result, Role};

/// Outcome of a readers/writers run.
#[derive(Debug, Clone)]
pub struct ReadersWritersReport {
    pub readers: usize,
    pub writers: usize,
    /// Book count after the last write
    pub books: u64,
    pub elapsed: Duration,
    pub metrics: MetricsSnapshot,
}

impl fmt::Display for ReadersWritersReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total run time: {:.3} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "{}", self.metrics)?;
        write!(f, "final number of books: {}", self.books)
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    arrival_delay: DelayRange,
    work: DelayRange,
}

/// Runs the readers/writers simulation to completion.
///
/// Every actor sleeps a random arrival delay, then requests access. Each
/// writer adds `books_per_write` books.
///
/// # Errors
///
/// Fails fast on an invalid config, or with [`Error::Join`](crate::Error::Join)
/// if an actor task panics.
pub async fn run(config: &ReadersWritersConfig) -> Result<ReadersWritersReport> {
    config.validate()?;
    in_span("readers_writers", simulate(config)).await
}

async fn simulate(config: &ReadersWritersConfig) -> Result<ReadersWritersReport> {
    info!(
        "Starting simulation: {} readers, {} writers, {} books",
        config.readers, config.writers, config.initial_books
    );

    let library = Arc::new(FairTurnScheduler::new(config.initial_books));
    let started = Instant::now();

    let reading = Timing {
        arrival_delay: config.arrival_delay,
        work: config.read_time,
    };
    let writing = Timing {
        arrival_delay: config.arrival_delay,
        work: config.write_time,
    };

    // Ids start at 1 for both roles.
    let mut tasks = Vec::with_capacity(config.readers + config.writers);
    for id in 1..=config.readers {
        let actor = Actor::new(Role::Reader, id);
        tasks.push((actor, tokio::spawn(read(library.clone(), id, reading))));
    }
    for id in 1..=config.writers {
        let actor = Actor::new(Role::Writer, id);
        let increment = config.books_per_write;
        tasks.push((actor, tokio::spawn(write(library.clone(), id, increment, writing))));
    }

    // Writes only ever add books, so the largest value seen is the final one.
    let mut books = config.initial_books;
    for seen in join_actors(tasks).await? {
        books = books.max(seen?);
    }

    let elapsed = started.elapsed();
    Ok(ReadersWritersReport {
        readers: config.readers,
        writers: config.writers,
        books,
        elapsed,
        metrics: library.metrics().snapshot_with_elapsed(elapsed),
    })
}

async fn read(library: Arc<FairTurnScheduler<u64>>, id: usize, timing: Timing) -> Result<u64> {
    tokio::time::sleep(timing.arrival_delay.sample()).await;
    let reader = Actor::new(Role::Reader, id);

    let books = library.read(&reader).await?;
    let seen = *books;
    info!("{reader} read the books = {seen}");
    tokio::time::sleep(timing.work.sample()).await;
    Ok(seen)
}

async fn write(
    library: Arc<FairTurnScheduler<u64>>,
    id: usize,
    increment: u64,
    timing: Timing,
) -> Result<u64> {
    tokio::time::sleep(timing.arrival_delay.sample()).await;
    let writer = Actor::new(Role::Writer, id);

    let mut books = library.write(&writer).await?;
    *books += increment;
    let written = *books;
    info!("{writer} updated the books to {written}");
    tokio::time::sleep(timing.work.sample()).await;
    Ok(written)
}
