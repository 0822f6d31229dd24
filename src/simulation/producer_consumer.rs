// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Producers and consumers exchanging [`Item`]s through a [`BoundedBuffer`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use super::{in_span, join_in_stages};
use crate::config::{DelayRange, ProducerConsumerConfig};
use crate::metrics::MetricsSnapshot;
use crate::{Actor, BoundedBuffer, Item, Result, Role};

/// Items one actor handled and how long it waited for them on average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorStats {
    pub actor: Actor,
    pub count: usize,
    pub avg_wait: Duration,
}

impl fmt::Display for ActorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} items, average wait {:.6} s",
            self.actor,
            self.count,
            self.avg_wait.as_secs_f64()
        )
    }
}

#[derive(Debug, Default)]
struct Tally {
    count: usize,
    total_wait: Duration,
}

impl Tally {
    fn add(&mut self, waited: Duration) {
        self.count += 1;
        self.total_wait = self.total_wait.saturating_add(waited);
    }

    fn finish(self, actor: Actor) -> ActorStats {
        let avg_wait = match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total_wait / count,
            Err(_) => self.total_wait.div_f64(self.count as f64),
        };
        ActorStats {
            actor,
            count: self.count,
            avg_wait,
        }
    }
}

/// Outcome of a producer/consumer run.
#[derive(Debug, Clone)]
pub struct ProducerConsumerReport {
    pub produced: usize,
    pub consumed: usize,
    /// One entry per producer, in id order
    pub per_producer: Vec<ActorStats>,
    /// One entry per consumer, in id order
    pub per_consumer: Vec<ActorStats>,
    pub elapsed: Duration,
    /// Served side: one sample per take
    pub metrics: MetricsSnapshot,
    /// Producer side: one sample per put
    pub producer_metrics: MetricsSnapshot,
}

impl fmt::Display for ProducerConsumerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total run time: {:.4} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "items produced: {}", self.produced)?;
        writeln!(f, "items consumed: {}", self.consumed)?;
        writeln!(f, "per actor:")?;
        for stats in self.per_producer.iter().chain(&self.per_consumer) {
            writeln!(f, "  {stats}")?;
        }
        writeln!(f, "{}", self.metrics)?;
        write!(
            f,
            "producer average wait: {:.6} s ({:.2}% of puts waited)",
            self.producer_metrics.avg_wait.as_secs_f64(),
            self.producer_metrics.contention_ratio * 100.0
        )
    }
}

/// Runs the producer/consumer simulation to completion.
///
/// Producers are joined first; the buffer is then stopped, which lets the
/// consumers drain what is left and exit.
///
/// # Errors
///
/// Fails fast on an invalid config, or with [`Error::Join`](crate::Error::Join)
/// if an actor task panics.
pub async fn run(config: &ProducerConsumerConfig) -> Result<ProducerConsumerReport> {
    config.validate()?;
    in_span("producer_consumer", simulate(config)).await
}

async fn simulate(config: &ProducerConsumerConfig) -> Result<ProducerConsumerReport> {
    info!(
        "Starting simulation: {} producers, {} consumers, buffer of {}",
        config.producers, config.consumers, config.capacity
    );

    let buffer = Arc::new(BoundedBuffer::new(config.capacity)?);
    let started = Instant::now();

    let producers = (0..config.producers)
        .map(|id| {
            let actor = Actor::new(Role::Producer, id);
            let task = tokio::spawn(produce(
                buffer.clone(),
                actor,
                config.items_per_producer,
                config.produce_time,
            ));
            (actor, task)
        })
        .collect();

    let consumers = (0..config.consumers)
        .map(|id| {
            let actor = Actor::new(Role::Consumer, id);
            let task = tokio::spawn(consume(buffer.clone(), actor, config.consume_time));
            (actor, task)
        })
        .collect();

    let (producers, per_consumer) =
        join_in_stages(producers, || buffer.stop(), consumers).await?;
    let per_producer = producers.into_iter().collect::<Result<Vec<_>>>()?;
    info!("All items have been consumed");

    let produced = per_producer.iter().map(|stats| stats.count).sum();
    let consumed = per_consumer.iter().map(|stats| stats.count).sum();

    let elapsed = started.elapsed();
    Ok(ProducerConsumerReport {
        produced,
        consumed,
        per_producer,
        per_consumer,
        elapsed,
        metrics: buffer.consumed().snapshot_with_elapsed(elapsed),
        producer_metrics: buffer.produced().snapshot_with_elapsed(elapsed),
    })
}

async fn produce(
    buffer: Arc<BoundedBuffer<Item>>,
    producer: Actor,
    items: usize,
    produce_time: DelayRange,
) -> Result<ActorStats> {
    let mut tally = Tally::default();
    for seq in 0..items {
        tokio::time::sleep(produce_time.sample()).await;
        let item = Item::new(producer.id(), seq);
        let (occupied, waited) = buffer.put_timed(&producer, item).await?;
        tally.add(waited);
        info!("{producer} produced {item} (buffer: {occupied})");
    }
    info!("{producer} finished after {items} items");
    Ok(tally.finish(producer))
}

async fn consume(
    buffer: Arc<BoundedBuffer<Item>>,
    consumer: Actor,
    consume_time: DelayRange,
) -> ActorStats {
    let mut tally = Tally::default();
    loop {
        tokio::time::sleep(consume_time.sample()).await;
        let Some((item, waited)) = buffer.take_timed(&consumer).await else {
            break;
        };
        tally.add(waited);
        info!("{consumer} consumed {item} (buffer: {})", buffer.len());
    }
    info!("{consumer} stopping after {} items", tally.count);
    tally.finish(consumer)
}
