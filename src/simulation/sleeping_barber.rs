// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Barbers serving clients through a [`WakeQueue`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use super::{in_span, join_in_stages};
use crate::config::SleepingBarberConfig;
use crate::metrics::MetricsSnapshot;
use crate::{Actor, Arrival, Result, Role, ServerReport, WakeQueue};

/// Outcome of a sleeping-barber run.
#[derive(Debug, Clone)]
pub struct SleepingBarberReport {
    /// Clients that showed up
    pub clients: usize,
    pub served: usize,
    pub balked: usize,
    pub barbers: Vec<ServerReport>,
    pub elapsed: Duration,
    pub metrics: MetricsSnapshot,
}

impl fmt::Display for SleepingBarberReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total run time: {:.3} s", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "clients: {} arrived, {} served, {} left without a haircut",
            self.clients, self.served, self.balked
        )?;
        for barber in &self.barbers {
            writeln!(
                f,
                "  barber {}: {} haircuts, slept {:.3} s",
                barber.server,
                barber.served,
                barber.slept.as_secs_f64()
            )?;
        }
        write!(f, "{}", self.metrics)
    }
}

enum Visit {
    Served,
    Balked,
}

/// Runs the sleeping-barber simulation to completion.
///
/// Clients arrive one after another with a random gap. Once every client has
/// been served or has balked, the queue is closed and the barbers go home.
///
/// # Errors
///
/// Fails fast on an invalid config, or with [`Error::Join`](crate::Error::Join)
/// if an actor task panics.
pub async fn run(config: &SleepingBarberConfig) -> Result<SleepingBarberReport> {
    config.validate()?;
    in_span("sleeping_barber", simulate(config)).await
}

async fn simulate(config: &SleepingBarberConfig) -> Result<SleepingBarberReport> {
    info!(
        "Opening the shop: {} barbers, {} seats, {} clients expected",
        config.barbers, config.seats, config.clients
    );

    let queue = Arc::new(WakeQueue::new(config.seats)?);
    let started = Instant::now();

    let barbers = (0..config.barbers)
        .map(|id| {
            let actor = Actor::new(Role::Server, id);
            let queue = queue.clone();
            (actor, tokio::spawn(async move { queue.serve(&actor).await }))
        })
        .collect();

    let mut clients = Vec::with_capacity(config.clients);
    for id in 0..config.clients {
        tokio::time::sleep(config.arrival_gap.sample()).await;
        let actor = Actor::new(Role::Client, id);
        let service = config.service_time.sample();
        clients.push((actor, tokio::spawn(visit(queue.clone(), actor, service))));
    }

    let (visits, barbers) = join_in_stages(clients, || queue.close(), barbers).await?;
    info!("The shop is closed");

    let mut served = 0;
    let mut balked = 0;
    for visit in visits {
        match visit? {
            Visit::Served => served += 1,
            Visit::Balked => balked += 1,
        }
    }

    let elapsed = started.elapsed();
    Ok(SleepingBarberReport {
        clients: config.clients,
        served,
        balked,
        barbers,
        elapsed,
        metrics: queue.metrics().snapshot_with_elapsed(elapsed),
    })
}

async fn visit(queue: Arc<WakeQueue>, client: Actor, service: Duration) -> Result<Visit> {
    match queue.arrive(client, service)? {
        Arrival::Seated(ticket) => {
            let served = ticket.wait().await?;
            info!(
                "{client} leaves after waiting {:.3} s",
                served.waited.as_secs_f64()
            );
            Ok(Visit::Served)
        }
        Arrival::Balked => Ok(Visit::Balked),
    }
}
