// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Single-Server Wake Queue
//!
//! The sleeping-barber pattern: a bounded waiting room, clients that balk when
//! it is full, and servers that sleep while it is empty until an arriving
//! client wakes one of them.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{oneshot, Notify};

use crate::metrics::{MetricsAggregator, WaitSample, WaitTimer};
use crate::{Actor, Error, Result};

const ENGINE: &str = "wake queue";

/// Where a server is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Blocked on the wake signal with an empty room
    Sleeping,
    /// Working through a client's service time
    Serving,
    /// The queue is closed and the room is empty
    Done,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Sleeping => write!(f, "sleeping"),
            ServerState::Serving => write!(f, "serving"),
            ServerState::Done => write!(f, "done"),
        }
    }
}

/// Outcome of a client's arrival.
#[derive(Debug)]
pub enum Arrival {
    /// The client took a seat and will be served
    Seated(ServiceTicket),
    /// The room was full; the client left and is never retried
    Balked,
}

impl Arrival {
    pub fn is_balked(&self) -> bool {
        matches!(self, Arrival::Balked)
    }
}

/// What a served client learns when its service ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Served {
    /// Id of the server that handled the client
    pub server: usize,
    /// Time from arrival until a server took the client
    pub waited: Duration,
}

/// Handle a seated client holds while it waits for service.
#[derive(Debug)]
pub struct ServiceTicket {
    client: Actor,
    done: oneshot::Receiver<Served>,
}

impl ServiceTicket {
    pub fn client(&self) -> Actor {
        self.client
    }

    /// Waits until a server has finished with this client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the queue was dropped with the client
    /// still seated.
    pub async fn wait(self) -> Result<Served> {
        self.done.await.map_err(|_| Error::Closed { engine: ENGINE })
    }
}

/// Summary a server returns when it reaches [`ServerState::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerReport {
    pub server: usize,
    /// Clients this server handled
    pub served: u64,
    /// Total time spent asleep on the wake signal
    pub slept: Duration,
}

#[derive(Debug)]
struct Seat {
    client: Actor,
    service: Duration,
    done: oneshot::Sender<Served>,
}

#[derive(Debug, Default)]
struct Room {
    waiting: VecDeque<Seat>,
    closed: bool,
    balked: u64,
    /// Last known state of each server, by id
    servers: HashMap<usize, ServerState>,
}

/// Bounded waiting room served by one or more sleeping servers.
///
/// Clients call [`arrive`](Self::arrive), servers run [`serve`](Self::serve)
/// until the driver calls [`close`](Self::close). Each served client records
/// one wait sample (arrival to pickup); each sleep records overhead.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use syncbench::{Actor, Arrival, Role, WakeQueue};
///
/// # #[tokio::main]
/// # async fn main() -> syncbench::Result<()> {
/// let queue = WakeQueue::new(1)?;
/// let first = queue.arrive(Actor::new(Role::Client, 0), Duration::ZERO)?;
/// let second = queue.arrive(Actor::new(Role::Client, 1), Duration::ZERO)?;
/// assert!(second.is_balked());
///
/// queue.close();
/// let report = queue.serve(&Actor::new(Role::Server, 0)).await;
/// assert_eq!(report.served, 1);
///
/// if let Arrival::Seated(ticket) = first {
///     assert_eq!(ticket.wait().await?.server, 0);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WakeQueue {
    seats: usize,
    room: Mutex<Room>,
    wake: Notify,
    metrics: MetricsAggregator,
}

impl WakeQueue {
    /// Creates a queue with `seats` places in the waiting room.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when `seats` is zero.
    pub fn new(seats: usize) -> Result<Self> {
        if seats == 0 {
            return Err(Error::invalid("seats", "waiting room needs at least one seat"));
        }
        Ok(Self {
            seats,
            room: Mutex::new(Room {
                waiting: VecDeque::with_capacity(seats),
                ..Room::default()
            }),
            wake: Notify::new(),
            metrics: MetricsAggregator::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Room> {
        self.room.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tries to seat `client` without blocking.
    ///
    /// `service` is the work the client needs; servers sleep for it without
    /// interpreting it. A full room yields [`Arrival::Balked`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once [`close`](Self::close) has been called.
    pub fn arrive(&self, client: Actor, service: Duration) -> Result<Arrival> {
        let (done, ticket) = oneshot::channel();
        {
            let mut room = self.lock();
            if room.closed {
                return Err(Error::Closed { engine: ENGINE });
            }
            if room.waiting.len() >= self.seats {
                room.balked += 1;
                drop(room);
                record_balk(&client, self.seats);
                return Ok(Arrival::Balked);
            }
            room.waiting.push_back(Seat {
                client,
                service,
                done,
            });
        }

        info!("{client} sat in the waiting room");
        self.wake.notify_one();
        Ok(Arrival::Seated(ServiceTicket {
            client,
            done: ticket,
        }))
    }

    /// Runs a server until the queue is closed and the room is empty.
    pub async fn serve(&self, server: &Actor) -> ServerReport {
        let mut report = ServerReport {
            server: server.id(),
            served: 0,
            slept: Duration::ZERO,
        };

        while let Some(seat) = self.next_client(server, &mut report).await {
            let sample = WaitSample::since_arrival(&seat.client);
            self.metrics.record(sample);
            let waited = sample.duration;
            debug!("{server} is {}", ServerState::Serving);

            info!("{server} is serving {}", seat.client);
            tokio::time::sleep(seat.service).await;
            info!("{server} finished serving {}", seat.client);

            report.served += 1;
            // The client may have stopped listening; the service still counts.
            let _ = seat.done.send(Served {
                server: server.id(),
                waited,
            });
        }

        debug!(
            "{server} is {} after {} clients",
            ServerState::Done,
            report.served
        );
        report
    }

    // Returns the oldest seated client, sleeping while the room is empty.
    // `None` means the queue is closed and drained.
    async fn next_client(&self, server: &Actor, report: &mut ServerReport) -> Option<Seat> {
        loop {
            // Registered before the room is inspected so an arrival between
            // the check and the await still wakes us.
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut room = self.lock();
                let (next, state) = match room.waiting.pop_front() {
                    Some(seat) => (Some(seat), ServerState::Serving),
                    None if room.closed => (None, ServerState::Done),
                    None => (None, ServerState::Sleeping),
                };
                room.servers.insert(server.id(), state);
                if state != ServerState::Sleeping {
                    return next;
                }
            }

            info!("{server} is {}... Zzz", ServerState::Sleeping);
            let timer = WaitTimer::new(&self.metrics);
            notified.await;
            report.slept += timer.stop();
        }
    }

    /// Signals that no more clients will arrive and wakes every sleeping server.
    pub fn close(&self) {
        self.lock().closed = true;
        self.wake.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Clients currently seated.
    pub fn waiting(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn seats(&self) -> usize {
        self.seats
    }

    /// Clients turned away so far.
    pub fn balked(&self) -> u64 {
        self.lock().balked
    }

    /// Servers currently blocked on the wake signal.
    pub fn sleeping_servers(&self) -> usize {
        self.lock()
            .servers
            .values()
            .filter(|&&state| state == ServerState::Sleeping)
            .count()
    }

    /// State of server `id`, or `None` if it has not started serving.
    pub fn server_state(&self, id: usize) -> Option<ServerState> {
        self.lock().servers.get(&id).copied()
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }
}

#[cold]
fn record_balk(client: &Actor, seats: usize) {
    warn!("The waiting room is full ({seats} seats), {client} left");

    #[cfg(feature = "tracing")]
    tracing::warn!(
        client.id = client.id(),
        room.seats = seats,
        "client balked"
    );
}
