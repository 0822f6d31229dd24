// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::{Duration, Instant};

/// The part an actor plays in one of the coordination patterns.
///
/// Ids are scoped per role, so `Reader 1` and `Writer 1` are distinct actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Puts items into a [`BoundedBuffer`](crate::BoundedBuffer)
    Producer,
    /// Takes items out of a [`BoundedBuffer`](crate::BoundedBuffer)
    Consumer,
    /// Shares access through a [`FairTurnScheduler`](crate::FairTurnScheduler)
    Reader,
    /// Holds exclusive access through a [`FairTurnScheduler`](crate::FairTurnScheduler)
    Writer,
    /// Arrives at a [`WakeQueue`](crate::WakeQueue) to be served
    Client,
    /// Serves clients of a [`WakeQueue`](crate::WakeQueue)
    Server,
}

impl Role {
    /// All roles, in slot order.
    pub const ALL: [Role; 6] = [
        Role::Producer,
        Role::Consumer,
        Role::Reader,
        Role::Writer,
        Role::Client,
        Role::Server,
    ];

    pub(crate) fn slot(self) -> usize {
        match self {
            Role::Producer => 0,
            Role::Consumer => 1,
            Role::Reader => 2,
            Role::Writer => 3,
            Role::Client => 4,
            Role::Server => 5,
        }
    }

    /// Lowercase name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a participant in a simulation.
///
/// An `Actor` is created at the moment it arrives at an engine and never
/// changes afterwards. Engines measure waits from [`arrived`](Actor::arrived).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    role: Role,
    id: usize,
    arrived: Instant,
}

impl Actor {
    /// Creates an actor that arrives now.
    pub fn new(role: Role, id: usize) -> Self {
        Self::arrived_at(role, id, Instant::now())
    }

    /// Creates an actor with an explicit arrival timestamp.
    pub fn arrived_at(role: Role, id: usize, arrived: Instant) -> Self {
        Self { role, id, arrived }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn arrived(&self) -> Instant {
        self.arrived
    }

    /// Time elapsed since this actor arrived.
    pub fn waited(&self) -> Duration {
        self.arrived.elapsed()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role, self.id)
    }
}

/// A unit of work handed from one producer to exactly one consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item {
    /// Id of the producer that created the item
    pub producer: usize,
    /// Position of the item in its producer's output
    pub seq: usize,
}

impl Item {
    pub fn new(producer: usize, seq: usize) -> Self {
        Self { producer, seq }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item(P{}-{})", self.producer, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_slots_are_unique() {
        let mut seen = [false; 6];
        for role in Role::ALL {
            assert!(!seen[role.slot()], "duplicate slot for {role}");
            seen[role.slot()] = true;
        }
    }

    #[test]
    fn test_actor_display() {
        let actor = Actor::new(Role::Writer, 2);
        assert_eq!(actor.to_string(), "writer 2");
        assert_eq!(actor.role(), Role::Writer);
        assert_eq!(actor.id(), 2);
    }

    #[test]
    fn test_item_display() {
        assert_eq!(Item::new(4, 1).to_string(), "Item(P4-1)");
    }
}
