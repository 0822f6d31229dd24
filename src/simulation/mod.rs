// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Simulation drivers.
//!
//! Each driver validates its config, spawns one task per actor, joins them,
//! raises the engine's terminal signal, and returns a report carrying the
//! metrics snapshot. No driver polls for completion: joins are the only
//! termination signal.

pub mod producer_consumer;
pub mod readers_writers;
pub mod sleeping_barber;

use std::future::Future;

use futures::future::join_all;
use tokio::task::JoinHandle;

use crate::{Actor, Error, Result};

pub use producer_consumer::{ActorStats, ProducerConsumerReport};
pub use readers_writers::ReadersWritersReport;
pub use sleeping_barber::SleepingBarberReport;

/// Awaits every actor task, attributing a panic or cancellation to its actor.
pub(crate) async fn join_actors<R>(tasks: Vec<(Actor, JoinHandle<R>)>) -> Result<Vec<R>> {
    let (actors, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    join_all(handles)
        .await
        .into_iter()
        .zip(actors)
        .map(|(joined, actor)| joined.map_err(|source| Error::Join { actor, source }))
        .collect()
}

/// Joins `first`, raises `terminal`, then joins `second`.
///
/// The terminal signal is raised and the second stage joined even when the
/// first stage fails, so a panicked actor never strands the others.
pub(crate) async fn join_in_stages<A, B>(
    first: Vec<(Actor, JoinHandle<A>)>,
    terminal: impl FnOnce(),
    second: Vec<(Actor, JoinHandle<B>)>,
) -> Result<(Vec<A>, Vec<B>)> {
    let first = join_actors(first).await;
    terminal();
    let second = join_actors(second).await;
    Ok((first?, second?))
}

#[cfg(feature = "tracing")]
pub(crate) async fn in_span<F: Future>(pattern: &'static str, run: F) -> F::Output {
    use tracing::Instrument;
    run.instrument(tracing::info_span!("simulation", pattern))
        .await
}

#[cfg(not(feature = "tracing"))]
pub(crate) async fn in_span<F: Future>(_pattern: &'static str, run: F) -> F::Output {
    run.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundedBuffer, Role};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_actors_keeps_order() {
        let tasks = (0..4)
            .map(|id| (Actor::new(Role::Reader, id), tokio::spawn(async move { id * 2 })))
            .collect();
        assert_eq!(join_actors(tasks).await.unwrap(), vec![0, 2, 4, 6]);
    }

    #[tokio::test]
    async fn test_join_actors_names_panicked_actor() {
        let tasks = vec![
            (Actor::new(Role::Writer, 0), tokio::spawn(async {})),
            (
                Actor::new(Role::Writer, 1),
                tokio::spawn(async { panic!("writer crashed") }),
            ),
        ];

        match join_actors(tasks).await {
            Err(Error::Join { actor, source }) => {
                assert_eq!(actor.id(), 1);
                assert!(source.is_panic());
            }
            other => panic!("expected a join error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stages_raise_terminal_signal_after_panic() {
        let buffer = Arc::new(BoundedBuffer::<u8>::new(1).unwrap());
        let producers: Vec<(Actor, JoinHandle<()>)> = vec![(
            Actor::new(Role::Producer, 0),
            tokio::spawn(async { panic!("producer crashed") }),
        )];
        let consumers = vec![(
            Actor::new(Role::Consumer, 0),
            tokio::spawn({
                let buffer = buffer.clone();
                async move { buffer.take(&Actor::new(Role::Consumer, 0)).await }
            }),
        )];

        let joined = tokio::time::timeout(
            Duration::from_secs(2),
            join_in_stages(producers, || buffer.stop(), consumers),
        )
        .await
        .expect("consumer stayed blocked after a producer panicked");

        match joined {
            Err(Error::Join { actor, .. }) => assert_eq!(actor.role(), Role::Producer),
            other => panic!("expected a join error, got {other:?}"),
        }
        assert!(buffer.is_stopped());
    }
}
