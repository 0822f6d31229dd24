// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Tests for WakeQueue seating, balking, sleep accounting and shutdown

use std::sync::Arc;
use std::time::Duration;

use syncbench::{Actor, Arrival, Role, ServiceTicket, WakeQueue};
use tokio::sync::Barrier;

fn init_test_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

fn client(id: usize) -> Actor {
    Actor::new(Role::Client, id)
}

fn seated(arrival: Arrival) -> ServiceTicket {
    match arrival {
        Arrival::Seated(ticket) => ticket,
        Arrival::Balked => panic!("expected a seat"),
    }
}

#[tokio::test]
async fn test_one_arrival_too_many_balks() {
    init_test_logger();
    const SEATS: usize = 3;
    let queue = WakeQueue::new(SEATS).unwrap();

    let arrivals: Vec<_> = (0..=SEATS)
        .map(|id| queue.arrive(client(id), Duration::ZERO).unwrap())
        .collect();

    let balked = arrivals.iter().filter(|arrival| arrival.is_balked()).count();
    assert_eq!(balked, 1);
    assert!(arrivals[SEATS].is_balked());
    assert_eq!(queue.waiting(), SEATS);
    assert_eq!(queue.balked(), 1);

    // A balk is final: serving the room only handles the seated clients.
    queue.close();
    let report = queue.serve(&Actor::new(Role::Server, 0)).await;
    assert_eq!(report.served, SEATS as u64);
    assert_eq!(queue.metrics().served_count(), SEATS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_arrivals_balk_exactly_once() {
    const SEATS: usize = 3;

    for _ in 0..50 {
        let queue = Arc::new(WakeQueue::new(SEATS).unwrap());
        let start = Arc::new(Barrier::new(SEATS + 1));

        let arrivals: Vec<_> = (0..=SEATS)
            .map(|id| {
                let queue = queue.clone();
                let start = start.clone();
                tokio::spawn(async move {
                    start.wait().await;
                    queue.arrive(client(id), Duration::ZERO).unwrap()
                })
            })
            .collect();

        let mut balked = 0;
        let mut tickets = Vec::new();
        for arrival in arrivals {
            match arrival.await.unwrap() {
                Arrival::Seated(ticket) => tickets.push(ticket),
                Arrival::Balked => balked += 1,
            }
        }

        assert_eq!(balked, 1);
        assert_eq!(tickets.len(), SEATS);
        assert_eq!(queue.waiting(), SEATS);
        assert_eq!(queue.balked(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_server_records_no_overhead() {
    let queue = WakeQueue::new(4).unwrap();
    let tickets: Vec<_> = (0..4)
        .map(|id| seated(queue.arrive(client(id), Duration::from_millis(5)).unwrap()))
        .collect();
    queue.close();

    let report = queue.serve(&Actor::new(Role::Server, 0)).await;
    assert_eq!(report.served, 4);
    assert_eq!(report.slept, Duration::ZERO);
    assert_eq!(queue.metrics().snapshot().overhead, Duration::ZERO);

    for ticket in tickets {
        assert_eq!(ticket.wait().await.unwrap().server, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_server_overhead_spans_the_run() {
    let queue = Arc::new(WakeQueue::new(2).unwrap());
    let server = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.serve(&Actor::new(Role::Server, 0)).await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    queue.close();
    let report = server.await.unwrap();

    let snapshot = queue.metrics().snapshot();
    assert_eq!(report.served, 0);
    assert!(report.slept >= Duration::from_millis(150), "slept {:?}", report.slept);
    assert_eq!(snapshot.overhead, report.slept);
    assert!(snapshot.overhead <= snapshot.elapsed);
    assert!(
        snapshot.overhead.as_secs_f64() / snapshot.elapsed.as_secs_f64() > 0.7,
        "overhead {:?} of {:?}",
        snapshot.overhead,
        snapshot.elapsed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_servers_share_the_room() {
    let queue = Arc::new(WakeQueue::new(12).unwrap());
    let servers: Vec<_> = (0..3)
        .map(|id| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.serve(&Actor::new(Role::Server, id)).await })
        })
        .collect();

    let mut tickets = Vec::new();
    for id in 0..12 {
        tickets.push(seated(queue.arrive(client(id), Duration::from_millis(10)).unwrap()));
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    for ticket in tickets {
        let served = ticket.wait().await.unwrap();
        assert!(served.server < 3);
    }

    queue.close();
    let mut total = 0;
    for server in servers {
        total += server.await.unwrap().served;
    }

    assert_eq!(total, 12);
    assert_eq!(queue.metrics().served_count(), 12);
    assert_eq!(queue.balked(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_wakes_every_sleeping_server() {
    let queue = Arc::new(WakeQueue::new(1).unwrap());
    let servers: Vec<_> = (0..4)
        .map(|id| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.serve(&Actor::new(Role::Server, id)).await })
        })
        .collect();

    tokio::time::timeout(Duration::from_secs(2), async {
        while queue.sleeping_servers() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("servers never went to sleep");

    queue.close();
    for server in servers {
        let report = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("server stayed asleep after close")
            .unwrap();
        assert_eq!(report.served, 0);
    }
    assert_eq!(queue.sleeping_servers(), 0);
}

#[tokio::test]
async fn test_arrival_after_close_is_refused() {
    let queue = WakeQueue::new(2).unwrap();
    queue.close();
    let err = queue.arrive(client(0), Duration::ZERO).unwrap_err();
    assert!(err.is_closed());
    assert_eq!(queue.balked(), 0);
}
