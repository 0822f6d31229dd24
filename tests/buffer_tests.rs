// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Tests for BoundedBuffer ordering, occupancy and shutdown

use std::sync::Arc;
use std::time::Duration;

use syncbench::{Actor, BoundedBuffer, Item, Role};

fn init_test_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_items_leave_in_insertion_order() {
    init_test_logger();
    let buffer = Arc::new(BoundedBuffer::new(3).unwrap());

    let producer = {
        let buffer = buffer.clone();
        tokio::spawn(async move {
            let actor = Actor::new(Role::Producer, 0);
            let mut peak = 0;
            for seq in 0..200 {
                peak = peak.max(buffer.put(&actor, Item::new(0, seq)).await.unwrap());
                if seq % 17 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            peak
        })
    };

    let consumer = {
        let buffer = buffer.clone();
        tokio::spawn(async move {
            let actor = Actor::new(Role::Consumer, 0);
            let mut taken = Vec::new();
            while let Some(item) = buffer.take(&actor).await {
                assert!(buffer.len() <= buffer.capacity());
                taken.push(item.seq);
            }
            taken
        })
    };

    let peak = producer.await.unwrap();
    buffer.stop();
    let taken = consumer.await.unwrap();

    assert!(peak <= 3, "occupancy reached {peak}");
    assert_eq!(taken, (0..200).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_producer_keeps_its_order() {
    let buffer = Arc::new(BoundedBuffer::new(2).unwrap());

    let producers: Vec<_> = (0..4)
        .map(|id| {
            let buffer = buffer.clone();
            tokio::spawn(async move {
                let actor = Actor::new(Role::Producer, id);
                for seq in 0..30 {
                    buffer.put(&actor, Item::new(id, seq)).await.unwrap();
                }
            })
        })
        .collect();

    let consumer = {
        let buffer = buffer.clone();
        tokio::spawn(async move {
            let actor = Actor::new(Role::Consumer, 0);
            let mut taken = Vec::new();
            while let Some(item) = buffer.take(&actor).await {
                taken.push(item);
            }
            taken
        })
    };

    for producer in producers {
        producer.await.unwrap();
    }
    buffer.stop();
    let taken = consumer.await.unwrap();

    assert_eq!(taken.len(), 120);
    for id in 0..4 {
        let seqs: Vec<_> = taken
            .iter()
            .filter(|item| item.producer == id)
            .map(|item| item.seq)
            .collect();
        assert_eq!(seqs, (0..30).collect::<Vec<_>>(), "producer {id}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_served_count_matches_items_consumed() {
    let buffer = Arc::new(BoundedBuffer::new(4).unwrap());

    let producers: Vec<_> = (0..4)
        .map(|id| {
            let buffer = buffer.clone();
            tokio::spawn(async move {
                let actor = Actor::new(Role::Producer, id);
                for seq in 0..25 {
                    buffer.put(&actor, Item::new(id, seq)).await.unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..3)
        .map(|id| {
            let buffer = buffer.clone();
            tokio::spawn(async move {
                let actor = Actor::new(Role::Consumer, id);
                let mut count = 0;
                while buffer.take(&actor).await.is_some() {
                    count += 1;
                }
                count
            })
        })
        .collect();

    for producer in producers {
        producer.await.unwrap();
    }
    buffer.stop();

    let mut consumed = 0;
    for consumer in consumers {
        consumed += consumer.await.unwrap();
    }

    assert_eq!(consumed, 100);
    assert_eq!(buffer.consumed().served_count(), 100);
    assert_eq!(buffer.produced().served_count(), 100);

    let snapshot = buffer.consumed().snapshot();
    assert_eq!(snapshot.served_count, 100);
    assert_eq!(snapshot.role(Role::Consumer).map(|stats| stats.count), Some(100));
    assert!(snapshot.role(Role::Producer).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_releases_every_waiting_consumer() {
    let buffer = Arc::new(BoundedBuffer::<Item>::new(1).unwrap());

    let consumers: Vec<_> = (0..5)
        .map(|id| {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.take(&Actor::new(Role::Consumer, id)).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(30)).await;
    buffer.stop();

    for consumer in consumers {
        let taken = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .expect("consumer stayed blocked after stop")
            .unwrap();
        assert!(taken.is_none());
    }
    assert_eq!(buffer.consumed().served_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_releases_blocked_producer() {
    let buffer = Arc::new(BoundedBuffer::new(1).unwrap());
    let actor = Actor::new(Role::Producer, 0);
    buffer.put(&actor, Item::new(0, 0)).await.unwrap();

    let blocked = {
        let buffer = buffer.clone();
        tokio::spawn(async move { buffer.put(&actor, Item::new(0, 1)).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    buffer.stop();

    let result = tokio::time::timeout(Duration::from_secs(2), blocked)
        .await
        .expect("producer stayed blocked after stop")
        .unwrap();
    assert!(result.unwrap_err().is_closed());

    // The item already inside is still handed out.
    let consumer = Actor::new(Role::Consumer, 0);
    assert_eq!(buffer.take(&consumer).await, Some(Item::new(0, 0)));
    assert_eq!(buffer.take(&consumer).await, None);
}
