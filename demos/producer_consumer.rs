// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use syncbench::config::ProducerConsumerConfig;
use syncbench::simulation::producer_consumer;

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "tracing")]
    {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(false)
            .init();
    }

    #[cfg(not(feature = "tracing"))]
    {
        env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = ProducerConsumerConfig::default();
    println!(
        "=== Producer/Consumer: {} producers x {} items, {} consumers, buffer of {} ===",
        config.producers, config.items_per_producer, config.consumers, config.capacity
    );

    let report = producer_consumer::run(&config).await?;
    println!("\n{report}");

    anyhow::ensure!(
        report.consumed == config.total_items(),
        "expected {} items consumed, got {}",
        config.total_items(),
        report.consumed
    );
    Ok(())
}
