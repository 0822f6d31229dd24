// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use syncbench::config::SleepingBarberConfig;
use syncbench::simulation::sleeping_barber;

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

    let config = SleepingBarberConfig::default();
    println!(
        "=== Sleeping Barber: {} barber(s), {} seats, {} clients ===",
        config.barbers, config.seats, config.clients
    );

    let report = sleeping_barber::run(&config).await?;
    println!("\n{report}");
    Ok(())
}
