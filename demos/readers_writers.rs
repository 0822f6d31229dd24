// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Readers/writers demo. Prompts for the number of readers and writers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use syncbench::config::{parse_actor_count, ReadersWritersConfig};
use syncbench::simulation::readers_writers;

fn prompt(lines: &mut impl BufRead, question: &str, field: &'static str) -> Result<usize> {
    print!("{question}: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    lines
        .read_line(&mut answer)
        .with_context(|| format!("failed to read the number of {field}"))?;
    parse_actor_count(&answer, field)
        .with_context(|| format!("usage: enter a positive integer for the number of {field}"))
}

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

    let (readers, writers) = {
        let mut stdin = io::stdin().lock();
        let readers = prompt(&mut stdin, "Number of readers", "readers")?;
        let writers = prompt(&mut stdin, "Number of writers", "writers")?;
        (readers, writers)
    };

    let config = ReadersWritersConfig::new(readers, writers);
    let report = readers_writers::run(&config).await?;
    println!("\n{report}");

    anyhow::ensure!(
        report.books == config.expected_books(),
        "expected {} books, found {}",
        config.expected_books(),
        report.books
    );
    Ok(())
}
