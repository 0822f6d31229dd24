// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Duration;

use crate::Role;

/// Served count and average wait for a single role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleStats {
    pub role: Role,
    pub count: u64,
    pub avg_wait: Duration,
}

/// Immutable snapshot of an engine's metrics at the end of a run.
///
/// Produced by [`MetricsAggregator::snapshot`](crate::MetricsAggregator::snapshot)
/// once all actor tasks have been joined. The `Display` implementation renders
/// the final metrics block:
///
/// ```text
/// === METRICS ===
/// throughput: 1.842 ops/sec
/// average wait: 0.412311 s
/// fairness: 0.203117 s (stddev of waits)
/// sync overhead: 3.004821 s
/// ```
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct MetricsSnapshot {
    /// Number of wait samples recorded (one per served actor).
    pub served_count: u64,

    /// Wall time the throughput was computed over.
    pub elapsed: Duration,

    /// Served actors per second of wall time.
    pub throughput: f64,

    /// Mean wait per served actor.
    ///
    /// Returns `Duration::ZERO` if nothing was served.
    pub avg_wait: Duration,

    /// Population standard deviation of the waits. Lower is fairer.
    ///
    /// Zero when one or fewer actors were served.
    pub fairness: Duration,

    /// Total time servers and waiters spent blocked on a wake signal.
    pub overhead: Duration,

    /// Fraction of samples whose wait exceeded
    /// [`CONTENTION_THRESHOLD`](crate::metrics::CONTENTION_THRESHOLD).
    pub contention_ratio: f64,

    /// Per-role breakdown, only for roles that recorded samples.
    pub roles: Vec<RoleStats>,
}

impl MetricsSnapshot {
    /// Breakdown for `role`, if it recorded any samples.
    pub fn role(&self, role: Role) -> Option<&RoleStats> {
        self.roles.iter().find(|stats| stats.role == role)
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            served_count: 0,
            elapsed: Duration::ZERO,
            throughput: 0.0,
            avg_wait: Duration::ZERO,
            fairness: Duration::ZERO,
            overhead: Duration::ZERO,
            contention_ratio: 0.0,
            roles: Vec::new(),
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== METRICS ===")?;
        writeln!(f, "throughput: {:.3} ops/sec", self.throughput)?;
        writeln!(f, "average wait: {:.6} s", self.avg_wait.as_secs_f64())?;
        writeln!(
            f,
            "fairness: {:.6} s (stddev of waits)",
            self.fairness.as_secs_f64()
        )?;
        write!(f, "sync overhead: {:.6} s", self.overhead.as_secs_f64())?;
        for stats in &self.roles {
            write!(
                f,
                "\n  {}: {} served, average wait {:.6} s",
                stats.role,
                stats.count,
                stats.avg_wait.as_secs_f64()
            )?;
        }
        Ok(())
    }
}
