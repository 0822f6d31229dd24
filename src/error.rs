// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use crate::Actor;

#[derive(Debug)]
/// Represents errors that can occur in the syncbench engines and drivers.
///
/// A full waiting room is deliberately absent here: a client that cannot be
/// seated balks, which is reported through [`Arrival::Balked`](crate::Arrival::Balked)
/// rather than as a failure.
pub enum Error {
    /// A configuration value was rejected before any actor started
    InvalidConfiguration {
        /// Name of the offending field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },
    /// The engine's terminal signal was raised before the operation completed
    Closed {
        /// Engine that refused the operation (e.g., "buffer", "wake queue")
        engine: &'static str,
    },
    /// Error when awaiting an actor task's JoinHandle fails
    Join {
        /// The actor whose task panicked or was cancelled
        actor: Actor,
        /// The JoinError reported by tokio
        source: tokio::task::JoinError,
    },
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error was caused by an engine shutting down.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfiguration { field, reason } => {
                write!(f, "Invalid configuration for '{field}': {reason}")
            }
            Error::Closed { engine } => {
                write!(f, "The {engine} was closed before the operation completed")
            }
            Error::Join { actor, source } => {
                write!(f, "Failed to join task of {actor}: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Join { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A Result type specialized for syncbench operations.
///
/// # Examples
///
/// ```rust
/// use syncbench::{BoundedBuffer, Result};
///
/// fn make_buffer() -> Result<BoundedBuffer<u32>> {
///     BoundedBuffer::new(4)
/// }
/// # assert!(make_buffer().is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn test_invalid_configuration_display() {
        let err = Error::invalid("capacity", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'capacity': must be greater than zero"
        );
        assert!(!err.is_closed());
    }

    #[test]
    fn test_closed_display() {
        let err = Error::Closed { engine: "buffer" };
        assert!(err.is_closed());
        assert!(err.to_string().contains("buffer"));
        assert!(std::error::Error::source(&err).is_none());
    }

    #[tokio::test]
    async fn test_join_error_has_source() {
        let handle = tokio::spawn(async { panic!("boom") });
        let source = handle.await.unwrap_err();
        let err = Error::Join {
            actor: Actor::new(Role::Consumer, 3),
            source,
        };

        assert!(err.to_string().contains("consumer 3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
