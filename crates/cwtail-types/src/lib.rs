//! Shared types for cwtail
//!
//! This crate contains data structures and the error type used across
//! multiple cwtail crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Boxed cause carried by [`TailError::RemoteCallFailed`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Log Service Types
// ============================================================================

/// A log stream within a log group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogStreamHandle {
    pub name: String,

    /// Time of the most recent event ingested into the stream
    pub last_event: Option<DateTime<Utc>>,
}

impl LogStreamHandle {
    pub fn new(name: impl Into<String>, last_event: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            last_event,
        }
    }
}

/// A single log event as returned by the log service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Event time reported by the producer
    pub timestamp: Option<DateTime<Utc>>,

    /// Time the service received the event
    pub ingested_at: Option<DateTime<Utc>>,

    /// Original raw message
    pub message: String,
}

impl LogRecord {
    pub fn new(timestamp: Option<DateTime<Utc>>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            ingested_at: None,
            message: message.into(),
        }
    }
}

// ============================================================================
// Display Options
// ============================================================================

/// How raw messages are decoded before filtering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogFormat {
    /// Message passes through unchanged
    #[default]
    Raw,
    /// Container runtime line: `<date> <time> <zone> <tag> <json>`
    Container,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Container => "container",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "raw" => Ok(Self::Raw),
            "container" | "container-log" | "ecs" | "docker" => Ok(Self::Container),
            other => Err(format!(
                "unknown log format '{other}' (expected raw, container, ecs or docker)"
            )),
        }
    }
}

impl TryFrom<String> for LogFormat {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message length policy applied after filtering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Truncation {
    /// Show the decoded text only
    #[default]
    Truncated,
    /// Show the whole original message (not available yet)
    Full,
}

impl Truncation {
    pub fn from_no_trunc(no_trunc: bool) -> Self {
        if no_trunc { Self::Full } else { Self::Truncated }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Terminal errors surfaced to the caller of a tail session
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{operation} failed")]
    RemoteCallFailed {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("option not implemented yet: {0}")]
    UnsupportedOption(&'static str),

    #[error("failed to write log output")]
    Output(#[from] std::io::Error),

    #[error("log poller exited without reporting a reason")]
    PollerExited,
}

impl TailError {
    /// Wrap a failure from the remote log service
    pub fn remote<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::RemoteCallFailed {
            operation,
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
