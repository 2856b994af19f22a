//! Log processing for cwtail
//!
//! This crate provides stream discovery, interval polling, record decoding
//! and filtering, and the tail session that ties them together.

mod discovery;
mod filter;
mod pipeline;
mod poller;
mod session;

#[cfg(test)]
mod mock;

pub use discovery::find_latest_stream;
pub use filter::SubstringFilter;
pub use pipeline::{Processed, RecordPipeline};
pub use poller::{PollHandle, RECORD_CHANNEL_CAPACITY, StreamPoller};
pub use session::{DEFAULT_INTERVAL, TailOptions, TailSession};

// Re-export types used in our public API
pub use cwtail_types::{LogFormat, LogRecord, LogStreamHandle, TailError, Truncation};
