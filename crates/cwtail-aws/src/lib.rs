//! CloudWatch Logs client for cwtail
//!
//! This crate provides the `LogService` abstraction over the remote log
//! service and its AWS SDK implementation.

mod client;
mod service;

pub use client::{ClientOptions, CloudWatchLogsClient};
pub use service::{
    DESCRIBE_LOG_GROUPS_LIMIT, GET_LOG_EVENTS_LIMIT, GroupPage, LogService, Page, PageRequest,
    list_log_groups,
};

// Re-export types that are used in our public API
pub use cwtail_types::{LogRecord, LogStreamHandle, TailError};
