use async_trait::async_trait;

use cwtail_types::{LogRecord, LogStreamHandle, TailError};

/// Maximum number of events requested per `get_log_events` page
pub const GET_LOG_EVENTS_LIMIT: i32 = 10_000;

/// Page size used when listing log groups
pub const DESCRIBE_LOG_GROUPS_LIMIT: i32 = 50;

/// Parameters of a single `get_log_events` call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub group: String,
    pub stream: String,

    /// Epoch milliseconds; only honoured while `next_token` is unset
    pub start_time: i64,

    pub limit: i32,

    /// Oldest-first ordering
    pub start_from_head: bool,

    /// Continuation token from the previous page
    pub next_token: Option<String>,
}

impl PageRequest {
    pub fn new(group: impl Into<String>, stream: impl Into<String>, start_time: i64) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
            start_time,
            limit: GET_LOG_EVENTS_LIMIT,
            start_from_head: true,
            next_token: None,
        }
    }
}

/// One page of log events
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub records: Vec<LogRecord>,
    pub next_token: Option<String>,
}

/// One page of log group names
#[derive(Clone, Debug, Default)]
pub struct GroupPage {
    pub names: Vec<String>,
    pub next_token: Option<String>,
}

/// Remote log service operations used by cwtail
#[async_trait]
pub trait LogService: Send + Sync {
    /// Streams of `group`, most recent last event first, at most `limit` of them
    async fn describe_log_streams(
        &self,
        group: &str,
        limit: i32,
    ) -> Result<Vec<LogStreamHandle>, TailError>;

    /// Fetch the page of events addressed by `request`
    async fn get_log_events(&self, request: &PageRequest) -> Result<Page, TailError>;

    /// Fetch one page of log group names
    async fn describe_log_groups(
        &self,
        next_token: Option<String>,
    ) -> Result<GroupPage, TailError>;
}

/// List every log group, following continuation tokens until exhausted
pub async fn list_log_groups(service: &dyn LogService) -> Result<Vec<String>, TailError> {
    let mut groups = Vec::new();
    let mut next_token = None;

    loop {
        let page = service.describe_log_groups(next_token).await?;
        groups.extend(page.names);

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    Ok(groups)
}
