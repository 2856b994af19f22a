//! Scripted `LogService` used by the unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use cwtail_aws::{GroupPage, LogService, Page, PageRequest};
use cwtail_types::{LogRecord, LogStreamHandle, TailError};

/// Pauses every fetch until the test releases it
#[derive(Default)]
pub(crate) struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub(crate) struct MockService {
    streams: Vec<LogStreamHandle>,
    pages: Mutex<VecDeque<Result<Page, TailError>>>,
    requests: Mutex<Vec<PageRequest>>,
    stream_calls: AtomicUsize,
    pub gate: Option<Gate>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_streams(mut self, streams: Vec<LogStreamHandle>) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_page(self, messages: &[&str], next_token: Option<&str>) -> Self {
        let records = messages.iter().map(|m| record(m)).collect();
        self.pages.lock().unwrap().push_back(Ok(Page {
            records,
            next_token: next_token.map(str::to_string),
        }));
        self
    }

    pub fn with_failure(self, message: &'static str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .push_back(Err(TailError::remote("GetLogEvents", message)));
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Gate::default());
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.next_token.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogService for MockService {
    async fn describe_log_streams(
        &self,
        _group: &str,
        _limit: i32,
    ) -> Result<Vec<LogStreamHandle>, TailError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.streams.clone())
    }

    async fn get_log_events(&self, request: &PageRequest) -> Result<Page, TailError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Page::default()))
    }

    async fn describe_log_groups(
        &self,
        _next_token: Option<String>,
    ) -> Result<GroupPage, TailError> {
        Ok(GroupPage::default())
    }
}

pub(crate) fn record(message: &str) -> LogRecord {
    LogRecord::new(Some(Utc::now()), message)
}

pub(crate) fn stream(name: &str, last_event_ms: i64) -> LogStreamHandle {
    LogStreamHandle::new(name, DateTime::from_timestamp_millis(last_event_ms))
}
