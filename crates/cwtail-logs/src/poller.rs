use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cwtail_aws::{LogService, PageRequest};
use cwtail_types::{LogRecord, TailError};

/// Capacity of the record channel; a full channel stalls the next fetch
pub const RECORD_CHANNEL_CAPACITY: usize = 100;

/// Receiving ends of a running poller
pub struct PollHandle {
    /// Records in fetch order
    pub records: mpsc::Receiver<LogRecord>,

    /// The single terminal error of the poller
    pub errors: oneshot::Receiver<TailError>,

    /// Background task, `None` when the input was rejected up front
    pub task: Option<JoinHandle<()>>,
}

/// Starts interval-driven pollers against a [`LogService`]
#[derive(Clone)]
pub struct StreamPoller {
    service: Arc<dyn LogService>,
    capacity: usize,
}

impl StreamPoller {
    pub fn new(service: Arc<dyn LogService>) -> Self {
        Self {
            service,
            capacity: RECORD_CHANNEL_CAPACITY,
        }
    }

    /// Override the record channel capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Start polling `stream` in `group` every `interval`
    ///
    /// Records fetched since now are sent on `records` oldest first. The poller
    /// stops on cancellation or on the first failed fetch and reports why on
    /// `errors`. Invalid input is reported on `errors` without starting a task.
    pub fn start(
        &self,
        cancel: CancellationToken,
        group: &str,
        stream: &str,
        interval: Duration,
    ) -> PollHandle {
        let (records_tx, records) = mpsc::channel(self.capacity);
        let (errors_tx, errors) = oneshot::channel();

        let start_at = match validate(group, stream, interval) {
            Ok(start_at) => start_at,
            Err(e) => {
                // Receiver is still held by the returned handle
                let _ = errors_tx.send(e);
                return PollHandle {
                    records,
                    errors,
                    task: None,
                };
            }
        };

        let request = PageRequest::new(group, stream, Utc::now().timestamp_millis());
        let ticker = {
            let mut ticker = tokio::time::interval_at(start_at, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        };

        let poll_loop = PollLoop {
            service: Arc::clone(&self.service),
            request,
            ticker,
            records: records_tx,
        };
        let task = tokio::spawn(poll_loop.run(cancel, errors_tx));

        PollHandle {
            records,
            errors,
            task: Some(task),
        }
    }
}

fn validate(group: &str, stream: &str, interval: Duration) -> Result<Instant, TailError> {
    if group.is_empty() {
        return Err(TailError::InvalidParameter("log group name is empty"));
    }
    if stream.is_empty() {
        return Err(TailError::InvalidParameter("log stream name is empty"));
    }
    first_tick(interval)
}

/// Deadline of the first fetch for a poll interval starting now
pub(crate) fn first_tick(interval: Duration) -> Result<Instant, TailError> {
    if interval.is_zero() {
        return Err(TailError::InvalidParameter("poll interval must be positive"));
    }
    Instant::now()
        .checked_add(interval)
        .ok_or(TailError::InvalidParameter("poll interval is too large"))
}

/// State owned by the polling task
struct PollLoop {
    service: Arc<dyn LogService>,

    /// Carries the continuation token between ticks
    request: PageRequest,

    ticker: Interval,
    records: mpsc::Sender<LogRecord>,
}

/// Why a fetch cycle ended the loop
enum Stop {
    Failed(TailError),
    ReceiverGone,
}

impl PollLoop {
    async fn run(mut self, cancel: CancellationToken, errors: oneshot::Sender<TailError>) {
        let reason = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break TailError::Cancelled,

                _ = self.ticker.tick() => {
                    match self.fetch().await {
                        Ok(()) => {}
                        Err(Stop::Failed(e)) => break e,
                        Err(Stop::ReceiverGone) => {
                            debug!(stream = %self.request.stream, "record receiver dropped, stopping poller");
                            return;
                        }
                    }
                }
            }
        };

        match &reason {
            TailError::Cancelled => debug!(stream = %self.request.stream, "poller cancelled"),
            e => warn!(stream = %self.request.stream, error = %e, "poller stopped"),
        }
        let _ = errors.send(reason);
    }

    /// Fetch one page, forward its records and advance the token
    async fn fetch(&mut self) -> Result<(), Stop> {
        let page = self
            .service
            .get_log_events(&self.request)
            .await
            .map_err(Stop::Failed)?;

        debug!(
            stream = %self.request.stream,
            count = page.records.len(),
            "received log page"
        );

        for record in page.records {
            self.records
                .send(record)
                .await
                .map_err(|_| Stop::ReceiverGone)?;
        }

        self.request.next_token = page.next_token;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockService;

    const INTERVAL: Duration = Duration::from_secs(3);

    async fn drain(handle: &mut PollHandle) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(record) = handle.records.recv().await {
            messages.push(record.message);
        }
        messages
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_are_fetched_in_token_order() {
        let service = Arc::new(
            MockService::new()
                .with_page(&["a1", "a2"], Some("t1"))
                .with_page(&[], Some("t2"))
                .with_page(&["c1", "c2", "c3"], Some("t3"))
                .with_failure("throttled"),
        );
        let poller = StreamPoller::new(service.clone());
        let mut handle = poller.start(CancellationToken::new(), "/ecs/web", "web/abc", INTERVAL);

        let messages = drain(&mut handle).await;
        let err = handle.errors.await.unwrap();

        assert_eq!(messages, vec!["a1", "a2", "c1", "c2", "c3"]);
        assert!(matches!(err, TailError::RemoteCallFailed { .. }));
        assert_eq!(
            service.tokens(),
            vec![
                None,
                Some("t1".to_string()),
                Some("t2".to_string()),
                Some("t3".to_string()),
            ]
        );

        // Stopped after the failed fetch
        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(service.fetch_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_request_reads_from_head() {
        let service = Arc::new(MockService::new().with_failure("denied"));
        let before = Utc::now().timestamp_millis();
        let handle = StreamPoller::new(service.clone()).start(
            CancellationToken::new(),
            "/ecs/web",
            "web/abc",
            INTERVAL,
        );
        handle.errors.await.unwrap();

        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].group, "/ecs/web");
        assert_eq!(requests[0].stream, "web/abc");
        assert_eq!(requests[0].limit, 10_000);
        assert!(requests[0].start_from_head);
        assert!(requests[0].start_time >= before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_is_stored() {
        let service = Arc::new(
            MockService::new()
                .with_page(&["a"], Some("t1"))
                .with_page(&["b"], None)
                .with_failure("boom"),
        );
        let handle = StreamPoller::new(service.clone()).start(
            CancellationToken::new(),
            "/ecs/web",
            "web/abc",
            INTERVAL,
        );
        let _ = handle.errors.await;

        assert_eq!(
            service.tokens(),
            vec![None, Some("t1".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_invalid_input_fails_without_fetching() {
        let service = Arc::new(MockService::new());
        let poller = StreamPoller::new(service.clone());

        let cases = [
            ("", "web/abc", INTERVAL),
            ("/ecs/web", "", INTERVAL),
            ("/ecs/web", "web/abc", Duration::ZERO),
            ("/ecs/web", "web/abc", Duration::MAX),
            ("/ecs/web", "web/abc", Duration::from_secs(u64::MAX)),
        ];
        for (group, stream, interval) in cases {
            let mut handle = poller.start(CancellationToken::new(), group, stream, interval);
            assert!(handle.task.is_none());
            assert!(matches!(
                handle.errors.try_recv(),
                Ok(TailError::InvalidParameter(_))
            ));
            assert!(handle.records.recv().await.is_none());
        }
        assert_eq!(service.fetch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick() {
        let service = Arc::new(MockService::new().with_page(&["a"], Some("t1")));
        let cancel = CancellationToken::new();
        let handle = StreamPoller::new(service.clone()).start(
            cancel.clone(),
            "/ecs/web",
            "web/abc",
            INTERVAL,
        );

        cancel.cancel();
        let err = handle.errors.await.unwrap();
        assert!(err.is_cancelled());

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(service.fetch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_fetch_reports_once() {
        let service = Arc::new(MockService::new().gated().with_page(&["a"], Some("t1")));
        let cancel = CancellationToken::new();
        let mut handle = StreamPoller::new(service.clone()).start(
            cancel.clone(),
            "/ecs/web",
            "web/abc",
            INTERVAL,
        );

        let gate = service.gate.as_ref().unwrap();
        gate.entered.notified().await;
        cancel.cancel();
        gate.release.notify_one();

        // The in-flight page is still delivered
        assert_eq!(handle.records.recv().await.unwrap().message, "a");
        assert!(handle.errors.await.unwrap().is_cancelled());
        handle.task.take().unwrap().await.unwrap();
        assert!(handle.records.recv().await.is_none());

        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(service.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_channel_delays_next_fetch() {
        let service = Arc::new(
            MockService::new()
                .with_page(&["a", "b", "c"], Some("t1"))
                .with_page(&["d"], Some("t2")),
        );
        let mut handle = StreamPoller::new(service.clone())
            .with_capacity(1)
            .start(CancellationToken::new(), "/ecs/web", "web/abc", INTERVAL);

        // Nobody reads, so the first page blocks on the second record
        tokio::time::sleep(INTERVAL * 4).await;
        assert_eq!(service.fetch_calls(), 1);

        assert_eq!(handle.records.recv().await.unwrap().message, "a");
        assert_eq!(handle.records.recv().await.unwrap().message, "b");
        assert_eq!(handle.records.recv().await.unwrap().message, "c");
        assert_eq!(handle.records.recv().await.unwrap().message, "d");
        assert_eq!(service.fetch_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_stops_poller() {
        let service = Arc::new(MockService::new().with_page(&["a", "b"], Some("t1")));
        let PollHandle {
            records,
            errors,
            task,
        } = StreamPoller::new(service.clone())
            .with_capacity(1)
            .start(CancellationToken::new(), "/ecs/web", "web/abc", INTERVAL);
        drop(records);

        task.unwrap().await.unwrap();
        assert!(errors.await.is_err());
        assert_eq!(service.fetch_calls(), 1);
    }
}
