use std::convert::Infallible;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use cwtail_aws::LogService;
use cwtail_types::TailError;

use crate::discovery::find_latest_stream;
use crate::pipeline::{Processed, RecordPipeline};
use crate::poller::{PollHandle, StreamPoller, first_tick};

/// Default poll interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// What to tail and how to show it
#[derive(Clone, Debug)]
pub struct TailOptions {
    pub group: String,
    pub interval: Duration,
    pub pipeline: RecordPipeline,
}

impl TailOptions {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            interval: DEFAULT_INTERVAL,
            pipeline: RecordPipeline::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_pipeline(mut self, pipeline: RecordPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Tails the latest stream of a log group into a line sink
pub struct TailSession {
    service: Arc<dyn LogService>,
    options: TailOptions,
}

impl TailSession {
    pub fn new(service: Arc<dyn LogService>, options: TailOptions) -> Self {
        Self { service, options }
    }

    /// Run until cancelled or a fatal error occurs, returning the reason
    pub async fn run<W>(&self, cancel: CancellationToken, sink: &mut W) -> TailError
    where
        W: Write + ?Sized,
    {
        let Err(e) = self.tail(cancel, sink).await;
        e
    }

    async fn tail<W>(
        &self,
        cancel: CancellationToken,
        sink: &mut W,
    ) -> Result<Infallible, TailError>
    where
        W: Write + ?Sized,
    {
        let pipeline = &self.options.pipeline;
        pipeline.check_supported()?;
        first_tick(self.options.interval)?;

        let stream = find_latest_stream(self.service.as_ref(), &self.options.group).await?;
        info!(
            group = %self.options.group,
            stream = %stream.name,
            format = %pipeline.format(),
            filter = pipeline.filter().pattern(),
            "tailing log stream"
        );

        // Stops the poller when this session returns for any reason
        let poll_cancel = cancel.child_token();
        let _stop_poller = poll_cancel.clone().drop_guard();

        let PollHandle {
            mut records,
            mut errors,
            ..
        } = StreamPoller::new(Arc::clone(&self.service)).start(
            poll_cancel,
            &self.options.group,
            &stream.name,
            self.options.interval,
        );

        loop {
            tokio::select! {
                // Records fetched before the poller stopped are still shown
                biased;

                Some(record) = records.recv() => {
                    if let Processed::Display(line) = pipeline.process(&record)? {
                        if !line.is_empty() {
                            writeln!(sink, "{line}")?;
                        }
                    }
                }

                result = &mut errors => {
                    return Err(result.unwrap_or(TailError::PollerExited));
                }
            }
        }
    }
}
