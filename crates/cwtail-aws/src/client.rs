//! CloudWatch Logs client

use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudwatchlogs::types::{OrderBy, OutputLogEvent};
use chrono::{DateTime, Utc};
use tracing::debug;

use cwtail_types::{LogRecord, LogStreamHandle, TailError};

use crate::service::{DESCRIBE_LOG_GROUPS_LIMIT, GroupPage, LogService, Page, PageRequest};

/// Connection settings for [`CloudWatchLogsClient`]
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    /// Region override; falls back to the SDK's default provider chain
    pub region: Option<String>,

    /// Upper bound for a single API operation, retries included
    pub operation_timeout: Option<Duration>,
}

/// CloudWatch Logs client wrapper
#[derive(Clone, Debug)]
pub struct CloudWatchLogsClient {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl CloudWatchLogsClient {
    /// Load shared AWS configuration and build a client
    pub async fn new(options: &ClientOptions) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Some(timeout) = options.operation_timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            );
        }

        let config = loader.load().await;
        Self {
            client: aws_sdk_cloudwatchlogs::Client::new(&config),
        }
    }

    fn to_record(event: &OutputLogEvent) -> LogRecord {
        LogRecord {
            timestamp: event.timestamp().and_then(from_millis),
            ingested_at: event.ingestion_time().and_then(from_millis),
            message: event.message().unwrap_or_default().to_string(),
        }
    }
}

#[async_trait]
impl LogService for CloudWatchLogsClient {
    async fn describe_log_streams(
        &self,
        group: &str,
        limit: i32,
    ) -> Result<Vec<LogStreamHandle>, TailError> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(limit)
            .send()
            .await
            .map_err(|e| TailError::remote("DescribeLogStreams", e))?;

        Ok(output
            .log_streams()
            .iter()
            .filter_map(|stream| {
                let name = stream.log_stream_name()?;
                Some(LogStreamHandle::new(
                    name,
                    stream.last_event_timestamp().and_then(from_millis),
                ))
            })
            .collect())
    }

    async fn get_log_events(&self, request: &PageRequest) -> Result<Page, TailError> {
        let output = self
            .client
            .get_log_events()
            .log_group_name(&request.group)
            .log_stream_name(&request.stream)
            .start_time(request.start_time)
            .limit(request.limit)
            .start_from_head(request.start_from_head)
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .map_err(|e| TailError::remote("GetLogEvents", e))?;

        let records: Vec<LogRecord> = output.events().iter().map(Self::to_record).collect();
        debug!(
            group = %request.group,
            stream = %request.stream,
            count = records.len(),
            "fetched log events"
        );

        Ok(Page {
            records,
            next_token: output.next_forward_token().map(str::to_string),
        })
    }

    async fn describe_log_groups(
        &self,
        next_token: Option<String>,
    ) -> Result<GroupPage, TailError> {
        let output = self
            .client
            .describe_log_groups()
            .limit(DESCRIBE_LOG_GROUPS_LIMIT)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| TailError::remote("DescribeLogGroups", e))?;

        Ok(GroupPage {
            names: output
                .log_groups()
                .iter()
                .filter_map(|g| g.log_group_name().map(str::to_string))
                .collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
