use tracing::info;

use cwtail_aws::LogService;
use cwtail_types::{LogStreamHandle, TailError};

/// Find the stream in `group` with the most recent event
pub async fn find_latest_stream(
    service: &dyn LogService,
    group: &str,
) -> Result<LogStreamHandle, TailError> {
    if group.is_empty() {
        return Err(TailError::InvalidParameter("log group name is empty"));
    }

    // The service orders by last event time, newest first, so one result is enough
    let streams = service.describe_log_streams(group, 1).await?;

    let latest = streams
        .into_iter()
        .filter(|s| !s.name.is_empty())
        .max_by_key(|s| s.last_event)
        .ok_or_else(|| TailError::NotFound(format!("no log streams in log group {group}")))?;

    info!(group, stream = %latest.name, "found latest log stream");
    Ok(latest)
}
