use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use cwtail_types::{LogFormat, LogRecord, TailError, Truncation};

use crate::filter::SubstringFilter;

/// `<date> <time> <zone> <tag> <json>`, e.g.
/// `2018-04-12 06:05:50.000000000 +0000 app {"log":"hello"}`
static CONTAINER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\S+\s+\S+\s+\S+\s+\S+\s+(\S.*?)\s*$")
        .expect("container line pattern is valid")
});

#[derive(Deserialize)]
struct ContainerPayload {
    #[serde(default)]
    log: Option<String>,
}

/// The `log` field of a container runtime line, `None` if the line does not
/// have the expected shape
fn container_log(raw: &str) -> Option<String> {
    let caps = CONTAINER_LINE.captures(raw)?;
    let payload: ContainerPayload = serde_json::from_str(&caps[1]).ok()?;
    payload.log
}

/// Result of running a record through the pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Processed {
    /// Text to print as one line
    Display(String),
    /// Dropped by the decoder or the filter
    Suppressed,
}

/// Decode, filter and format records for display
#[derive(Clone, Debug, Default)]
pub struct RecordPipeline {
    format: LogFormat,
    filter: SubstringFilter,
    truncation: Truncation,
}

impl RecordPipeline {
    pub fn new(format: LogFormat, filter: SubstringFilter, truncation: Truncation) -> Self {
        Self {
            format,
            filter,
            truncation,
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn filter(&self) -> &SubstringFilter {
        &self.filter
    }

    /// Fail if the pipeline asks for a display mode that does not exist yet
    pub fn check_supported(&self) -> Result<(), TailError> {
        match self.truncation {
            Truncation::Truncated => Ok(()),
            Truncation::Full => Err(TailError::UnsupportedOption("no-trunc")),
        }
    }

    /// Run one record through decode, filter and truncation, in that order
    pub fn process(&self, record: &LogRecord) -> Result<Processed, TailError> {
        let Some(text) = self.decode(&record.message) else {
            return Ok(Processed::Suppressed);
        };

        if !self.filter.matches(&text) {
            return Ok(Processed::Suppressed);
        }

        self.check_supported()?;

        Ok(Processed::Display(
            text.trim_end_matches(['\r', '\n']).to_string(),
        ))
    }

    fn decode(&self, message: &str) -> Option<String> {
        match self.format {
            LogFormat::Raw => Some(message.to_string()),
            LogFormat::Container => {
                let log = container_log(message);
                if log.is_none() {
                    debug!(raw = message, "dropping record that is not a container log line");
                }
                log
            }
        }
    }
}
