//! Call summary sink
//!
//! Terminal summaries go somewhere; in production that is the platform
//! API's call-log endpoint. The trait exists so tests and embedders can
//! capture summaries in memory instead.

use async_trait::async_trait;
use ivr_engine_core::CallSummary;
use tracing::{debug, warn};

use crate::error::ReportError;

#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn record(&self, summary: &CallSummary) -> Result<(), ReportError>;

    /// Record and swallow failures with a warning. Summaries must never
    /// affect the call that produced them.
    async fn record_best_effort(&self, summary: &CallSummary) {
        if let Err(err) = self.record(summary).await {
            warn!(
                caller_id = %summary.caller_id,
                %err,
                "failed to deliver call summary"
            );
        }
    }
}

/// Posts each summary to `{platform_api}/api/engine/call-log`.
pub struct HttpSummarySink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSummarySink {
    pub fn new(client: reqwest::Client, platform_api_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/engine/call-log", platform_api_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SummarySink for HttpSummarySink {
    async fn record(&self, summary: &CallSummary) -> Result<(), ReportError> {
        let response = self.client.post(&self.endpoint).json(summary).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Rejected(status.as_u16()));
        }
        debug!(caller_id = %summary.caller_id, "call summary delivered");
        Ok(())
    }
}
