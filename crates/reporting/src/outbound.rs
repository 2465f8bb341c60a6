//! Outbound call tracking
//!
//! Originated calls carry a correlation id in the `OUTBOUND_CALL_ID`
//! channel variable. When present, the engine keeps the platform's
//! tracking record current: `answered` once the leg picks up, then one
//! terminal transition when the flow ends. Both updates are best effort.

use chrono::Utc;
use ivr_engine_core::{CallSummary, FinalStatus};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ReportError;

pub struct OutboundCallTracker {
    client: reqwest::Client,
    endpoint: String,
    call_id: String,
}

impl OutboundCallTracker {
    pub fn new(client: reqwest::Client, platform_api_url: &str, call_id: &str) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/api/engine/outbound-call/{}",
                platform_api_url.trim_end_matches('/'),
                call_id
            ),
            call_id: call_id.to_string(),
        }
    }

    /// Mark the tracked call as answered.
    pub async fn answered(&self, channel_id: &str) {
        let body = json!({
            "status": "answered",
            "answerTime": Utc::now(),
            "channelId": channel_id,
        });
        self.put(body).await;
    }

    /// Record the terminal transition once the flow has ended.
    pub async fn finished(&self, summary: &CallSummary) {
        self.put(final_payload(summary)).await;
    }

    async fn put(&self, body: Value) {
        match self.update(&body).await {
            Ok(()) => debug!(call_id = %self.call_id, "outbound call record updated"),
            Err(err) => warn!(
                call_id = %self.call_id,
                %err,
                "failed to update outbound call record"
            ),
        }
    }

    async fn update(&self, body: &Value) -> Result<(), ReportError> {
        let response = self.client.put(&self.endpoint).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Rejected(status.as_u16()));
        }
        Ok(())
    }

    #[cfg(test)]
    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn terminal_status(status: FinalStatus) -> &'static str {
    match status {
        FinalStatus::CallerHangupEarly => "caller_hangup",
        FinalStatus::Error => "failed",
        _ => "completed",
    }
}

fn final_payload(summary: &CallSummary) -> Value {
    json!({
        "status": terminal_status(summary.final_status),
        "endTime": summary.end_time,
        "duration": summary.duration_secs(),
        "result": summary.final_status,
        "dtmfInputs": summary.dtmf_inputs,
        "hangupCause": if summary.completed_flow { "flow" } else { "caller_or_error" },
    })
}
