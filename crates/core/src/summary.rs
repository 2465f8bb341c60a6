//! Terminal call summary
//!
//! Produced exactly once per call, on every termination path (normal end,
//! error, channel loss), so downstream analytics always receive a record
//! with an accurate final status.

use crate::state::{ApiCallRecord, DtmfInput, FinalStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub ivr_id: String,
    pub ivr_name: String,
    pub extension: String,
    pub caller_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub node_history: Vec<String>,
    pub dtmf_inputs: Vec<DtmfInput>,
    pub api_calls: Vec<ApiCallRecord>,
    /// Collected variables after display-name normalization.
    pub variables: Value,
    pub final_status: FinalStatus,
    pub completed_flow: bool,
}

impl CallSummary {
    /// Call duration in whole seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }
}
