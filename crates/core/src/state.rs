//! Per-call execution state
//!
//! One `ExecutionState` exists per call, owned by that call's dispatcher and
//! mutated only by its own node handlers. Nothing here is shared between
//! calls, which is what makes the engine lock-free: isolation, not
//! synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Terminal classification of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// Still executing (never appears in a summary).
    InProgress,
    /// The flow reached an explicit hangup node.
    FlowCompleted,
    /// The flow ran off the end of the graph without an explicit hangup.
    FlowEnded,
    /// The caller dropped the leg before the flow finished.
    CallerHangupEarly,
    /// An unroutable handler failure ended the call.
    Error,
}

/// One collected DTMF entry, recorded per `collect` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtmfInput {
    pub node: String,
    pub digits: String,
    pub timestamp: DateTime<Utc>,
}

/// One `api_call` attempt, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCallRecord {
    pub node: String,
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Mutable runtime state of a single call.
#[derive(Debug)]
pub struct ExecutionState {
    /// The call's variable bag. Seeded with caller/channel/ivr identity,
    /// extended by `collect`, `set_variable` and `api_call` nodes.
    pub variables: HashMap<String, Value>,
    /// Every node id visited, in order.
    pub node_history: Vec<String>,
    /// DTMF collected per node, in order.
    pub dtmf_inputs: Vec<DtmfInput>,
    /// Every external API attempt, in order.
    pub api_calls: Vec<ApiCallRecord>,
    /// Per-node retry counters (play prompts and collect re-visits).
    pub retry_counts: HashMap<String, u32>,
    /// Digits queued by a barged-in playback, consumed FIFO by the next
    /// node that wants input. Never crosses call boundaries.
    pub pending_dtmf: VecDeque<char>,
    /// Id of the node currently executing.
    pub current_node: Option<String>,
    pub final_status: FinalStatus,
    /// Set when an explicit hangup node was reached.
    pub completed_flow: bool,
    /// Set when a transfer handed the leg back to the dialplan; the
    /// dispatcher must not hang up a transferred channel.
    pub transferred: bool,
    pub started_at: DateTime<Utc>,
}

impl ExecutionState {
    /// Create the state for one call, seeding the variable bag with the
    /// identity variables every flow can interpolate.
    pub fn new(
        caller_id: &str,
        channel_id: &str,
        ivr_id: &str,
        ivr_name: &str,
        extension: &str,
    ) -> Self {
        let mut variables = HashMap::new();
        variables.insert("caller_id".into(), Value::String(caller_id.into()));
        variables.insert("channel_id".into(), Value::String(channel_id.into()));
        variables.insert("ivr_id".into(), Value::String(ivr_id.into()));
        variables.insert("ivr_name".into(), Value::String(ivr_name.into()));
        variables.insert("extension".into(), Value::String(extension.into()));

        Self {
            variables,
            node_history: Vec::new(),
            dtmf_inputs: Vec::new(),
            api_calls: Vec::new(),
            retry_counts: HashMap::new(),
            pending_dtmf: VecDeque::new(),
            current_node: None,
            final_status: FinalStatus::InProgress,
            completed_flow: false,
            transferred: false,
            started_at: Utc::now(),
        }
    }

    /// Seed an extra variable (API base URLs and the like) before the flow
    /// starts.
    pub fn seed_variable(&mut self, name: &str, value: impl Into<Value>) {
        self.variables.insert(name.to_string(), value.into());
    }

    /// Dotted-path lookup into the variable bag: `a.b.c` descends through
    /// JSON objects. A flat key containing dots (as written by the api_call
    /// result flattening) is matched first.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.variables.get(path) {
            return Some(v);
        }
        let mut parts = path.split('.');
        let mut current = self.variables.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Lookup rendered as a bare string: JSON strings unquoted, everything
    /// else via its JSON display form.
    pub fn lookup_string(&self, path: &str) -> Option<String> {
        self.lookup(path).map(render_value)
    }

    /// Bump and return the retry counter for a node id.
    pub fn bump_retry(&mut self, node_id: &str) -> u32 {
        let count = self.retry_counts.entry(node_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

/// Render a JSON value the way it should appear inside a prompt path or an
/// interpolated URL: no quotes around strings.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
