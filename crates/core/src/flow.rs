//! Call-flow data model
//!
//! Flows are authored in the admin portal and delivered as JSON by the
//! platform API (`GET /api/engine/flow/{extension}`). Field names therefore
//! follow the authored camelCase shape. A graph may be cyclic (retry loops
//! legitimately revisit nodes), so nodes reference each other by id and no
//! tree/DAG assumption is made anywhere.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The nine node behaviors the engine knows, plus a catch-all for kinds
/// authored by a newer portal than this engine. Unknown kinds fall through
/// to their `next` node rather than failing the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Play,
    PlayDigits,
    PlaySequence,
    Collect,
    Branch,
    ApiCall,
    SetVariable,
    Transfer,
    Hangup,
    #[serde(other)]
    Unknown,
}

/// One item of a `play_sequence` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SequenceItem {
    /// A named prompt, resolved through the prompt cache.
    Prompt { value: String },
    /// A variable spoken as a number (Arabic pronunciation grammar).
    Number { variable: String },
    /// A variable spoken digit by digit.
    Digits { variable: String },
}

/// One step of a call flow.
///
/// Only `id` and `type` are universal; everything else is type-specific and
/// optional. Validation of which fields a given kind requires happens in the
/// handlers, which treat missing fields the way the authoring UI does
/// (defaults or skip), never by panicking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,

    // Playback
    pub prompt: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub sequence: Vec<SequenceItem>,

    // Collection
    pub max_digits: Option<usize>,
    pub min_digits: Option<usize>,
    pub timeout: Option<u64>,
    pub terminators: Option<String>,

    // Branching
    pub condition: Option<String>,
    pub branches: HashMap<String, String>,
    pub default: Option<String>,

    // Variables / expressions
    pub variable: Option<String>,
    pub expression: Option<String>,
    pub value: Option<serde_json::Value>,

    // External calls
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
    pub result_variable: Option<String>,

    // Transfer
    pub destination: Option<String>,

    // Routing
    pub next: Option<String>,
    pub on_error: Option<String>,
    pub on_timeout: Option<String>,
    pub on_empty: Option<String>,
    pub on_invalid: Option<String>,
    pub on_max_retries: Option<String>,
    pub max_retries: Option<u32>,

    // Barge-in overrides (policy derives the effective values)
    pub barge_in: Option<bool>,
    pub queue_dtmf: Option<bool>,
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Unknown
    }
}

/// A variable the flow wants surfaced in the call summary, with an optional
/// human-readable label for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureVariable {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// The full flow graph: a start node id plus the node map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraph {
    pub start_node: String,
    pub nodes: HashMap<String, Node>,
    /// Which collected variables the summary should expose, and how to
    /// label them. Empty means "capture everything non-internal".
    #[serde(default)]
    pub capture_variables: Vec<CaptureVariable>,
}

impl FlowGraph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}

/// The flow plus the per-IVR metadata the platform API attaches to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowConfig {
    pub id: String,
    pub name: String,
    pub extension: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub flow: FlowGraph,
    /// Admin-managed prompt name -> relative sound path, consulted before
    /// the language default path scheme.
    #[serde(default)]
    pub prompt_cache: HashMap<String, String>,
}

fn default_language() -> String {
    "ar".to_string()
}
