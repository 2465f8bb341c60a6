//! Variable normalization for call summaries
//!
//! The summary exposes variables as `{name: {value, label}}`. A flow that
//! declares `captureVariables` gets exactly those names, labelled as
//! configured; a flow that declares none gets every variable the call
//! produced, minus the engine's own identity variables and anything with a
//! `_` prefix.

use std::collections::HashMap;

use ivr_engine_core::CaptureVariable;
use serde_json::{json, Map, Value};

/// Variables that exist for the engine's benefit and carry no reporting
/// value of their own.
const INTERNAL_VARIABLES: &[&str] = &[
    "caller_id",
    "channel_id",
    "extension",
    "language",
    "dtmf_input",
];

/// Reduce the call's variable bag to the reportable object.
pub fn normalize_variables(
    variables: &HashMap<String, Value>,
    capture: &[CaptureVariable],
) -> Value {
    let mut out = Map::new();

    if capture.is_empty() {
        for (name, value) in variables {
            if name.starts_with('_') || INTERNAL_VARIABLES.contains(&name.as_str()) {
                continue;
            }
            out.insert(name.clone(), json!({ "value": value, "label": name }));
        }
    } else {
        for var in capture {
            let value = variables.get(&var.name).cloned().unwrap_or(Value::Null);
            let label = var.label.as_deref().unwrap_or(&var.name);
            out.insert(var.name.clone(), json!({ "value": value, "label": label }));
        }
    }

    Value::Object(out)
}
