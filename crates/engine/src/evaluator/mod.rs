//! Expression and interpolation evaluation
//!
//! Two author-facing mini-languages operate on the call's variable bag:
//!
//! - `{{path.to.var}}` placeholder interpolation in prompts, URLs and API
//!   bodies. Unresolved paths stay as literal placeholder text so a typo is
//!   visible in logs instead of silently blanking a URL.
//! - Condition/expression strings on `branch` and `set_variable` nodes,
//!   evaluated by a restricted AST interpreter (`ast` module). The variable
//!   bag is the only name scope; there is no way to reach anything else.
//!
//! Evaluation failures never propagate into the dispatcher: a broken
//! condition is `false`, a broken expression is `null`.

pub mod ast;

use ivr_engine_core::state::render_value;
use ivr_engine_core::ExecutionState;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(\w+(?:\.\w+)*)\}\}").expect("placeholder regex"));

/// Replace every `{{a.b.c}}` with the dotted-path lookup, leaving
/// unresolved placeholders untouched.
pub fn interpolate(template: &str, state: &ExecutionState) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match state.lookup(&caps[1]) {
                Some(value) => render_value(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Recursively interpolate every string leaf of an arbitrary JSON value.
pub fn interpolate_value(value: &Value, state: &ExecutionState) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, state)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| interpolate_value(v, state)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, state)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Evaluate an author-supplied boolean condition. Any parse or evaluation
/// failure yields `false`.
pub fn evaluate_condition(source: &str, state: &ExecutionState) -> bool {
    match ast::parse(source).and_then(|expr| ast::eval(&expr, state)) {
        Ok(value) => ast::truthy(&value),
        Err(err) => {
            debug!(condition = source, %err, "condition evaluation failed");
            false
        }
    }
}

/// Evaluate an author-supplied value expression. Any parse or evaluation
/// failure yields `null`.
pub fn evaluate_expression(source: &str, state: &ExecutionState) -> Value {
    match ast::parse(source).and_then(|expr| ast::eval(&expr, state)) {
        Ok(value) => value,
        Err(err) => {
            debug!(expression = source, %err, "expression evaluation failed");
            Value::Null
        }
    }
}
