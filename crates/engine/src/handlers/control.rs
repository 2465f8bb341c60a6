//! Control nodes: `branch`, `set_variable`, `hangup`

use ivr_engine_core::{Node, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::CallContext;
use crate::evaluator;

/// Pick the next node from the branch table.
///
/// A `condition` selects by its stringified boolean; otherwise the named
/// variable's rendered value is the key. When the variable was never set,
/// one queued barge-in digit stands in for it, which is how a menu play
/// node routes on the digit that interrupted it.
pub fn branch(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let key = if let Some(condition) = &node.condition {
        evaluator::evaluate_condition(condition, ctx.state).to_string()
    } else if let Some(variable) = &node.variable {
        match ctx.state.lookup_string(variable) {
            Some(value) => value,
            None => ctx
                .state
                .pending_dtmf
                .pop_front()
                .map(|d| d.to_string())
                .unwrap_or_default(),
        }
    } else {
        String::new()
    };

    let next = node
        .branches
        .get(&key)
        .cloned()
        .or_else(|| node.default.clone());
    debug!(node = %node.id, key = %key, next = ?next, "branch decision");
    Ok(next)
}

/// Evaluate the node's `expression`, or interpolate its literal `value`,
/// into the named variable.
pub fn set_variable(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let Some(variable) = &node.variable else {
        warn!(node = %node.id, "set_variable without a variable name");
        return Ok(node.next.clone());
    };

    let value = if let Some(expression) = &node.expression {
        evaluator::evaluate_expression(expression, ctx.state)
    } else {
        match &node.value {
            Some(value) => evaluator::interpolate_value(value, ctx.state),
            None => Value::Null,
        }
    };

    debug!(node = %node.id, variable = %variable, value = %value, "set variable");
    ctx.state.variables.insert(variable.clone(), value);
    Ok(node.next.clone())
}

/// Terminal node: mark the flow completed and drop the leg. A hangup that
/// races the caller's own hangup is fine; the error is ignored.
pub async fn hangup(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    info!(node = %node.id, "flow reached hangup");
    ctx.state.completed_flow = true;
    let _ = ctx.channel.hangup().await;
    Ok(None)
}
