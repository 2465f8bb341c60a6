//! `collect` node handler
//!
//! Runs one collection window and routes on the result. A window that
//! produced too few digits never advances silently: it takes the flow's
//! configured route, or re-visits the same node until `maxRetries` runs
//! out. Flows without `maxRetries` retry indefinitely; authors bound their
//! own loops.

use std::time::Duration;

use chrono::Utc;
use ivr_engine_core::{DtmfInput, Node, Result};
use serde_json::Value;
use tracing::{debug, info};

use super::CallContext;
use crate::barge_in::PlayPolicy;
use crate::collector::{self, CollectRequest};

pub async fn collect(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let defaults = &ctx.settings.collect;
    let request = CollectRequest {
        max_digits: node.max_digits.unwrap_or(defaults.max_digits),
        timeout: Duration::from_secs(node.timeout.unwrap_or(defaults.timeout_secs)),
        terminators: node
            .terminators
            .clone()
            .unwrap_or_else(|| defaults.terminators.clone()),
        policy: PlayPolicy {
            barge_in: node.barge_in.unwrap_or(true),
            queue_dtmf: false,
        },
        playback_ceiling: Duration::from_secs(ctx.settings.playback.ceiling_secs),
    };
    let prompt = node.prompt.as_ref().map(|name| ctx.prompts.prompt(name));

    let digits = collector::collect_digits(
        ctx.channel,
        ctx.dtmf,
        &mut ctx.state.pending_dtmf,
        prompt.as_deref(),
        &request,
    )
    .await?;

    let min_digits = node.min_digits.unwrap_or(1);
    if digits.len() >= min_digits {
        info!(node = %node.id, digits = %digits, "digits collected");
        store(ctx, node, &digits);
        return Ok(node.next.clone());
    }

    let route = if digits.is_empty() {
        debug!(node = %node.id, "nothing collected");
        node.on_empty
            .clone()
            .or_else(|| node.on_timeout.clone())
            .or_else(|| node.on_invalid.clone())
    } else {
        debug!(node = %node.id, got = digits.len(), want = min_digits, "too few digits");
        node.on_invalid.clone()
    };
    if route.is_some() {
        return Ok(route);
    }

    let count = ctx.state.bump_retry(&node.id);
    match node.max_retries {
        Some(max) if count >= max => {
            debug!(node = %node.id, count, "collect retries exhausted");
            Ok(Some(
                node.on_max_retries.clone().unwrap_or_else(|| "hangup".to_string()),
            ))
        }
        _ => Ok(Some(node.id.clone())),
    }
}

fn store(ctx: &mut CallContext<'_>, node: &Node, digits: &str) {
    let state = &mut *ctx.state;
    state
        .variables
        .insert("dtmf_input".to_string(), Value::String(digits.to_string()));

    match &node.variable {
        Some(variable) => {
            state
                .variables
                .insert(variable.clone(), Value::String(digits.to_string()));
        }
        // legacy flows collect account numbers without naming the variable
        None if node.id.contains("account") => {
            state
                .variables
                .insert("account_number".to_string(), Value::String(digits.to_string()));
        }
        None => {}
    }

    state.dtmf_inputs.push(DtmfInput {
        node: node.id.clone(),
        digits: digits.to_string(),
        timestamp: Utc::now(),
    });
}
