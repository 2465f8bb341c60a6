//! `api_call` node handler
//!
//! Performs one HTTP request with interpolated url/headers/body, stores the
//! JSON result under the node's `resultVariable` (default `api_result`),
//! and additionally flattens one object level into `resultVariable.key`
//! entries so flows can interpolate `{{api_result.balance}}` directly.
//! Every attempt is recorded; failures route `onError` when configured and
//! otherwise fall through to `next`.

use std::time::Duration;

use chrono::Utc;
use ivr_engine_core::{ApiCallRecord, Node, Result};
use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use super::CallContext;
use crate::evaluator;

pub async fn api_call(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let Some(url_template) = &node.url else {
        warn!(node = %node.id, "api_call without a url");
        return Ok(node.on_error.clone().or_else(|| node.next.clone()));
    };
    let url = evaluator::interpolate(url_template, ctx.state);
    let method = node
        .method
        .as_deref()
        .and_then(|m| m.to_uppercase().parse::<Method>().ok())
        .unwrap_or(Method::GET);

    info!(node = %node.id, method = %method, url = %url, "calling external api");

    match perform(ctx, node, method.clone(), &url).await {
        Ok((status, data)) => {
            store_result(ctx, node, data);
            ctx.state.api_calls.push(ApiCallRecord {
                node: node.id.clone(),
                url,
                method: method.to_string(),
                status: Some(status),
                error: None,
                timestamp: Utc::now(),
            });
            Ok(node.next.clone())
        }
        Err((status, message)) => {
            warn!(node = %node.id, error = %message, "api call failed");
            ctx.state.api_calls.push(ApiCallRecord {
                node: node.id.clone(),
                url,
                method: method.to_string(),
                status,
                error: Some(message),
                timestamp: Utc::now(),
            });
            Ok(node.on_error.clone().or_else(|| node.next.clone()))
        }
    }
}

async fn perform(
    ctx: &CallContext<'_>,
    node: &Node,
    method: Method,
    url: &str,
) -> std::result::Result<(u16, Value), (Option<u16>, String)> {
    let mut request = ctx
        .http
        .request(method, url)
        .timeout(Duration::from_secs(ctx.settings.api.timeout_secs))
        .header("Content-Type", "application/json");

    if let Some(headers) = &node.headers {
        for (name, value) in headers {
            request = request.header(name, evaluator::interpolate(value, ctx.state));
        }
    }
    if let Some(auth) = &node.authorization {
        let auth = evaluator::interpolate(auth, ctx.state);
        request = request.header("Authorization", authorization_header(&auth));
    }
    if let Some(body) = &node.body {
        request = request.json(&evaluator::interpolate_value(body, ctx.state));
    }

    let response = request.send().await.map_err(|e| (None, e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err((
            Some(status.as_u16()),
            format!("unexpected status {status}"),
        ));
    }
    let data = response
        .json::<Value>()
        .await
        .map_err(|e| (Some(status.as_u16()), e.to_string()))?;
    Ok((status.as_u16(), data))
}

/// Accept `bearer <token>` / `basic <credentials>` shorthand in flow
/// definitions; anything else passes through verbatim.
fn authorization_header(auth: &str) -> String {
    let has_prefix = |prefix: &str| {
        auth.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    };
    if has_prefix("bearer ") {
        format!("Bearer {}", &auth["bearer ".len()..])
    } else if has_prefix("basic ") {
        format!("Basic {}", &auth["basic ".len()..])
    } else {
        auth.to_string()
    }
}

fn store_result(ctx: &mut CallContext<'_>, node: &Node, data: Value) {
    let result_variable = node.result_variable.as_deref().unwrap_or("api_result");

    if let Value::Object(map) = &data {
        for (key, value) in map {
            ctx.state
                .variables
                .insert(format!("{result_variable}.{key}"), value.clone());
        }
    }
    ctx.state
        .variables
        .insert(result_variable.to_string(), data);
}
