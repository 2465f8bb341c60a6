//! Node handlers
//!
//! One handler per node kind. Each takes the shared call context plus the
//! node and returns the id of the next node to execute, or `None` when the
//! flow should terminate. Handlers never recurse into each other; the
//! dispatcher owns the walk.

mod api;
mod collect;
mod control;
mod play;
mod transfer;

use ivr_engine_core::{
    Channel, DtmfEvent, ExecutionState, FlowGraph, Node, NodeKind, PromptResolver, Result,
};
use ivr_engine_config::Settings;
use tokio::sync::mpsc;
use tracing::debug;

/// Everything a handler may touch during one node execution. Borrowed from
/// the dispatcher for exactly one node; the DTMF receiver is the call's
/// single subscription, lent down so digit ordering is preserved.
pub struct CallContext<'a> {
    pub channel: &'a dyn Channel,
    pub dtmf: &'a mut mpsc::Receiver<DtmfEvent>,
    pub prompts: &'a PromptResolver,
    pub settings: &'a Settings,
    pub http: &'a reqwest::Client,
    pub flow: &'a FlowGraph,
    pub state: &'a mut ExecutionState,
}

/// Execute one node and return the next node id, if any.
pub async fn execute(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    match node.kind {
        NodeKind::Play => play::play(ctx, node).await,
        NodeKind::PlayDigits => play::play_digits(ctx, node).await,
        NodeKind::PlaySequence => play::play_sequence(ctx, node).await,
        NodeKind::Collect => collect::collect(ctx, node).await,
        NodeKind::Branch => control::branch(ctx, node),
        NodeKind::ApiCall => api::api_call(ctx, node).await,
        NodeKind::SetVariable => control::set_variable(ctx, node),
        NodeKind::Transfer => transfer::transfer(ctx, node).await,
        NodeKind::Hangup => control::hangup(ctx, node).await,
        NodeKind::Unknown => {
            debug!(node = %node.id, "unknown node kind, falling through");
            Ok(node.next.clone())
        }
    }
}
