//! `transfer` node handler
//!
//! Hands the leg to the dialplan's `transfer` context. On success the
//! engine's involvement with this channel ends; the dispatcher sees the
//! transferred flag and leaves the leg alone.

use ivr_engine_core::{Node, Result};
use tracing::{info, warn};

use super::CallContext;
use crate::evaluator;

pub async fn transfer(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let Some(destination) = &node.destination else {
        warn!(node = %node.id, "transfer without a destination");
        return Ok(node.on_error.clone());
    };
    let destination = evaluator::interpolate(destination, ctx.state);

    info!(node = %node.id, destination = %destination, "transferring");
    match ctx
        .channel
        .continue_in_dialplan("transfer", &destination, 1)
        .await
    {
        Ok(()) => {
            ctx.state.transferred = true;
            Ok(None)
        }
        Err(err) => {
            warn!(node = %node.id, %err, "transfer failed");
            if err.is_channel_gone() {
                return Err(err);
            }
            Ok(node.on_error.clone())
        }
    }
}
