//! Playback node handlers: `play`, `play_digits`, `play_sequence`
//!
//! Each builds the full ordered sound list first and hands it to the
//! playback controller in one go, so an interrupting keypress abandons the
//! rest of the list wherever it lands.

use ivr_engine_core::{Node, Result, SequenceItem};
use tracing::{debug, warn};

use super::CallContext;
use crate::barge_in;
use crate::number;
use crate::playback::{self, PlayOutcome};

pub async fn play(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let mut sounds = Vec::new();
    if let Some(prompt) = &node.prompt {
        sounds.push(ctx.prompts.prompt(prompt));
    }
    run_playback(ctx, node, &sounds).await?;

    // announcement loops (menu replays) bound themselves with maxRetries;
    // a play that leads straight to hangup never counts as a retry
    if let Some(max) = node.max_retries {
        if node.next.as_deref() != Some("hangup") {
            let count = ctx.state.bump_retry(&node.id);
            if count >= max {
                debug!(node = %node.id, count, "play retries exhausted");
                return Ok(Some(
                    node.on_max_retries.clone().unwrap_or_else(|| "hangup".to_string()),
                ));
            }
        }
    }

    Ok(node.next.clone())
}

pub async fn play_digits(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let mut sounds = Vec::new();
    if let Some(prefix) = &node.prefix {
        sounds.push(ctx.prompts.prompt(prefix));
    }
    if let Some(variable) = &node.variable {
        let value = ctx.state.lookup_string(variable).unwrap_or_default();
        sounds.extend(digit_sounds(ctx, &value));
    }
    if let Some(suffix) = &node.suffix {
        sounds.push(ctx.prompts.prompt(suffix));
    }

    run_playback(ctx, node, &sounds).await?;
    Ok(node.next.clone())
}

pub async fn play_sequence(ctx: &mut CallContext<'_>, node: &Node) -> Result<Option<String>> {
    let mut sounds = Vec::new();
    for item in &node.sequence {
        match item {
            SequenceItem::Prompt { value } => sounds.push(ctx.prompts.prompt(value)),
            SequenceItem::Number { variable } => {
                match ctx.state.lookup_string(variable) {
                    Some(value) => {
                        for segment in number::decompose_text(&value) {
                            sounds.push(ctx.prompts.number_segment(&segment));
                        }
                    }
                    None => warn!(node = %node.id, variable, "sequence variable unset"),
                }
            }
            SequenceItem::Digits { variable } => {
                let value = ctx.state.lookup_string(variable).unwrap_or_default();
                sounds.extend(digit_sounds(ctx, &value));
            }
        }
    }

    run_playback(ctx, node, &sounds).await?;
    Ok(node.next.clone())
}

fn digit_sounds(ctx: &CallContext<'_>, value: &str) -> Vec<String> {
    value
        .chars()
        .filter(char::is_ascii_digit)
        .map(|d| ctx.prompts.digit(d))
        .collect()
}

/// Play the list under the node's barge-in policy, queueing the
/// interrupting digit when the policy says the next node wants it.
async fn run_playback(ctx: &mut CallContext<'_>, node: &Node, sounds: &[String]) -> Result<()> {
    if sounds.is_empty() {
        return Ok(());
    }

    let next = node.next.as_deref().and_then(|id| ctx.flow.node(id));
    let policy = barge_in::resolve(node, next);
    let ceiling = std::time::Duration::from_secs(ctx.settings.playback.ceiling_secs);

    let outcome = playback::play_all(ctx.channel, ctx.dtmf, sounds, policy, ceiling).await?;
    if let PlayOutcome::Interrupted(digit) = outcome {
        if policy.queue_dtmf {
            ctx.state.pending_dtmf.push_back(digit);
        }
    }
    Ok(())
}
