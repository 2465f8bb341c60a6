//! Barge-in policy
//!
//! Decides, per node, whether caller keypresses interrupt the audio and
//! whether an interrupting digit is queued for the next node to consume.
//! The queueing default is derived from what comes next: a branch can be
//! steered by the queued digit, and a prompt-less collect wants it as its
//! first digit, but a collect with its own prompt should capture input
//! fresh in its own window.

use ivr_engine_core::{Node, NodeKind};

/// Effective playback policy for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayPolicy {
    /// Keypresses stop the current audio.
    pub barge_in: bool,
    /// The interrupting digit is pushed onto the pending queue instead of
    /// being discarded.
    pub queue_dtmf: bool,
}

impl PlayPolicy {
    /// Policy for playback that must run to completion.
    pub fn uninterruptible() -> Self {
        Self { barge_in: false, queue_dtmf: false }
    }
}

/// Derive the policy for `node` given the node its `next` points at.
///
/// Explicit `bargeIn`/`queueDtmf` booleans on the node always win over the
/// derived values; disabling barge-in forces queueing off since no digit
/// can interrupt in the first place.
pub fn resolve(node: &Node, next: Option<&Node>) -> PlayPolicy {
    let barge_in = node.barge_in.unwrap_or(true);

    let mut queue_dtmf = match next {
        Some(n) if n.kind == NodeKind::Branch => true,
        Some(n) if n.kind == NodeKind::Collect => n.prompt.is_none(),
        _ => false,
    };
    if let Some(explicit) = node.queue_dtmf {
        queue_dtmf = explicit;
    }
    if !barge_in {
        queue_dtmf = false;
    }

    PlayPolicy { barge_in, queue_dtmf }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind) -> Node {
        Node { id: "n".into(), kind, ..Default::default() }
    }

    #[test]
    fn barge_in_defaults_on() {
        let policy = resolve(&node(NodeKind::Play), None);
        assert!(policy.barge_in);
        assert!(!policy.queue_dtmf);
    }

    #[test]
    fn explicit_barge_in_false_wins() {
        let mut n = node(NodeKind::Play);
        n.barge_in = Some(false);
        let policy = resolve(&n, Some(&node(NodeKind::Branch)));
        assert!(!policy.barge_in);
        // disabling barge-in always forces queueing off
        assert!(!policy.queue_dtmf);
    }

    #[test]
    fn next_branch_queues_by_default() {
        let policy = resolve(&node(NodeKind::Play), Some(&node(NodeKind::Branch)));
        assert!(policy.queue_dtmf);
    }

    #[test]
    fn next_collect_queues_only_without_prompt() {
        let bare_collect = node(NodeKind::Collect);
        assert!(resolve(&node(NodeKind::Play), Some(&bare_collect)).queue_dtmf);

        let mut prompted = node(NodeKind::Collect);
        prompted.prompt = Some("enter_account".into());
        assert!(!resolve(&node(NodeKind::Play), Some(&prompted)).queue_dtmf);
    }

    #[test]
    fn explicit_queue_dtmf_overrides_derivation() {
        let mut n = node(NodeKind::Play);
        n.queue_dtmf = Some(false);
        assert!(!resolve(&n, Some(&node(NodeKind::Branch))).queue_dtmf);

        n.queue_dtmf = Some(true);
        assert!(resolve(&n, None).queue_dtmf);
    }
}
