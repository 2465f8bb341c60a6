//! Digit collection
//!
//! Gathers a DTMF string for a `collect` node. Digits queued by earlier
//! barge-ins are consumed first, in press order; if any were queued the
//! prompt is skipped since the caller is already typing ahead. The
//! inactivity window starts when the prompt finishes and re-arms on every
//! keypress, so the prompt's length never cuts into listening time.

use std::collections::VecDeque;
use std::time::Duration;

use ivr_engine_core::{Channel, DtmfEvent, EngineError, Result};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::barge_in::PlayPolicy;
use crate::playback::{self, PlayOutcome};

/// Parameters for one collection window.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    /// Collection ends as soon as this many digits are held.
    pub max_digits: usize,
    /// Inter-digit timeout; re-armed on every keypress.
    pub timeout: Duration,
    /// Digits that end collection without being included.
    pub terminators: String,
    /// Playback policy for the prompt, when one plays.
    pub policy: PlayPolicy,
    /// Hard ceiling on the prompt audio.
    pub playback_ceiling: Duration,
}

impl CollectRequest {
    fn accept(&self, digit: char, digits: &mut String) -> bool {
        if self.terminators.contains(digit) {
            debug!(digit = %digit, collected = %digits, "terminator pressed");
            return true;
        }
        digits.push(digit);
        digits.len() >= self.max_digits
    }
}

enum Ev {
    Digit(Option<DtmfEvent>),
    Timeout,
}

/// Run one collection window and return whatever digits it gathered.
///
/// An empty string means the window timed out (or the caller pressed a
/// terminator immediately); the node handler decides how to route that.
pub async fn collect_digits(
    channel: &dyn Channel,
    dtmf: &mut mpsc::Receiver<DtmfEvent>,
    pending: &mut VecDeque<char>,
    prompt: Option<&str>,
    request: &CollectRequest,
) -> Result<String> {
    let mut digits = String::new();

    // queued barge-in digits are consumed before anything plays
    while let Some(digit) = pending.pop_front() {
        trace!(digit = %digit, "consuming queued digit");
        if request.accept(digit, &mut digits) {
            return Ok(digits);
        }
    }

    let mut deadline = Instant::now() + request.timeout;

    let type_ahead = request.policy.barge_in && !digits.is_empty();
    if let Some(sound) = prompt {
        if type_ahead {
            trace!(sound, "skipping prompt, caller is typing ahead");
        } else {
            let outcome = playback::play_segment(
                channel,
                dtmf,
                sound,
                request.policy,
                request.playback_ceiling,
            )
            .await?;
            // the listening window opens once the prompt is out of the
            // way, however it ended; a prompt longer than the timeout
            // must not eat the caller's window
            deadline = Instant::now() + request.timeout;
            if let PlayOutcome::Interrupted(digit) = outcome {
                if request.accept(digit, &mut digits) {
                    return Ok(digits);
                }
            }
        }
    }

    loop {
        let ev = tokio::select! {
            ev = dtmf.recv() => Ev::Digit(ev),
            _ = time::sleep_until(deadline) => Ev::Timeout,
        };
        match ev {
            Ev::Digit(Some(event)) => {
                deadline = Instant::now() + request.timeout;
                if request.accept(event.digit, &mut digits) {
                    return Ok(digits);
                }
            }
            Ev::Digit(None) => return Err(EngineError::ChannelGone),
            Ev::Timeout => {
                debug!(collected = %digits, "collection window timed out");
                return Ok(digits);
            }
        }
    }
}
