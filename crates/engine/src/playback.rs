//! Prompt playback with barge-in
//!
//! Every prompt is raced against the caller's keypad and a hard ceiling.
//! The select below must not hold a borrow of the playback handle across
//! arms, so each arm reduces to a plain `Winner` value and the handle is
//! stopped once, unconditionally, after the race is decided. `stop` on an
//! already-finished handle is a no-op per the `PlaybackHandle` contract.

use std::time::Duration;

use ivr_engine_core::{Channel, DtmfEvent, EngineError, Result};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, trace};

use crate::barge_in::PlayPolicy;

/// How one prompt playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The audio ran to completion.
    Completed,
    /// A keypress stopped the audio; the digit is carried here.
    Interrupted(char),
    /// The ceiling elapsed before the audio finished.
    CeilingReached,
}

enum Winner {
    Finished(Result<()>),
    Digit(Option<DtmfEvent>),
    Ceiling,
}

/// Play one sound file and race it against DTMF and the playback ceiling.
///
/// The DTMF arm only participates when the policy allows barge-in, so an
/// uninterruptible prompt leaves keypresses in the channel queue for
/// whoever listens next.
pub async fn play_segment(
    channel: &dyn Channel,
    dtmf: &mut mpsc::Receiver<DtmfEvent>,
    sound: &str,
    policy: PlayPolicy,
    ceiling: Duration,
) -> Result<PlayOutcome> {
    trace!(sound, barge_in = policy.barge_in, "playing");
    let mut handle = channel.play(sound).await?;

    let winner = tokio::select! {
        res = handle.wait_finished() => Winner::Finished(res),
        ev = dtmf.recv(), if policy.barge_in => Winner::Digit(ev),
        _ = time::sleep(ceiling) => Winner::Ceiling,
    };
    let _ = handle.stop().await;

    match winner {
        Winner::Finished(res) => {
            res?;
            Ok(PlayOutcome::Completed)
        }
        Winner::Digit(Some(ev)) => {
            debug!(sound, digit = %ev.digit, "playback interrupted");
            Ok(PlayOutcome::Interrupted(ev.digit))
        }
        // the DTMF sender is dropped only when the channel leg is gone
        Winner::Digit(None) => Err(EngineError::ChannelGone),
        Winner::Ceiling => {
            debug!(sound, ceiling_secs = ceiling.as_secs(), "playback ceiling reached");
            Ok(PlayOutcome::CeilingReached)
        }
    }
}

/// Play a list of sounds back to back under one policy. An interrupting
/// digit or the ceiling on any segment abandons the rest of the list.
pub async fn play_all(
    channel: &dyn Channel,
    dtmf: &mut mpsc::Receiver<DtmfEvent>,
    sounds: &[String],
    policy: PlayPolicy,
    ceiling: Duration,
) -> Result<PlayOutcome> {
    for sound in sounds {
        match play_segment(channel, dtmf, sound, policy, ceiling).await? {
            PlayOutcome::Completed => {}
            ended => return Ok(ended),
        }
    }
    Ok(PlayOutcome::Completed)
}
