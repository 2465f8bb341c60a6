//! Telephony channel abstraction
//!
//! The engine is handed one already-connected channel per call and never
//! owns the signaling stack behind it. Everything it needs is expressed
//! here: answer/hangup, starting a playback it can stop, a DTMF event
//! stream, channel variables, and the dialplan handoff used by transfers.
//!
//! Loss of the leg surfaces as `EngineError::ChannelGone` from any of these
//! primitives, and from the DTMF receiver closing.

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One caller keypress. Collection timestamps are taken when a node
/// finishes gathering, not per keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfEvent {
    pub digit: char,
}

impl DtmfEvent {
    pub fn new(digit: char) -> Self {
        Self { digit }
    }
}

/// Handle to one in-flight playback.
///
/// The playback controller guarantees that on every exit path the handle is
/// either finished or explicitly stopped before it is dropped, so no audio
/// keeps playing after the node that started it has moved on.
#[async_trait]
pub trait PlaybackHandle: Send {
    /// Stop the playback. Idempotent; stopping a finished playback is a
    /// no-op.
    async fn stop(&mut self) -> Result<()>;

    /// Wait until the playback has finished on its own.
    async fn wait_finished(&mut self) -> Result<()>;
}

/// A live telephony leg.
///
/// Implementations wrap the actual call-control protocol. Tests use a
/// scripted in-memory channel.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel id, stable for the life of the leg.
    fn id(&self) -> &str;

    /// Caller id number, when the leg carries one.
    fn caller_id(&self) -> Option<&str>;

    async fn answer(&self) -> Result<()>;

    /// Start playing one sound by relative path and return its handle.
    async fn play(&self, sound: &str) -> Result<Box<dyn PlaybackHandle>>;

    /// Subscribe to this channel's DTMF events. Events arrive strictly in
    /// press order; the sender side closes when the channel is lost.
    ///
    /// The dispatcher subscribes once per call and lends the receiver to
    /// the playback controller and digit collector, so there is never a
    /// listener add/remove race.
    fn subscribe_dtmf(&self) -> mpsc::Receiver<DtmfEvent>;

    async fn hangup(&self) -> Result<()>;

    /// Read a channel variable (e.g. the outbound-call correlation id).
    async fn get_variable(&self, name: &str) -> Result<Option<String>>;

    async fn set_variable(&self, name: &str, value: &str) -> Result<()>;

    /// Hand the channel back to the dialplan at the given location. Used
    /// by `transfer` nodes; the engine's involvement ends here on success.
    async fn continue_in_dialplan(
        &self,
        context: &str,
        extension: &str,
        priority: u32,
    ) -> Result<()>;
}
