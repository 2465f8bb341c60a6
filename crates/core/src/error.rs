//! Engine error taxonomy
//!
//! The dispatcher handles almost everything locally: per-node failures are
//! routed to the node's `onError` target, and only unroutable failures end
//! the call. `ChannelGone` is special-cased everywhere: it means the caller
//! (or the network) dropped the leg, which is an early hangup, not a fault.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The underlying telephony channel no longer exists. Classified as an
    /// early caller hangup, never as a failure.
    #[error("channel gone")]
    ChannelGone,

    /// Any other channel or handler failure. Carries the backend's own
    /// description; the dispatcher only routes it, never matches on it.
    #[error("handler error: {0}")]
    Handler(String),
}

impl EngineError {
    /// True when the error means the telephony leg is gone and no further
    /// channel operation should be attempted.
    pub fn is_channel_gone(&self) -> bool {
        matches!(self, EngineError::ChannelGone)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
