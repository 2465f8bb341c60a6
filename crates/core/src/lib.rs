//! Core types and traits for the IVR flow execution engine
//!
//! This crate provides the foundational pieces shared by the engine and
//! reporting crates:
//! - The call-flow data model (`FlowGraph`, `Node`) as authored in the
//!   admin portal and delivered by the platform API
//! - Per-call execution state and the terminal `CallSummary`
//! - The `Channel`/`PlaybackHandle` traits that abstract the telephony leg
//! - Prompt name resolution (custom prompt cache + language defaults)
//! - The engine error taxonomy

pub mod channel;
pub mod error;
pub mod flow;
pub mod prompts;
pub mod state;
pub mod summary;

pub use channel::{Channel, DtmfEvent, PlaybackHandle};
pub use error::{EngineError, Result};
pub use flow::{CaptureVariable, FlowConfig, FlowGraph, Node, NodeKind, SequenceItem};
pub use prompts::PromptResolver;
pub use state::{ApiCallRecord, DtmfInput, ExecutionState, FinalStatus};
pub use summary::CallSummary;
