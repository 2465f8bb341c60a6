//! IVR flow execution engine
//!
//! One `FlowRunner` per live channel walks the flow graph node by node,
//! arbitrating the races between audio playback, caller keypresses and
//! timeouts, and classifies how the call ended. Calls are fully isolated:
//! all mutable state lives in that call's `ExecutionState`, so concurrent
//! calls never need a lock.
//!
//! ```text
//! ┌───────────┐   node id    ┌──────────────┐   channel ops   ┌─────────┐
//! │ Dispatcher│─────────────▶│ Node handlers│────────────────▶│ Channel │
//! │  (loop)   │◀─────────────│ (per kind)   │◀──── DTMF ──────│  (leg)  │
//! └───────────┘  next id     └──────────────┘                 └─────────┘
//! ```

pub mod barge_in;
pub mod collector;
pub mod dispatcher;
pub mod evaluator;
pub mod handlers;
pub mod number;
pub mod playback;

pub use barge_in::PlayPolicy;
pub use collector::CollectRequest;
pub use dispatcher::FlowRunner;
pub use playback::PlayOutcome;
