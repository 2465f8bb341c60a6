//! Call outcome reporting
//!
//! Everything that leaves the engine after (or during) a call goes through
//! this crate: normalizing the variable bag into the reportable shape,
//! posting the terminal `CallSummary` to the platform API, and keeping an
//! originated call's tracking record up to date. All of it is best effort;
//! a reporting failure is logged and never feeds back into call handling.

pub mod error;
pub mod normalize;
pub mod outbound;
pub mod sink;

pub use error::ReportError;
pub use normalize::normalize_variables;
pub use outbound::OutboundCallTracker;
pub use sink::{HttpSummarySink, SummarySink};
