//! Pure reconciliation core: merging freshly extracted messages into the
//! persisted conversation record, and deriving lead summaries from the
//! result. No I/O here; the caller owns the read-modify-write cycle.

pub mod lead;
pub mod merge;

pub use lead::project_lead;
pub use merge::{merge, IncomingBatch};
