//! Scrape orchestration: the resumable state machine that drives extraction,
//! classification, merge and persistence, one conversation handle at a time.

pub mod replay;
pub mod scout;
pub mod source;

pub use replay::ReplaySource;
pub use scout::{CommandError, Scout, ScoutConfig, StatusReport};
pub use source::{names_match, ExtractedMessage, SourceError, ThreadHandle, ThreadSource};
