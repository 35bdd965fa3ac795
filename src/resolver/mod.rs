//! Working out which configured game is running and where its achievements live.

pub mod candidate;
pub mod locate;
pub mod processes;

pub use candidate::{is_within, CandidateResolver};
pub use locate::find_source_file;
pub use processes::{ProcessInfo, ProcessSource, SysinfoProcessSource};
