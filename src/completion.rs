//! Asynchronous completion of suspended requests.
//!
//! # Module Structure
//!
//! - `flag` - CompletionFlag, the single synchronization point of the race
//! - `continuation` - lazy unwrapping of nested pending computations
//! - `coordinator` - CompletionCoordinator, the async handoff and finalize step
//! - `listener` - host timeout/error events feeding the same finalize step

mod continuation;
mod coordinator;
mod flag;
mod listener;

pub use continuation::{attach, settle};
pub use coordinator::CompletionCoordinator;
pub use flag::CompletionFlag;
