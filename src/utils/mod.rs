//! Generic utility primitives with zero domain knowledge.
//!
//! - `cancel` - Run-scoped cancellation flag
//! - `command` - Cancellable subprocess execution
//! - `paths` - Sandboxed path joining

pub mod cancel;
pub mod command;
pub mod paths;
