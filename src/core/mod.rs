// Public modules
pub mod engine;
pub mod error;
pub mod git;
pub mod steps;

// Public modules for CLI access
pub mod defaults;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
