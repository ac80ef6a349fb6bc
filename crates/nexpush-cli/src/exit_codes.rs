//! Exit codes for scripting callers
//!
//! Any failure, whether a rejected deployment, a transport error or bad
//! input, exits with [`ERROR`].

/// Success - every requested operation completed
pub const SUCCESS: i32 = 0;

/// Failure of any kind
pub const ERROR: i32 = 1;
