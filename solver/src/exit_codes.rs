//! Stable exit codes for solver CLI commands.

/// Command succeeded, the session converged, or outputs match.
pub const OK: i32 = 0;
/// Invalid config, unreadable files, generation failure or other errors.
pub const INVALID: i32 = 1;
/// A stage failed (missing file, timeout, runtime error) or outputs differ.
pub const FAILED: i32 = 2;
/// The optimal stage used its whole attempt budget without a match.
pub const NOT_CONVERGED: i32 = 3;
