//! Brute-then-optimal solver pipeline for competitive-programming problems.
//!
//! A session asks a generator for a brute-force program, runs it against a
//! test input to produce reference output, then asks for an optimized program
//! and retries until its output matches the reference or the attempt budget
//! runs out. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalization, attempt budget,
//!   session state machine). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, process supervision,
//!   workspace files, generator backends).
//!
//! [`agents`] wrap prompt rendering and source extraction per role, and
//! [`solve`] drives a session by coordinating core logic with I/O.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod solve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
