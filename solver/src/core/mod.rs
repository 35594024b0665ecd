//! Deterministic, pure logic shared by the solver.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod budget;
pub mod normalize;
pub mod session;
pub mod types;
