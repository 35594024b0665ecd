//! I/O helpers: processes, files, config and generation backends.

pub mod compare;
pub mod config;
pub mod executor;
pub mod generator;
pub mod init;
pub mod process;
pub mod prompt;
pub mod workspace;
