//! CLI command implementations

pub mod commit;
pub mod config;
pub mod gc;
pub mod init;
pub mod log;
pub mod release;
pub mod snapshot;
