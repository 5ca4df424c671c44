//! Logger initialization.
//!
//! The engine only emits through the `log` facade; hosts call
//! [`init_logging`] early in `main` if they want `env_logger` output.

mod init;

pub use init::{LoggingConfig, init_logging};
