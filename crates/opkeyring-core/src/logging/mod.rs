//! Diagnostics logging
//!
//! Backends log through the `*_log!` macros, which tag each line with the
//! calling module. Token values and secret payloads are never logged.

pub mod file_logger;

pub use file_logger::{debug, enable, error, info, log, log_file_path, trace, warn, LogLevel};
