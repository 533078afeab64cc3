//! Logging setup shared by the library and the CLI

mod logging;

pub use logging::{setup_logging, LogConfig};
