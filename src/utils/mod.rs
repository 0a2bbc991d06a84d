//! Process-level helpers shared by the binaries

mod logging;

pub use logging::{setup_logging, LogConfig};
