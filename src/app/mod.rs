//! Application layer of the `accumulators` binary
//!
//! Verbosity and config-file settings, logging setup and the mapping of
//! fatal errors to exit codes.

pub mod config;
pub mod error_handling;
pub mod logging;
pub mod runtime;

pub use config::AppConfig;
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
pub use runtime::initialize_app;
