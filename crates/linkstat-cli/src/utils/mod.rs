//! Shared helpers for the linkstat CLI

pub mod logging;

pub use logging::initialize_logging;
