//! Utility modules for common functionality

pub mod signal;

pub use signal::{shutdown_signal, ShutdownReason};

// vim: ts=4
