//! Event logging for the host.

pub mod logger;

pub use logger::EventLogger;
