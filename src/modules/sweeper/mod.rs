//! Background expiry of files older than the retention window.
pub mod service;

pub use service::{RetentionSweeper, SweepConfig};
