pub mod content;
pub mod file;
pub mod status;
pub mod sweeper;
