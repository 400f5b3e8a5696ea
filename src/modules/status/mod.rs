pub mod handle;
pub mod route;
pub mod service;

pub use service::StatusService;
