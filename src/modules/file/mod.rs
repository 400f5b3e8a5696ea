pub mod code;
pub mod extension;
pub mod handle;
pub mod model;
pub mod repository;
pub mod repository_memory;
pub mod repository_pg;
pub mod route;
pub mod schema;
pub mod service;

pub use model::FileConfig;
pub use repository::FileRepository;
pub use repository_memory::FileMemoryRepository;
pub use repository_pg::FilePgRepository;
pub use service::FileService;
