pub mod config;
pub mod error;
pub mod file_system;
pub mod handlers;
pub mod identifier;
pub mod models;
pub mod providers;
pub mod registry;

pub use config::Config;
pub use error::AppError;
pub use identifier::RepoId;
pub use registry::Registry;
