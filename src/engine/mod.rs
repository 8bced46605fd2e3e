// Updraft Engine - Core module structure
pub mod api;
pub mod assets;
pub mod config;
pub mod error;
pub mod hashing;
pub mod manifest;
pub mod metadata;
pub mod multipart;
pub mod signing;
pub mod store;

pub use config::ServerConfig;
pub use store::{BundleRef, UpdateStore};
