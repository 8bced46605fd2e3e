//! Updraft - Self-hosted OTA update distribution server
//!
//! Implements the server side of the Expo Updates protocol (versions 0
//! and 1): given a client's runtime version, platform, and installed update
//! id, it answers with an update manifest, a rollback directive, or a
//! no-update directive, packaged as a signable multipart response.

pub mod engine;

pub use engine::api::{create_router, ApiState};
pub use engine::config::{ServerConfig, StoreBackend};
pub use engine::signing::Signer;
pub use engine::store::{BundleRef, GitHubStore, LocalStore, UpdateStore};
