//! psytest-store — Document-store backends.
//!
//! Implements the `DocumentStore` trait in memory, on local JSON files, and
//! against a REST document API, and loads the configuration that picks one.

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod rest;

pub use config::{create_store, load_config, load_config_from, PsytestConfig, StoreConfig};
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use rest::RestStore;
