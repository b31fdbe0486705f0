//! psytest-core — Test-taking engine, traits, and scoring.
//!
//! This crate defines the data model, the collaborator traits, and the
//! sampling, timing and scoring logic of a psychometric test attempt.

pub mod access;
pub mod answers;
pub mod assembler;
pub mod error;
pub mod model;
pub mod parser;
pub mod report;
pub mod repository;
pub mod results;
pub mod sampler;
pub mod scorer;
pub mod session;
pub mod statistics;
pub mod timer;
pub mod traits;

pub use error::{Result, TestError};
