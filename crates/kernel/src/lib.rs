//! Showcase kernel library.
//!
//! The structured content publishing pipeline plus its HTTP surface.
//! The main entry point for running the server is the `showcase` binary.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod models;
pub mod routes;
pub mod state;

pub use config::{Config, PipelineConfig};
pub use error::{AppError, PublishError, StoreError, ValidationError};
pub use state::AppState;
