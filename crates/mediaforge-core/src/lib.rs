//! Core types for mediaforge: domain models, configuration, and the error
//! taxonomy shared by every other crate in the workspace.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod validation;

pub use config::AppConfig;
pub use error::{MediaError, MediaResult};
