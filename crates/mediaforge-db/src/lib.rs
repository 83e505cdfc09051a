//! Postgres persistence for media metadata records.

pub mod assets;
pub mod setup;

pub use assets::{AssetFilter, AssetRepository};
pub use setup::setup_database;
