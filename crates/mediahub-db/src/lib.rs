//! MediaHub DB Library
//!
//! Persistence of asset records (PostgreSQL via sqlx, or in memory) and the
//! `MediaStore` facade that keeps records and files consistent.

pub mod db;
pub mod store;

pub use db::{
    connect, run_migrations, AssetRepository, AssetRow, InMemoryAssetRepository,
    PgAssetRepository, MIGRATOR,
};
pub use store::{MediaStore, StorageLocation};
