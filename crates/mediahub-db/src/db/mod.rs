//! Database repositories for data access layer
//!
//! Asset records live in the `media_assets` table. `media/` holds the repository
//! contract with its PostgreSQL and in-memory implementations; `pool` handles
//! connections and embedded migrations.
//
// Media repositories
pub mod media;
//
// Connection pool and migrations
pub mod pool;
//
pub use media::{AssetRepository, AssetRow, InMemoryAssetRepository, PgAssetRepository};
pub use pool::{connect, run_migrations, MIGRATOR};
