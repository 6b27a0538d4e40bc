pub mod asset;
pub mod memory;
pub mod repository;

pub use asset::{AssetRow, PgAssetRepository};
pub use memory::InMemoryAssetRepository;
pub use repository::AssetRepository;
