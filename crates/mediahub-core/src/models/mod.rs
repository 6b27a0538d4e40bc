pub mod asset;

pub use asset::{next_updated_at, Asset, AssetState, NewAsset};
