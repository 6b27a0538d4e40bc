//! MediaHub Core Library
//!
//! Domain models, error types, configuration, path naming and conversion rules shared
//! across all MediaHub components.

pub mod config;
pub mod conversions;
pub mod error;
pub mod jobs;
pub mod models;
pub mod naming;
pub mod storage_types;

// Re-export commonly used types
pub use config::{DiskConfig, MediaHubConfig, OriginalImageManipulations};
pub use conversions::{Conversion, ConversionRule, ConversionsConfig, Fit};
pub use error::{AppError, ErrorKind, ErrorMetadata, LogLevel, ValidationError};
pub use jobs::{DerivationDispatcher, DerivationJob, NoOpDispatcher};
pub use models::{Asset, AssetState, NewAsset};
pub use naming::PathNamer;
pub use storage_types::DiskDriver;
