//! MediaHub Processing Library
//!
//! Ingestion (source normalization, hashing, validation, storage) and derivation
//! (original optimization and conversion rendering) of media assets.

pub mod hasher;
pub mod mime;
pub mod pipeline;
pub mod source;
pub mod validator;

#[cfg(feature = "image")]
pub mod compression;
#[cfg(feature = "image")]
pub mod derivation;
#[cfg(feature = "image")]
pub mod image;

// Re-export commonly used types
pub use hasher::ContentHasher;
pub use mime::{detect_file, detect_from_bytes, DetectedType};
pub use pipeline::{BatchFailure, BatchOutcome, IngestOptions, Ingested, IngestionPipeline};
pub use source::{MediaSource, NormalizedSource, SourceNormalizer, UploadedFile};
pub use validator::FileValidator;

#[cfg(feature = "image")]
pub use compression::{ImageCompressor, OutputFormat, QualityPreset};
#[cfg(feature = "image")]
pub use derivation::{DerivationEngine, DerivationReport, DerivationSettings};
#[cfg(feature = "image")]
pub use image::{ImageManipulator, ImageResize, Rendition, ResizeDimensions};
