//! MediaHub Storage Library
//!
//! Named disks for asset files: the `Disk` trait with a local filesystem and an
//! object store (S3) implementation, a `DiskManager` resolving disks by name, and
//! helpers for moving files between the local filesystem and disks.
//!
//! # Storage key format
//!
//! Keys are `/`-separated paths relative to the disk root, e.g.
//! `media/{asset_id}/photo.jpg`. Keys must not contain `..` or a leading `/`.

pub mod copy;
pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod manager;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use copy::{copy_into, copy_to_local, delete_dir_if_empty};
pub use factory::create_disk;
#[cfg(feature = "storage-local")]
pub use local::LocalDisk;
pub use manager::DiskManager;
pub use mediahub_core::DiskDriver;
#[cfg(feature = "storage-s3")]
pub use s3::ObjectStoreDisk;
pub use traits::{collect_stream, stream_from_bytes, ByteStream, Disk, StorageError, StorageResult};
