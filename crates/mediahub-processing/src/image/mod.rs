//! Image processing module
//!
//! - Fit modes and resizing (resize)
//! - Original optimization and conversion rendering (manipulator)

pub mod manipulator;
pub mod resize;

pub use manipulator::{ImageManipulator, Rendition};
pub use resize::{ImageResize, ResizeDimensions};
