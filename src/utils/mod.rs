//! Shared numeric utilities

pub mod preprocessing;

pub use preprocessing::{dot, l2_normalize, ImagePreprocessor};
