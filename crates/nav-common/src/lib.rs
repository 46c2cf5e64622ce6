//! Common utilities and data structures shared by the navigation crates

mod math;
mod vector;

pub use math::*;
pub use vector::*;

/// Represents a 3D position (Z is up)
pub type Vec3 = glam::Vec3;

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid navigation mesh: {0}")]
    InvalidMesh(String),

    #[error("crumb cache error: {0}")]
    CrumbCache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for navigation operations
pub type Result<T> = std::result::Result<T, Error>;
