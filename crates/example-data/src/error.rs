//! Error types for the example-data crate.
//!
//! Registry loading and POI generation fail with separate `thiserror` enums
//! so callers can tell a bad registry file from an exhausted generator.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing or querying a seed registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry file could not be read.
    #[error("failed to read registry file at '{path}': {message}")]
    IoError {
        /// Path to the registry file.
        path: Utf8PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// A generated snapshot could not be written.
    #[error("failed to write '{path}': {message}")]
    WriteError {
        /// Path that was being written.
        path: Utf8PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// The registry JSON is malformed or missing required fields.
    #[error("invalid registry JSON: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// The registry version is not supported.
    #[error("unsupported registry version: expected {expected}, found {actual}")]
    UnsupportedVersion {
        /// Expected version number.
        expected: u32,
        /// Actual version found in the registry.
        actual: u32,
    },

    /// The generation area has an invalid centre or radius.
    #[error("invalid generation area: {message}")]
    InvalidArea {
        /// Which part of the area is out of range.
        message: String,
    },

    /// The registry lists no categories.
    #[error("registry contains no POI categories")]
    EmptyCategories,

    /// A category name is not a lowercase identifier.
    #[error("invalid category name at index {index}: '{value}'")]
    InvalidCategory {
        /// Index of the category in the array.
        index: usize,
        /// The rejected name.
        value: String,
    },

    /// A category name appears twice.
    #[error("duplicate category '{name}'")]
    DuplicateCategory {
        /// The repeated name.
        name: String,
    },

    /// A category has a zero weight.
    #[error("category '{name}' must have a weight of at least 1")]
    ZeroWeight {
        /// Category with the zero weight.
        name: String,
    },

    /// The registry contains no seed definitions.
    #[error("registry contains no seed definitions")]
    EmptySeeds,

    /// The requested seed name was not found in the registry.
    #[error("seed '{name}' not found in registry")]
    SeedNotFound {
        /// The seed name that was not found.
        name: String,
    },
}

/// Errors that can occur during POI generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Failed to generate a valid POI name after maximum retries.
    #[error("failed to generate valid POI name after {max_attempts} attempts")]
    NameGenerationFailed {
        /// Number of attempts made before giving up.
        max_attempts: usize,
    },
}
