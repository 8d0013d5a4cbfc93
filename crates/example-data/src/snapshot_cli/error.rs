//! Error types for the POI snapshot CLI.

use thiserror::Error;

use crate::error::{GenerationError, RegistryError};

/// Errors surfaced by the CLI parsing and generation flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    /// Registry path was not supplied.
    #[error("missing required flag: --registry")]
    MissingRegistryPath,
    /// Seed name was not supplied.
    #[error("missing required flag: --seed-name")]
    MissingSeedName,
    /// Output path was not supplied.
    #[error("missing required flag: --output")]
    MissingOutputPath,
    /// A flag expected a value but none was provided.
    #[error("missing value for {flag}")]
    MissingValue {
        /// Flag that was missing its value.
        flag: &'static str,
    },
    /// An unsupported argument was supplied.
    #[error("unknown argument: {value}")]
    UnknownArgument {
        /// Argument value that was not recognised.
        value: String,
    },
    /// The registry could not be loaded or the snapshot written.
    #[error("registry error: {source}")]
    Registry {
        /// Underlying registry error.
        #[from]
        source: RegistryError,
    },
    /// POI generation failed.
    #[error("generation error: {source}")]
    Generation {
        /// Underlying generation error.
        #[from]
        source: GenerationError,
    },
    /// Generated POIs could not be serialised.
    #[error("failed to serialise snapshot: {message}")]
    Serialise {
        /// Serialiser error message.
        message: String,
    },
}
