//! Error types for mutation testing

use std::path::PathBuf;
use thiserror::Error;

use crate::tree::NodePath;

/// Errors that can occur during mutation testing
#[derive(Debug, Error)]
pub enum MutationError {
    /// Requested operator is not in the catalog
    #[error("Unknown mutation operator '{name}'\n  Available operators: {}", available.join(", "))]
    UnknownOperator { name: String, available: Vec<String> },

    /// Operator declares no node kinds to inspect
    #[error("Mutation operator '{name}' declares no target node kinds")]
    MissingTargetKind { name: String },

    /// Requested higher-order strategy does not exist
    #[error("Unknown higher-order strategy '{name}'\n  Available strategies: {}", available.join(", "))]
    UnknownStrategy { name: String, available: Vec<String> },

    /// Target file doesn't exist
    #[error("File not found: {}", file.display())]
    FileNotFound { file: PathBuf },

    /// Failed to read source file
    #[error("Failed to read file '{}': {error}", file.display())]
    FileReadError { file: PathBuf, error: String },

    /// Failed to write an output file
    #[error("Failed to write '{}': {error}", file.display())]
    WriteError { file: PathBuf, error: String },

    /// Failed to parse source text into a syntax tree
    #[error("Failed to parse '{}': {error}", file.display())]
    ParseError { file: PathBuf, error: String },

    /// The unmutated tree cannot be printed back to source
    #[error("Cannot print '{}' back to source: {error}", file.display())]
    Unprintable { file: PathBuf, error: String },

    /// The unmutated source does not pass its own tests
    #[error("Tests fail on the unmutated source (exit status {status}):\n{output}")]
    BaselineFailed { status: String, output: String },

    /// Test command could not be started or waited on
    #[error("Test execution failed: {error}")]
    TestExecutionError { error: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl MutationError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        MutationError::ConfigError {
            message: message.into(),
        }
    }

    /// Whether the run should abort before any mutant is generated
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MutationError::UnknownOperator { .. }
                | MutationError::MissingTargetKind { .. }
                | MutationError::UnknownStrategy { .. }
                | MutationError::ConfigError { .. }
        )
    }
}

/// A candidate rewrite that could not be produced
///
/// Non-fatal: the engine logs it and skips the candidate.
#[derive(Debug, Clone, Error)]
#[error("Operator '{operator}' failed at {path}: {reason}")]
pub struct GenerationError {
    pub operator: String,
    pub path: NodePath,
    pub reason: String,
}

/// Failure inside an operator's `candidates`
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CandidateError(pub String);

/// A mutated tree that cannot be turned back into source text
#[derive(Debug, Clone, Error)]
pub enum SerializeError {
    #[error("{construct} cannot be expressed in the target language")]
    Unsupported { construct: String },

    #[error("Serialized mutant is not valid source: {error}")]
    Invalid { error: String },
}

/// Result type for mutation operations
pub type Result<T> = std::result::Result<T, MutationError>;
