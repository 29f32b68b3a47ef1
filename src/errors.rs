//! Typed error hierarchy for the bakery orchestrator.
//!
//! One enum per subsystem:
//! - `OrchestratorError`: failures surfaced by `BuildContext::run`
//! - `StageError`: failures raised by a single stage
//! - `CheckpointError`: persisting or inspecting `build.state.yaml`
//! - `ConfigError`: loading the bake configuration
//! - `LayoutError`: deriving the build directory layout

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the orchestrator's run protocol.
///
/// Stage and checkpoint failures are carried unchanged: the display text and
/// the source chain are those of the inner error.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open build log at {path}: {source}")]
    BuildLogOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create build directory {path}: {source}")]
    BuildDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a stage's `execute`. The orchestrator never interprets them.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Failed to spawn `{command}`: {source}")]
    CommandSpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No font sources found under {project_root}")]
    NoSources { project_root: PathBuf },

    #[error("No build_command configured and {file} is not a font binary")]
    NoBuilder { file: String },

    #[error("Invalid metadata in {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the checkpoint store. Write failures are fatal to the build.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to serialize build state: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Failed to write build state at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read build state at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build state at {path} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from loading a bake configuration.
///
/// An unreadable path is not an error: the loader falls back to the bundled
/// defaults. Only content that cannot be parsed ends up here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration {origin} is not valid YAML: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Configuration {origin} must be a mapping at the top level")]
    NotAMapping { origin: String },

    #[error("Bundled default configuration '{0}' is missing")]
    MissingDefaults(&'static str),
}

/// Errors from deriving a `BuildLayout`.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("{name} must be relative to the root, got {value}")]
    AbsoluteSubdir { name: &'static str, value: PathBuf },

    #[error("{name} must stay inside the root, got {value}")]
    EscapesRoot { name: &'static str, value: PathBuf },

    #[error("Failed to resolve root path {path}: {source}")]
    RootUnresolved {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
