// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

//! Error taxonomy for the control path.
//!
//! Nothing in here ever crosses into the real time thread. The audio side
//! reports skipped work through [crate::ProcessOutcome] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling, instantiating or locating user DSP code.
///
/// All of these are recoverable: a failed [crate::DspLifecycle::setup] leaves
/// the previously installed unit running (last-good-wins), and filesystem
/// trouble degrades into an empty source text which in turn fails compilation.
#[derive(Debug, Error)]
pub enum DspError {
    /// The backend rejected the source text. Carries the backend's error
    /// message verbatim for display in the host's diagnostics channel.
    #[error("compilation failed: {0}")]
    Compile(String),

    /// The factory compiled fine but produced no instance.
    #[error("factory produced no DSP instance")]
    Instantiate,

    /// A class identifier must not be empty.
    #[error("empty class identifier")]
    EmptyClassId,

    /// The per-node source root directory could not be created.
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be created.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be read.
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DspError {
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DspError::CreateDir { path: path.into(), source }
    }

    pub fn create_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DspError::CreateFile { path: path.into(), source }
    }

    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DspError::ReadFile { path: path.into(), source }
    }
}
