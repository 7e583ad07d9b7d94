// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

//! Source file resolution and the project wide class registry.
//!
//! A class identifier maps to exactly one file below a fixed per node root
//! directory; the set of identifiers offered to the UI comes from the
//! registry (keyed by node type), never from a directory listing, so
//! unrelated files are never offered as choices.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DspError;

/// Maps class identifiers to source files below one root directory.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    root: PathBuf,
    extension: String,
}

impl SourceResolver {
    /// `extension` without the leading dot, e.g. `"dsp"`.
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self { root: root.into(), extension: extension.to_string() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if it does not exist yet.
    pub fn ensure_root(&self) -> Result<(), DspError> {
        if !self.root.is_dir() {
            std::fs::create_dir_all(&self.root)
                .map_err(|e| DspError::create_dir(&self.root, e))?;
        }
        Ok(())
    }

    /// `root/<class_id>.<ext>`. No subdirectory traversal, no sanitization
    /// beyond rejecting the empty identifier.
    pub fn resolve(&self, class_id: &str) -> Result<PathBuf, DspError> {
        if class_id.is_empty() {
            return Err(DspError::EmptyClassId);
        }
        Ok(self.root.join(format!("{}.{}", class_id, self.extension)))
    }

    /// Creates an empty file at `path` if absent.
    pub fn ensure_exists(&self, path: &Path) -> Result<(), DspError> {
        if !path.is_file() {
            std::fs::File::create(path).map_err(|e| DspError::create_file(path, e))?;
        }
        Ok(())
    }

    /// Loads the source text at `path`.
    pub fn load(&self, path: &Path) -> Result<String, DspError> {
        std::fs::read_to_string(path).map_err(|e| DspError::read_file(path, e))
    }
}

/// Project wide registry of known class identifiers, keyed by node type.
///
/// Shared between all nodes of a project as a [SharedCodeRegistry].
#[derive(Debug, Default)]
pub struct CodeRegistry {
    classes: HashMap<String, BTreeSet<String>>,
}

/// The registry handle nodes hold on to.
pub type SharedCodeRegistry = Arc<Mutex<CodeRegistry>>;

impl CodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedCodeRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Registers `class_id` for `node_type`. Returns whether it was new.
    pub fn get_or_create(&mut self, node_type: &str, class_id: &str) -> bool {
        let added = self
            .classes
            .entry(node_type.to_string())
            .or_default()
            .insert(class_id.to_string());
        if added {
            tracing::debug!(node_type, class_id, "registered DSP class");
        }
        added
    }

    /// All identifiers known for `node_type`, in stable sorted order.
    pub fn class_list(&self, node_type: &str) -> Vec<String> {
        self.classes
            .get(node_type)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}
