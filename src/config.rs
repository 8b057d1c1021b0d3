//! Pipeline configuration, loadable from a JSON file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::StrainPredicate;
use crate::data::loader::ImportProfile;
use crate::pipeline::{MeshPolicy, Mode};

/// Settings for one pipeline run. Every field falls back to its default when
/// absent from the file.
///
/// ```json
/// {
///   "profile": "lavision",
///   "predicate": { "kind": "abs_below", "value": 1e-9 },
///   "policy": "triangulate_then_filter",
///   "mode": "overlay",
///   "timestep": 0
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Column naming of the source files.
    #[serde(default)]
    pub profile: ImportProfile,

    /// Which strain values mark a point as outside the ROI.
    #[serde(default)]
    pub predicate: StrainPredicate,

    /// Triangulate before or after dropping invalid points.
    #[serde(default)]
    pub policy: MeshPolicy,

    /// Per-pair meshes, one merged mesh, or merged points only.
    #[serde(default)]
    pub mode: Mode,

    /// Process a single timestep instead of all of them.
    #[serde(default)]
    pub timestep: Option<usize>,
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("writing config {}", path.as_ref().display()))?;
        Ok(())
    }
}
