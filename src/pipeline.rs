//! Processing modes over loaded stereo pairs.
//!
//! Every stage returns freshly owned values; nothing loaded is modified.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::data::error::DicError;
use crate::data::filter::filter;
use crate::data::merge::merge_timestep;
use crate::data::mesh::triangulate;
use crate::data::model::{FilteredResult, PointCloud, StereoPair};

/// Label given to results built from all stereo pairs merged together.
pub const COMBINED_LABEL: &str = "combined";

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Order of triangulation and filtering. The two do not give the same mesh:
/// triangulating first loses every face touching an invalid point, filtering
/// first bridges the gaps the invalid points leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MeshPolicy {
    /// Mesh all points, then drop invalid points and their faces.
    #[default]
    TriangulateThenFilter,
    /// Drop invalid points, then mesh what remains.
    FilterThenTriangulate,
}

/// How stereo pairs are combined at each timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One mesh per stereo pair, meant to be overlaid.
    #[default]
    Overlay,
    /// All pairs merged into one cloud, then meshed.
    Combined,
    /// All pairs merged, invalid points dropped, no mesh.
    Scatter,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Point and face counts before and after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub points_in: usize,
    pub points_kept: usize,
    pub faces_in: usize,
    pub faces_kept: usize,
}

/// The filtered output for one stereo pair (or the merged set) at one timestep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledResult {
    pub label: String,
    pub timestep: usize,
    pub summary: Summary,
    pub result: FilteredResult,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Number of timesteps in the longest stereo pair.
    pub fn timestep_count(pairs: &[StereoPair]) -> usize {
        pairs.iter().map(StereoPair::len).max().unwrap_or(0)
    }

    /// Mesh and filter one cloud according to the configured policy.
    pub fn mesh_and_filter(&self, cloud: &PointCloud) -> Result<(FilteredResult, Summary), DicError> {
        let predicate = &self.config.predicate;
        let (result, faces_in) = match self.config.policy {
            MeshPolicy::TriangulateThenFilter => {
                let mesh = triangulate(cloud)?;
                (filter(cloud, Some(&mesh), predicate)?, mesh.len())
            }
            MeshPolicy::FilterThenTriangulate => {
                let mut filtered = filter(cloud, None, predicate)?;
                filtered.mesh = triangulate(&filtered.cloud)?;
                let faces = filtered.mesh.len();
                (filtered, faces)
            }
        };

        let summary = Summary {
            points_in: cloud.len(),
            points_kept: result.cloud.len(),
            faces_in,
            faces_kept: result.mesh.len(),
        };
        Ok((result, summary))
    }

    /// Drop invalid points without meshing.
    pub fn filter_points(&self, cloud: &PointCloud) -> Result<(FilteredResult, Summary), DicError> {
        let result = filter(cloud, None, &self.config.predicate)?;
        let summary = Summary {
            points_in: cloud.len(),
            points_kept: result.cloud.len(),
            ..Summary::default()
        };
        Ok((result, summary))
    }

    /// Process a single timestep in the configured mode.
    pub fn run_timestep(&self, pairs: &[StereoPair], timestep: usize) -> Result<Vec<LabeledResult>> {
        let results = match self.config.mode {
            Mode::Overlay => self.overlay(pairs, timestep)?,
            Mode::Combined | Mode::Scatter => {
                let merged = merge_timestep(pairs, timestep)
                    .with_context(|| format!("merging stereo pairs at timestep {timestep}"))?;
                let (result, summary) = if self.config.mode == Mode::Combined {
                    self.mesh_and_filter(&merged)
                } else {
                    self.filter_points(&merged)
                }
                .with_context(|| format!("{COMBINED_LABEL} point cloud, timestep {timestep}"))?;

                vec![LabeledResult {
                    label: COMBINED_LABEL.to_string(),
                    timestep,
                    summary,
                    result,
                }]
            }
        };

        for r in &results {
            log_summary(r);
        }
        Ok(results)
    }

    /// Process the configured timestep, or every timestep when none is set.
    ///
    /// Fails with `EmptyInput` when no stereo pair loaded a single frame.
    pub fn run(&self, pairs: &[StereoPair]) -> Result<Vec<LabeledResult>> {
        if pairs.iter().all(|p| p.loaded_count() == 0) {
            let labels: Vec<&str> = pairs.iter().map(|p| p.label.as_str()).collect();
            return Err(DicError::EmptyInput(format!(
                "no frames loaded from stereo pair directories [{}]",
                labels.join(", ")
            ))
            .into());
        }

        match self.config.timestep {
            Some(t) => self.run_timestep(pairs, t),
            None => self.run_all(pairs),
        }
    }

    /// Process every timestep of the longest stereo pair in order.
    pub fn run_all(&self, pairs: &[StereoPair]) -> Result<Vec<LabeledResult>> {
        let count = Self::timestep_count(pairs);
        info!(
            "Processing {count} timesteps of {} stereo pairs ({:?}, {:?})",
            pairs.len(),
            self.config.mode,
            self.config.policy
        );

        let mut results = Vec::new();
        for t in 0..count {
            if pairs.iter().all(|p| p.frame(t).is_none()) {
                warn!("No stereo pair loaded timestep {t}, skipping");
                continue;
            }
            results.extend(self.run_timestep(pairs, t)?);
        }
        Ok(results)
    }

    fn overlay(&self, pairs: &[StereoPair], timestep: usize) -> Result<Vec<LabeledResult>> {
        let mut results = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let Some(frame) = pair.frame(timestep) else {
                warn!(
                    "Stereo pair '{}' has no timestep {timestep}, skipping",
                    pair.label
                );
                continue;
            };

            let (result, summary) = self.mesh_and_filter(&frame.cloud).with_context(|| {
                format!(
                    "stereo pair '{}', timestep {timestep} ({})",
                    pair.label,
                    frame.source.display()
                )
            })?;

            results.push(LabeledResult {
                label: pair.label.clone(),
                timestep,
                summary,
                result,
            });
        }

        if results.is_empty() {
            return Err(DicError::EmptyInput(format!("no stereo pair has timestep {timestep}")).into());
        }
        Ok(results)
    }
}

fn log_summary(r: &LabeledResult) {
    let s = &r.summary;
    info!(
        "[{} t={}] kept {}/{} points, {}/{} faces",
        r.label, r.timestep, s.points_kept, s.points_in, s.faces_kept, s.faces_in
    );
}
