//! Strain surface meshes from stereo DIC exports.
//!
//! Per-camera-pair point exports are loaded into [`PointCloud`]s, optionally
//! merged, triangulated on their (x, y) projection and strain-filtered into a
//! [`FilteredResult`] ready for a renderer.

pub mod cli;
pub mod config;
pub mod data;
pub mod pipeline;

pub use config::PipelineConfig;
pub use data::{DicError, FilteredResult, Mesh, PointCloud, StrainPredicate};
pub use pipeline::Pipeline;
