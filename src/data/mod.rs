//! Data layer: point clouds, loading, merging, meshing and filtering.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet   (one directory per stereo pair)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → PointCloud, group into StereoPairs
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  merge    │  concatenate clouds (optional)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  mesh     │  Delaunay on the (x, y) projection → Mesh
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  drop invalid points, remap faces → FilteredResult
//!   └──────────┘
//! ```

pub mod error;
pub mod filter;
pub mod loader;
pub mod merge;
pub mod mesh;
pub mod model;

pub use error::DicError;
pub use filter::{filter, filter_with, StrainPredicate};
pub use loader::{load_file, load_stereo_pairs, ImportProfile};
pub use merge::{merge, merge_offsets, merge_timestep};
pub use mesh::triangulate;
pub use model::{FilteredResult, Frame, Mesh, PointCloud, StereoPair};
