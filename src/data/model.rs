use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::DicError;

// ---------------------------------------------------------------------------
// PointCloud – one dataset's points and per-point strain
// ---------------------------------------------------------------------------

/// Surface points of one DIC export (or a merge of several).
///
/// `x`, `y`, `z` are in millimetres, `strain` is dimensionless. Index `i`
/// refers to the same measurement point in all four vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub strain: Vec<f64>,
}

impl PointCloud {
    /// Build a cloud, rejecting arrays of unequal length.
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>, strain: Vec<f64>) -> Result<Self, DicError> {
        let cloud = Self::from_parts_unchecked(x, y, z, strain);
        cloud.validate()?;
        Ok(cloud)
    }

    /// Build a cloud without checking lengths.
    ///
    /// The core operations call [`PointCloud::validate`] on entry, so a
    /// mismatched cloud is reported there instead.
    pub fn from_parts_unchecked(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>, strain: Vec<f64>) -> Self {
        PointCloud { x, y, z, strain }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Check that the four parallel arrays have the same length.
    pub fn validate(&self) -> Result<(), DicError> {
        let n = self.x.len();
        if self.y.len() != n || self.z.len() != n || self.strain.len() != n {
            return Err(DicError::InvariantViolation(format!(
                "point arrays differ in length (x: {}, y: {}, z: {}, strain: {})",
                self.x.len(),
                self.y.len(),
                self.z.len(),
                self.strain.len()
            )));
        }
        Ok(())
    }

    /// Number of points (length of `x`).
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// The (x, y) projection used for triangulation; z is dropped.
    pub fn project_xy(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// Smallest and largest finite strain value, if any.
    pub fn strain_range(&self) -> Option<(f64, f64)> {
        self.strain
            .iter()
            .copied()
            .filter(|s| s.is_finite())
            .fold(None, |acc, s| match acc {
                None => Some((s, s)),
                Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
            })
    }
}

// ---------------------------------------------------------------------------
// Mesh – triangle faces over a PointCloud
// ---------------------------------------------------------------------------

/// Triangle faces as vertex index triplets into the cloud they were built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mesh {
    pub faces: Vec<[usize; 3]>,
}

impl Mesh {
    pub fn new(faces: Vec<[usize; 3]>) -> Self {
        Mesh { faces }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of faces.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Largest vertex index referenced by any face.
    pub fn max_index(&self) -> Option<usize> {
        self.faces.iter().flat_map(|f| f.iter().copied()).max()
    }
}

// ---------------------------------------------------------------------------
// FilteredResult – compacted cloud plus remapped faces
// ---------------------------------------------------------------------------

/// Output of the strain filter.
///
/// `mesh` indexes into `cloud`; `kept_indices[k]` is the index point `k` had
/// before filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteredResult {
    pub cloud: PointCloud,
    pub mesh: Mesh,
    pub kept_indices: Vec<usize>,
}

// ---------------------------------------------------------------------------
// StereoPair – all timesteps of one camera pair
// ---------------------------------------------------------------------------

/// One loaded export file.
#[derive(Debug, Clone)]
pub struct Frame {
    pub source: PathBuf,
    pub cloud: PointCloud,
}

/// Every timestep of one camera pair, ordered by file stem.
///
/// There is one slot per scanned file. A file that failed to load leaves
/// `None` in its slot so later timesteps keep their position.
#[derive(Debug, Clone)]
pub struct StereoPair {
    pub label: String,
    pub frames: Vec<Option<Frame>>,
}

impl StereoPair {
    /// Number of timestep slots, loaded or not.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame at `timestep`, if its file loaded.
    pub fn frame(&self, timestep: usize) -> Option<&Frame> {
        self.frames.get(timestep).and_then(Option::as_ref)
    }

    /// Number of timesteps whose file loaded.
    pub fn loaded_count(&self) -> usize {
        self.frames.iter().flatten().count()
    }
}
