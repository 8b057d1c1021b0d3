use log::debug;
use serde::{Deserialize, Serialize};

use super::error::DicError;
use super::model::{FilteredResult, Mesh, PointCloud};

// ---------------------------------------------------------------------------
// Invalid-point predicate
// ---------------------------------------------------------------------------

/// Decides which strain readings mark a point as invalid (outside the ROI).
///
/// The default treats an exact `0.0` as the DIC software's "no measurement"
/// sentinel. A genuine zero-strain reading cannot be told apart from that
/// sentinel; measurement noise makes exact zeros unlikely inside the ROI.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StrainPredicate {
    /// `strain == 0.0`
    #[default]
    ZeroSentinel,
    /// `strain == value`
    Sentinel(f64),
    /// `|strain| < value`
    AbsBelow(f64),
    /// NaN or infinite strain.
    NonFinite,
    /// Zero sentinel or non-finite.
    ZeroOrNonFinite,
}

impl StrainPredicate {
    /// Whether a point with this strain value should be dropped.
    pub fn is_invalid(&self, strain: f64) -> bool {
        match *self {
            StrainPredicate::ZeroSentinel => strain == 0.0,
            StrainPredicate::Sentinel(v) => strain == v,
            StrainPredicate::AbsBelow(tol) => strain.abs() < tol,
            StrainPredicate::NonFinite => !strain.is_finite(),
            StrainPredicate::ZeroOrNonFinite => strain == 0.0 || !strain.is_finite(),
        }
    }

    /// Number of points in `cloud` this predicate would drop.
    pub fn count_invalid(&self, cloud: &PointCloud) -> usize {
        cloud.strain.iter().filter(|&&s| self.is_invalid(s)).count()
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Drop points matching `predicate`, and every face of `mesh` touching one.
///
/// See [`filter_with`].
pub fn filter(
    cloud: &PointCloud,
    mesh: Option<&Mesh>,
    predicate: &StrainPredicate,
) -> Result<FilteredResult, DicError> {
    filter_with(cloud, mesh, |s| predicate.is_invalid(s))
}

/// Drop points whose strain satisfies `is_invalid`.
///
/// The kept points are compacted in their original order and renumbered
/// `0..k`. When `mesh` is given, a face survives only if all three of its
/// vertices are kept; its indices are replaced by the new numbers with the
/// winding left as is. Without a mesh the result has no faces.
///
/// Removing every point is not an error. A cloud with mismatched array
/// lengths, or a mesh referencing a point the cloud does not have, fails with
/// [`DicError::InvariantViolation`].
pub fn filter_with<F>(
    cloud: &PointCloud,
    mesh: Option<&Mesh>,
    is_invalid: F,
) -> Result<FilteredResult, DicError>
where
    F: Fn(f64) -> bool,
{
    cloud.validate()?;

    if let Some(mesh) = mesh {
        if let Some(max) = mesh.max_index() {
            if max >= cloud.len() {
                return Err(DicError::InvariantViolation(format!(
                    "mesh references point {max} but the cloud has {} points",
                    cloud.len()
                )));
            }
        }
    }

    let keep: Vec<bool> = cloud.strain.iter().map(|&s| !is_invalid(s)).collect();

    // remap[i] = new index of original point i, if kept.
    let mut remap: Vec<Option<usize>> = Vec::with_capacity(keep.len());
    let mut kept_indices = Vec::new();
    for (i, &k) in keep.iter().enumerate() {
        if k {
            remap.push(Some(kept_indices.len()));
            kept_indices.push(i);
        } else {
            remap.push(None);
        }
    }

    let pick = |values: &[f64]| -> Vec<f64> { kept_indices.iter().map(|&i| values[i]).collect() };
    let filtered = PointCloud::from_parts_unchecked(
        pick(&cloud.x),
        pick(&cloud.y),
        pick(&cloud.z),
        pick(&cloud.strain),
    );

    let faces: Vec<[usize; 3]> = match mesh {
        Some(mesh) => mesh
            .faces
            .iter()
            .filter_map(|&[a, b, c]| Some([remap[a]?, remap[b]?, remap[c]?]))
            .collect(),
        None => Vec::new(),
    };

    debug!(
        "Filter kept {}/{} points and {}/{} faces",
        filtered.len(),
        cloud.len(),
        faces.len(),
        mesh.map_or(0, Mesh::len)
    );

    Ok(FilteredResult {
        cloud: filtered,
        mesh: Mesh::new(faces),
        kept_indices,
    })
}
