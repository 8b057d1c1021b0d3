use log::{debug, warn};

use super::error::DicError;
use super::model::{PointCloud, StereoPair};

// ---------------------------------------------------------------------------
// Concatenation of point clouds
// ---------------------------------------------------------------------------

/// Concatenate clouds component-wise.
///
/// Cloud order and point order within each cloud are preserved, so point `i`
/// of the result is cloud `c`, local index `i - merge_offsets(clouds)[c]`.
/// Inputs are not re-validated here.
pub fn merge(clouds: &[PointCloud]) -> Result<PointCloud, DicError> {
    if clouds.is_empty() {
        return Err(DicError::EmptyInput("merge called with no point clouds".into()));
    }

    let total: usize = clouds.iter().map(PointCloud::len).sum();
    let mut x = Vec::with_capacity(total);
    let mut y = Vec::with_capacity(total);
    let mut z = Vec::with_capacity(total);
    let mut strain = Vec::with_capacity(total);

    for cloud in clouds {
        x.extend_from_slice(&cloud.x);
        y.extend_from_slice(&cloud.y);
        z.extend_from_slice(&cloud.z);
        strain.extend_from_slice(&cloud.strain);
    }

    debug!("Merged {} clouds into {} points", clouds.len(), x.len());

    Ok(PointCloud::from_parts_unchecked(x, y, z, strain))
}

/// Start offset of each cloud inside the result of [`merge`].
pub fn merge_offsets(clouds: &[PointCloud]) -> Vec<usize> {
    clouds
        .iter()
        .scan(0usize, |offset, cloud| {
            let start = *offset;
            *offset += cloud.len();
            Some(start)
        })
        .collect()
}

/// Merge the frame at `timestep` of every stereo pair.
///
/// Pairs that have no frame at `timestep` are skipped with a warning.
pub fn merge_timestep(pairs: &[StereoPair], timestep: usize) -> Result<PointCloud, DicError> {
    let mut clouds = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match pair.frame(timestep) {
            Some(frame) => clouds.push(frame.cloud.clone()),
            None => warn!(
                "Stereo pair '{}' has no timestep {timestep} ({}/{} loaded), skipping",
                pair.label,
                pair.loaded_count(),
                pair.len()
            ),
        }
    }

    if clouds.is_empty() {
        return Err(DicError::EmptyInput(format!(
            "no stereo pair has timestep {timestep}"
        )));
    }
    merge(&clouds)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::data::model::Frame;

    fn cloud(values: &[f64]) -> PointCloud {
        PointCloud::new(
            values.to_vec(),
            values.iter().map(|v| v * 2.0).collect(),
            values.iter().map(|v| v * 3.0).collect(),
            values.iter().map(|v| v * 0.1).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let a = cloud(&[1.0, 2.0]);
        let b = cloud(&[3.0]);
        let c = cloud(&[4.0, 5.0, 6.0]);

        let merged = merge(&[a, b, c]).unwrap();
        assert!(merged.validate().is_ok());
        assert_eq!(merged.x, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(merged.y, vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
        assert_eq!(merged.z[3], 12.0);
        assert_eq!(merged.strain.len(), 6);
    }

    #[test]
    fn test_merge_empty_input() {
        let err = merge(&[]).unwrap_err();
        assert!(matches!(err, DicError::EmptyInput(_)));
    }

    #[test]
    fn test_merge_single_cloud_is_identity() {
        let a = cloud(&[1.0, 2.0, 3.0]);
        assert_eq!(merge(std::slice::from_ref(&a)).unwrap(), a);
    }

    #[test]
    fn test_merge_offsets() {
        let clouds = [cloud(&[1.0, 2.0]), cloud(&[]), cloud(&[3.0, 4.0, 5.0])];
        assert_eq!(merge_offsets(&clouds), vec![0, 2, 2]);

        let merged = merge(&clouds).unwrap();
        let offsets = merge_offsets(&clouds);
        assert_eq!(merged.x[offsets[2] + 1], clouds[2].x[1]);
    }

    #[test]
    fn test_merge_keeps_mismatch_for_later_validation() {
        let bad = PointCloud::from_parts_unchecked(
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0, 2.0],
            vec![1.0, 1.0],
        );
        let merged = merge(&[bad]).unwrap();
        assert!(matches!(
            merged.validate(),
            Err(DicError::InvariantViolation(_))
        ));
    }

    fn pair(label: &str, frames: Vec<PointCloud>) -> StereoPair {
        StereoPair {
            label: label.to_string(),
            frames: frames
                .into_iter()
                .enumerate()
                .map(|(i, cloud)| {
                    Some(Frame {
                        source: PathBuf::from(format!("{label}-{i:04}.csv")),
                        cloud,
                    })
                })
                .collect(),
        }
    }

    #[test]
    fn test_merge_timestep_skips_short_pairs() {
        let pairs = vec![
            pair("cam1-2", vec![cloud(&[1.0]), cloud(&[2.0])]),
            pair("cam2-3", vec![cloud(&[3.0])]),
            pair("cam3-4", vec![cloud(&[4.0]), cloud(&[5.0, 6.0])]),
        ];

        let t0 = merge_timestep(&pairs, 0).unwrap();
        assert_eq!(t0.x, vec![1.0, 3.0, 4.0]);

        let t1 = merge_timestep(&pairs, 1).unwrap();
        assert_eq!(t1.x, vec![2.0, 5.0, 6.0]);

        assert!(matches!(
            merge_timestep(&pairs, 2),
            Err(DicError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_merge_timestep_skips_failed_slot() {
        let mut b = pair("b", vec![cloud(&[10.0]), cloud(&[20.0]), cloud(&[30.0])]);
        b.frames[1] = None;
        let pairs = vec![
            pair("a", vec![cloud(&[1.0]), cloud(&[2.0]), cloud(&[3.0])]),
            b,
        ];

        assert_eq!(merge_timestep(&pairs, 1).unwrap().x, vec![2.0]);
        assert_eq!(merge_timestep(&pairs, 2).unwrap().x, vec![3.0, 30.0]);
    }
}
