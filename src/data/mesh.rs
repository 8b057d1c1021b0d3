//! Delaunay triangulation of a point cloud's (x, y) projection.
//!
//! The mesh is a projection mesh, not a surface reconstruction: z plays no
//! part, so two points that differ only in z are indistinguishable here.

use delaunator::{triangulate as delaunay, Point};
use log::{debug, warn};

use super::error::DicError;
use super::model::{Mesh, PointCloud};

/// Triangulate the (x, y) projection of `cloud`.
///
/// Points whose projected coordinates are not finite are left out and never
/// referenced by a face. Coincident points are tolerated; the duplicate is
/// simply not used as a vertex.
///
/// Fails with [`DicError::DegenerateGeometry`] when fewer than 3 usable
/// points remain or when they are all collinear.
pub fn triangulate(cloud: &PointCloud) -> Result<Mesh, DicError> {
    cloud.validate()?;

    // Indices of points that can be placed in the plane.
    let usable: Vec<usize> = cloud
        .project_xy()
        .enumerate()
        .filter(|(_, (x, y))| x.is_finite() && y.is_finite())
        .map(|(i, _)| i)
        .collect();

    if usable.len() < cloud.len() {
        warn!(
            "{} of {} points have non-finite x/y and are left out of the mesh",
            cloud.len() - usable.len(),
            cloud.len()
        );
    }

    if usable.len() < 3 {
        return Err(DicError::DegenerateGeometry(format!(
            "need at least 3 points with finite x/y, got {}",
            usable.len()
        )));
    }

    let points: Vec<Point> = usable
        .iter()
        .map(|&i| Point {
            x: cloud.x[i],
            y: cloud.y[i],
        })
        .collect();

    let result = delaunay(&points);

    if result.triangles.is_empty() {
        return Err(DicError::DegenerateGeometry(format!(
            "all {} projected points are collinear",
            points.len()
        )));
    }

    // Map local triangulation indices back to cloud indices.
    let faces: Vec<[usize; 3]> = result
        .triangles
        .chunks_exact(3)
        .map(|t| [usable[t[0]], usable[t[1]], usable[t[2]]])
        .collect();

    debug!(
        "Triangulated {} points into {} faces (XY projection)",
        points.len(),
        faces.len()
    );

    Ok(Mesh::new(faces))
}
