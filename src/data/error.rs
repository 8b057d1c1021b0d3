use thiserror::Error;

// ---------------------------------------------------------------------------
// DicError – failures raised by the core and the ingestion boundary
// ---------------------------------------------------------------------------

/// Errors produced while building, merging, triangulating or filtering point
/// clouds.
///
/// Loader and pipeline code wraps these in `anyhow::Error` with extra context;
/// callers can still recover the kind with `err.downcast_ref::<DicError>()`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DicError {
    /// A source record lacks one or more required fields.
    #[error("{}: missing required field(s) {}", .source_id, .fields.join(", "))]
    MissingField {
        fields: Vec<String>,
        source_id: String,
    },

    /// Nothing to process: `merge` got no clouds, or no source loaded.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Triangulation impossible: fewer than 3 non-collinear projected points.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Parallel arrays disagree in length, or a face points outside its cloud.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
