use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::DicError;
use super::model::{Frame, PointCloud, StereoPair};

/// File extensions `load_file` understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "json", "parquet", "pq"];

// ---------------------------------------------------------------------------
// Import profiles – vendor column naming
// ---------------------------------------------------------------------------

/// Names of the four required columns in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub x: &'static str,
    pub y: &'static str,
    pub z: &'static str,
    pub strain: &'static str,
}

impl FieldMap {
    /// Columns in `x, y, z, strain` order.
    pub fn columns(&self) -> [&'static str; 4] {
        [self.x, self.y, self.z, self.strain]
    }
}

/// Known export layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImportProfile {
    /// LaVision DaVis vector field export.
    #[default]
    #[value(name = "lavision")]
    #[serde(rename = "lavision")]
    LaVision,
    /// Plain `x`, `y`, `z`, `strain` columns.
    Generic,
}

impl ImportProfile {
    pub fn fields(&self) -> FieldMap {
        match self {
            ImportProfile::LaVision => FieldMap {
                x: "x[mm]",
                y: "y[mm]",
                z: "z[mm]",
                strain: "Maximum normal strain - RC[S]",
            },
            ImportProfile::Generic => FieldMap {
                x: "x",
                y: "y",
                z: "z",
                strain: "strain",
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one export file into a point cloud.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one row per point (extra columns ignored)
/// * `.json`    – `[{ "<x>": 1.0, "<y>": 2.0, ... }, ...]`
/// * `.parquet` – flat numeric columns
///
/// Column names come from `profile`. Empty cells and nulls become `NaN`.
pub fn load_file(path: &Path, profile: ImportProfile) -> Result<PointCloud> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let cloud = match ext.as_str() {
        "csv" => load_csv(path, profile)?,
        "json" => load_json(path, profile)?,
        "parquet" | "pq" => load_parquet(path, profile)?,
        other => bail!("{}: unsupported file extension .{other}", path.display()),
    };

    cloud.validate()?;
    debug!("Loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

/// Supported files in `dir`, sorted by file stem.
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_supported_extension(path))
        .collect();

    files.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));
    Ok(files)
}

/// One sorted file list per stereo-pair directory.
///
/// Directories holding different numbers of files are tolerated with a
/// warning; later timesteps are then missing for the shorter pairs.
pub fn scan_stereo_pairs(dirs: &[PathBuf]) -> Result<Vec<Vec<PathBuf>>> {
    let listings = dirs
        .iter()
        .map(|dir| scan_directory(dir))
        .collect::<Result<Vec<_>>>()?;

    let counts: Vec<usize> = listings.iter().map(Vec::len).collect();
    if counts.windows(2).any(|w| w[0] != w[1]) {
        warn!("Stereo pair directories hold different file counts: {counts:?}");
    }
    Ok(listings)
}

/// Load every file of every stereo-pair directory.
///
/// A file that fails to load is reported and its timestep slot left empty;
/// the rest continue.
pub fn load_stereo_pairs(dirs: &[PathBuf], profile: ImportProfile) -> Result<Vec<StereoPair>> {
    let listings = scan_stereo_pairs(dirs)?;

    let mut pairs = Vec::with_capacity(dirs.len());
    for (dir, files) in dirs.iter().zip(listings) {
        let label = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let frames: Vec<Option<Frame>> = files
            .into_iter()
            .map(|source| match load_file(&source, profile) {
                Ok(cloud) => Some(Frame { source, cloud }),
                Err(err) => {
                    warn!("Skipping {}: {err:#}", source.display());
                    None
                }
            })
            .collect();

        let pair = StereoPair { label, frames };
        info!(
            "Stereo pair '{}': {}/{} timesteps loaded",
            pair.label,
            pair.loaded_count(),
            pair.len()
        );
        pairs.push(pair);
    }
    Ok(pairs)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn missing_fields(path: &Path, missing: Vec<&str>) -> anyhow::Error {
    DicError::MissingField {
        fields: missing.into_iter().map(String::from).collect(),
        source_id: path.display().to_string(),
    }
    .into()
}

/// Locate the profile columns in `names`, or report all that are absent.
fn locate_columns<S: AsRef<str>>(path: &Path, names: &[S], fields: FieldMap) -> Result<[usize; 4]> {
    let found = fields
        .columns()
        .map(|col| names.iter().position(|n| n.as_ref().trim() == col));

    let missing: Vec<&str> = fields
        .columns()
        .iter()
        .zip(found.iter())
        .filter(|(_, idx)| idx.is_none())
        .map(|(col, _)| *col)
        .collect();
    if !missing.is_empty() {
        return Err(missing_fields(path, missing));
    }

    Ok(found.map(|idx| idx.unwrap_or_default()))
}

fn cloud_from_columns(columns: [Vec<f64>; 4]) -> PointCloud {
    let [x, y, z, strain] = columns;
    PointCloud::from_parts_unchecked(x, y, z, strain)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row, then one row per measurement point.
fn load_csv(path: &Path, profile: ImportProfile) -> Result<PointCloud> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    debug!("{}: columns found {headers:?}", path.display());

    let fields = profile.fields();
    let idx = locate_columns(path, &headers, fields)?;
    let names = fields.columns();

    let mut columns: [Vec<f64>; 4] = Default::default();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (k, column) in columns.iter_mut().enumerate() {
            let cell = record.get(idx[k]).unwrap_or("");
            column.push(parse_cell(cell, row_no, names[k])?);
        }
    }

    Ok(cloud_from_columns(columns))
}

fn parse_cell(s: &str, row: usize, col: &str) -> Result<f64> {
    let tok = s.trim();
    if tok.is_empty() {
        return Ok(f64::NAN);
    }
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, '{col}': '{tok}' is not a number"))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "x[mm]": 1.5, "y[mm]": -3.2, "z[mm]": 0.1, "Maximum normal strain - RC[S]": 0.8 },
///   ...
/// ]
/// ```
fn load_json(path: &Path, profile: ImportProfile) -> Result<PointCloud> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;
    let fields = profile.fields();
    let names = fields.columns();

    // Every field must be present in every record; report what the first
    // incomplete record lacks.
    for rec in records {
        let obj = rec.as_object().context("Expected JSON objects as records")?;
        let missing: Vec<&str> = names.iter().copied().filter(|n| !obj.contains_key(*n)).collect();
        if !missing.is_empty() {
            return Err(missing_fields(path, missing));
        }
    }

    let mut columns: [Vec<f64>; 4] = Default::default();
    for (i, rec) in records.iter().enumerate() {
        for (k, column) in columns.iter_mut().enumerate() {
            column.push(json_to_f64(rec.get(names[k]), i, names[k])?);
        }
    }

    Ok(cloud_from_columns(columns))
}

fn json_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<f64> {
    match val {
        None | Some(JsonValue::Null) => Ok(f64::NAN),
        Some(v) => v
            .as_f64()
            .with_context(|| format!("Row {row}, '{col}': not a number")),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat numeric column per field.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path, profile: ImportProfile) -> Result<PointCloud> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    let schema_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    debug!("{}: columns found {schema_names:?}", path.display());

    let fields = profile.fields();
    let idx = locate_columns(path, &schema_names, fields)?;
    let names = fields.columns();

    let reader = builder.build().context("building parquet reader")?;

    let mut columns: [Vec<f64>; 4] = Default::default();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (k, column) in columns.iter_mut().enumerate() {
            extend_f64(column, batch.column(idx[k]))
                .with_context(|| format!("reading column '{}'", names[k]))?;
        }
    }

    Ok(cloud_from_columns(columns))
}

/// Append a numeric Arrow column to `out`, nulls as `NaN`.
fn extend_f64(out: &mut Vec<f64>, col: &Arc<dyn Array>) -> Result<()> {
    let any = col.as_any();
    match col.data_type() {
        DataType::Float64 => {
            let arr = any.downcast_ref::<Float64Array>().context("expected Float64Array")?;
            out.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        DataType::Float32 => {
            let arr = any.downcast_ref::<Float32Array>().context("expected Float32Array")?;
            out.extend(arr.iter().map(|v| v.map(f64::from).unwrap_or(f64::NAN)));
        }
        DataType::Int64 => {
            let arr = any.downcast_ref::<Int64Array>().context("expected Int64Array")?;
            out.extend(arr.iter().map(|v| v.map(|i| i as f64).unwrap_or(f64::NAN)));
        }
        DataType::Int32 => {
            let arr = any.downcast_ref::<Int32Array>().context("expected Int32Array")?;
            out.extend(arr.iter().map(|v| v.map(f64::from).unwrap_or(f64::NAN)));
        }
        other => bail!("expected a numeric column, got {other:?}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::tempdir;

    use super::*;

    const LAVISION_HEADER: &str =
        "x[mm],y[mm],z[mm],Displacement[mm],Maximum normal strain - RC[S]";

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn lavision_csv(rows: &[[f64; 4]]) -> String {
        let mut out = format!("{LAVISION_HEADER}\n");
        for r in rows {
            out.push_str(&format!("{},{},{},0.01,{}\n", r[0], r[1], r[2], r[3]));
        }
        out
    }

    #[test]
    fn test_profile_fields() {
        assert_eq!(ImportProfile::LaVision.fields().x, "x[mm]");
        assert_eq!(
            ImportProfile::LaVision.fields().strain,
            "Maximum normal strain - RC[S]"
        );
        assert_eq!(
            ImportProfile::Generic.fields().columns(),
            ["x", "y", "z", "strain"]
        );
    }

    #[test]
    fn test_load_lavision_csv() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "cam1-2-0001.csv",
            &lavision_csv(&[[0.0, 0.0, 1.0, 0.5], [1.0, 2.0, 3.0, 0.0]]),
        );

        let cloud = load_file(&path, ImportProfile::LaVision).unwrap();
        assert_eq!(cloud.x, vec![0.0, 1.0]);
        assert_eq!(cloud.y, vec![0.0, 2.0]);
        assert_eq!(cloud.z, vec![1.0, 3.0]);
        assert_eq!(cloud.strain, vec![0.5, 0.0]);
    }

    #[test]
    fn test_csv_empty_cell_is_nan() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "blank.csv", "x,y,z,strain\n1,2,3,\n");

        let cloud = load_file(&path, ImportProfile::Generic).unwrap();
        assert_eq!(cloud.len(), 1);
        assert!(cloud.strain[0].is_nan());
    }

    #[test]
    fn test_csv_bad_number() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "bad.csv", "x,y,z,strain\n1,2,abc,0\n");
        let err = load_file(&path, ImportProfile::Generic).unwrap_err();
        assert!(format!("{err:#}").contains("abc"));
    }

    #[test]
    fn test_csv_missing_columns() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "partial.csv", "x[mm],y[mm]\n1,2\n");

        let err = load_file(&path, ImportProfile::LaVision).unwrap_err();
        match err.downcast_ref::<DicError>() {
            Some(DicError::MissingField { fields, source_id }) => {
                assert_eq!(
                    fields,
                    &vec!["z[mm]".to_string(), "Maximum normal strain - RC[S]".to_string()]
                );
                assert!(source_id.ends_with("partial.csv"));
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_load_json_records() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "frame.json",
            r#"[{"x": 0, "y": 1, "z": 2, "strain": 0.3, "extra": "ignored"},
                {"x": 4, "y": 5, "z": 6, "strain": null}]"#,
        );

        let cloud = load_file(&path, ImportProfile::Generic).unwrap();
        assert_eq!(cloud.x, vec![0.0, 4.0]);
        assert_eq!(cloud.strain[0], 0.3);
        assert!(cloud.strain[1].is_nan());
    }

    #[test]
    fn test_json_missing_field() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "frame.json", r#"[{"x": 0, "y": 1, "z": 2}]"#);

        let err = load_file(&path, ImportProfile::Generic).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DicError>(),
            Some(DicError::MissingField { fields, .. }) if fields == &vec!["strain".to_string()]
        ));
    }

    #[test]
    fn test_load_parquet_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Float64, false),
            Field::new("y", DataType::Float32, false),
            Field::new("z", DataType::Int64, false),
            Field::new("strain", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![0.0, 1.0, 2.0])),
                Arc::new(Float32Array::from(vec![0.5f32, 1.5, 2.5])),
                Arc::new(Int64Array::from(vec![7, 8, 9])),
                Arc::new(Float64Array::from(vec![Some(0.1), None, Some(0.0)])),
            ],
        )
        .unwrap();
        let file = fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let cloud = load_file(&path, ImportProfile::Generic).unwrap();
        assert_eq!(cloud.x, vec![0.0, 1.0, 2.0]);
        assert_eq!(cloud.y, vec![0.5, 1.5, 2.5]);
        assert_eq!(cloud.z, vec![7.0, 8.0, 9.0]);
        assert!(cloud.strain[1].is_nan());
        assert_eq!(cloud.strain[2], 0.0);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "frame.txt", "x,y,z,strain\n");
        assert!(load_file(&path, ImportProfile::Generic).is_err());
    }

    #[test]
    fn test_scan_directory_sorted_by_stem() {
        let dir = tempdir().unwrap();
        for name in ["b-0002.csv", "b-0001.csv", "notes.txt", "b-0010.csv"] {
            write_file(dir.path(), name, "x,y,z,strain\n");
        }

        let files = scan_directory(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b-0001.csv", "b-0002.csv", "b-0010.csv"]);
    }

    #[test]
    fn test_load_stereo_pairs_skips_bad_sources() {
        let root = tempdir().unwrap();
        let cam12 = root.path().join("cam1-2");
        let cam23 = root.path().join("cam2-3");
        fs::create_dir_all(&cam12).unwrap();
        fs::create_dir_all(&cam23).unwrap();

        let good = lavision_csv(&[[0.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]]);
        write_file(&cam12, "cam1-2-0001.csv", &good);
        write_file(&cam12, "cam1-2-0002.csv", &good);
        write_file(&cam23, "cam2-3-0001.csv", &good);
        // Missing the strain column: reported and skipped.
        write_file(&cam23, "cam2-3-0002.csv", "x[mm],y[mm],z[mm]\n0,0,0\n");

        let pairs =
            load_stereo_pairs(&[cam12.clone(), cam23.clone()], ImportProfile::LaVision).unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].label, "cam1-2");
        assert_eq!(pairs[0].len(), 2);
        assert_eq!(pairs[0].loaded_count(), 2);
        assert_eq!(pairs[1].label, "cam2-3");
        assert_eq!(pairs[1].len(), 2);
        assert_eq!(pairs[1].loaded_count(), 1);
        assert!(pairs[1].frame(0).unwrap().source.ends_with("cam2-3-0001.csv"));
        assert!(pairs[1].frame(1).is_none());
        assert_eq!(pairs[0].frame(1).unwrap().cloud.len(), 3);
    }

    #[test]
    fn test_failed_source_keeps_timestep_alignment() {
        let root = tempdir().unwrap();
        let b = root.path().join("b");
        fs::create_dir_all(&b).unwrap();

        let row = |x: f64| lavision_csv(&[[x, 0.0, 0.0, 1.0]]);
        write_file(&b, "b-0001.csv", &row(1.0));
        write_file(&b, "b-0002.csv", "x[mm],y[mm],z[mm]\n0,0,0\n");
        write_file(&b, "b-0003.csv", &row(3.0));

        let pairs = load_stereo_pairs(&[b], ImportProfile::LaVision).unwrap();
        let pair = &pairs[0];
        assert_eq!(pair.len(), 3);
        assert!(pair.frame(1).is_none());
        assert_eq!(pair.frame(2).unwrap().cloud.x, vec![3.0]);
        assert!(pair.frame(2).unwrap().source.ends_with("b-0003.csv"));
    }

    #[test]
    fn test_unequal_file_counts_tolerated() {
        let root = tempdir().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        write_file(&a, "a-0001.csv", "x,y,z,strain\n");
        write_file(&a, "a-0002.csv", "x,y,z,strain\n");
        write_file(&b, "b-0001.csv", "x,y,z,strain\n");

        let listings = scan_stereo_pairs(&[a, b]).unwrap();
        assert_eq!(listings[0].len(), 2);
        assert_eq!(listings[1].len(), 1);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let root = tempdir().unwrap();
        let missing = root.path().join("nope");
        assert!(load_stereo_pairs(&[missing], ImportProfile::Generic).is_err());
    }
}
