//! Command-line interface.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::data::loader::{load_file, load_stereo_pairs, ImportProfile};
use crate::data::mesh::triangulate;
use crate::pipeline::{LabeledResult, MeshPolicy, Mode, Pipeline};

#[derive(Parser)]
#[command(name = "dic-mesh")]
#[command(about = "Strain surface meshes from stereo DIC exports", version)]
pub struct Cli {
    /// Path to JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mesh and filter every timestep of one or more stereo-pair directories
    Process {
        /// One directory of exports per stereo pair
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// Column naming of the export files
        #[arg(long, value_enum)]
        profile: Option<ImportProfile>,
        /// Per-pair meshes, merged mesh, or merged points only
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Triangulate before or after dropping invalid points
        #[arg(long, value_enum)]
        policy: Option<MeshPolicy>,
        /// Only process this timestep (0-based)
        #[arg(short, long)]
        timestep: Option<usize>,
        /// Write the filtered meshes as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a single export and report what the pipeline would see
    Inspect {
        /// Export file (.csv, .json, .parquet)
        file: PathBuf,
        /// Column naming of the export file
        #[arg(long, value_enum)]
        profile: Option<ImportProfile>,
    },
}

/// JSON document handed to a renderer.
#[derive(Serialize)]
struct Export<'a> {
    config: &'a PipelineConfig,
    results: &'a [LabeledResult],
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides the -v level.
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => {
            let cfg = PipelineConfig::from_json_file(path)?;
            info!("Loaded config from: {}", path.display());
            cfg
        }
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Process {
            dirs,
            profile,
            mode,
            policy,
            timestep,
            output,
        } => {
            let config = PipelineConfig {
                profile: profile.unwrap_or(config.profile),
                mode: mode.unwrap_or(config.mode),
                policy: policy.unwrap_or(config.policy),
                timestep: timestep.or(config.timestep),
                ..config
            };
            cmd_process(&dirs, config, output.as_deref())
        }
        Commands::Inspect { file, profile } => {
            let profile = profile.unwrap_or(config.profile);
            cmd_inspect(&file, profile, &config)
        }
    }
}

fn cmd_process(dirs: &[PathBuf], config: PipelineConfig, output: Option<&Path>) -> Result<()> {
    let pairs = load_stereo_pairs(dirs, config.profile)?;
    let pipeline = Pipeline::new(config);
    let results = pipeline.run(&pairs)?;

    println!(
        "{:<16} {:>8} {:>10} {:>10} {:>10} {:>10}",
        "label", "timestep", "points", "kept", "faces", "kept"
    );
    for r in &results {
        let s = &r.summary;
        println!(
            "{:<16} {:>8} {:>10} {:>10} {:>10} {:>10}",
            r.label, r.timestep, s.points_in, s.points_kept, s.faces_in, s.faces_kept
        );
    }

    if let Some(path) = output {
        let file = File::create(path)
            .with_context(|| format!("creating output file {}", path.display()))?;
        let export = Export {
            config: pipeline.config(),
            results: &results,
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &export)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {} results to {}", results.len(), path.display());
    }

    Ok(())
}

fn cmd_inspect(path: &Path, profile: ImportProfile, config: &PipelineConfig) -> Result<()> {
    let cloud = load_file(path, profile)?;

    println!("Source:         {}", path.display());
    println!("Points:         {}", cloud.len());
    match cloud.strain_range() {
        Some((lo, hi)) => println!("Strain range:   {lo:.6} .. {hi:.6}"),
        None => println!("Strain range:   (no finite values)"),
    }
    println!(
        "Invalid points: {} ({:?})",
        config.predicate.count_invalid(&cloud),
        config.predicate
    );
    match triangulate(&cloud) {
        Ok(mesh) => println!("Faces:          {}", mesh.len()),
        Err(err) => println!("Faces:          none ({err})"),
    }
    Ok(())
}
