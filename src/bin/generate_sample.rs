use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use dic_mesh::data::loader::ImportProfile;

/// Write synthetic LaVision-style exports: one directory per camera pair,
/// one CSV per timestep.
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output directory
    #[arg(short, long, default_value = "sample_data")]
    output_dir: PathBuf,
    /// Number of camera pairs
    #[arg(long, default_value_t = 3)]
    pairs: usize,
    /// Timesteps per pair
    #[arg(long, default_value_t = 5)]
    timesteps: usize,
    /// Grid points per axis for each camera view
    #[arg(long, default_value_t = 40)]
    resolution: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// Specimen: a 200 x 100 mm plate, loaded so strain peaks at its centre.
const PLATE_HALF_WIDTH: f64 = 100.0;
const PLATE_HALF_HEIGHT: f64 = 50.0;
// Each camera sees a 100 mm wide window; neighbouring windows overlap.
const VIEW_WIDTH: f64 = 100.0;
const VIEW_MARGIN: f64 = 15.0;

fn strain_at(x: f64, y: f64, load: f64) -> f64 {
    let r2 = (x / 60.0).powi(2) + (y / 30.0).powi(2);
    load * (-r2).exp()
}

fn bulge_at(x: f64, y: f64, load: f64) -> f64 {
    let r2 = (x / PLATE_HALF_WIDTH).powi(2) + (y / PLATE_HALF_HEIGHT).powi(2);
    load * 2.0 * (1.0 - r2).max(0.0)
}

fn write_frame(
    path: &Path,
    pair: usize,
    pair_count: usize,
    timestep: usize,
    args: &Args,
    rng: &mut SimpleRng,
) -> Result<usize> {
    let fields = ImportProfile::LaVision.fields();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        fields.x,
        fields.y,
        fields.z,
        "Displacement[mm]",
        fields.strain,
    ])?;

    // Spread the camera windows evenly across the plate.
    let span = 2.0 * PLATE_HALF_WIDTH - VIEW_WIDTH;
    let x0 = if pair_count > 1 {
        -PLATE_HALF_WIDTH + span * pair as f64 / (pair_count - 1) as f64
    } else {
        -VIEW_WIDTH / 2.0
    };
    let load = 0.2 * (timestep + 1) as f64;
    let n = args.resolution.max(2);

    let mut rows = 0;
    for j in 0..n {
        for i in 0..n {
            // The camera grid extends past the plate; those points are noise.
            let x = x0 - VIEW_MARGIN + (VIEW_WIDTH + 2.0 * VIEW_MARGIN) * i as f64 / (n - 1) as f64;
            let y = -PLATE_HALF_HEIGHT - VIEW_MARGIN
                + (2.0 * (PLATE_HALF_HEIGHT + VIEW_MARGIN)) * j as f64 / (n - 1) as f64;
            let jitter_x = rng.gauss(0.0, 0.05);
            let jitter_y = rng.gauss(0.0, 0.05);

            let inside = x.abs() <= PLATE_HALF_WIDTH && y.abs() <= PLATE_HALF_HEIGHT;
            let (z, displacement, strain) = if inside {
                let noise = rng.gauss(0.0, 0.002);
                // Keep in-ROI readings away from the zero sentinel.
                let strain = (strain_at(x, y, load) + noise).abs().max(1e-6);
                let z = bulge_at(x, y, load) + rng.gauss(0.0, 0.01);
                (z, z.abs(), strain)
            } else {
                (0.0, 0.0, 0.0)
            };

            writer.write_record(&[
                format!("{:.4}", x + jitter_x),
                format!("{:.4}", y + jitter_y),
                format!("{z:.4}"),
                format!("{displacement:.4}"),
                format!("{strain:.6}"),
            ])?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    for pair in 0..args.pairs {
        let label = format!("cam{}-{}", pair + 1, pair + 2);
        let dir = args.output_dir.join(&label);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        for timestep in 0..args.timesteps {
            let path = dir.join(format!("vector_field_export_{label}-{:04}.csv", timestep + 1));
            let rows = write_frame(&path, pair, args.pairs, timestep, &args, &mut rng)?;
            println!("Wrote {rows} points to {}", path.display());
        }
    }

    println!(
        "Generated {} pairs x {} timesteps in {}",
        args.pairs,
        args.timesteps,
        args.output_dir.display()
    );
    Ok(())
}
