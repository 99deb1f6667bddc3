use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const BOARDS: usize = 2;
const CHANNELS_PER_BAND: usize = 64 * BOARDS;
const ROWS: usize = 600;
const PITCH_MM: f64 = 1.6;

/// Unattenuated detector level per band.
const I0_HIGH: f64 = 45_000.0;
const I0_LOW: f64 = 30_000.0;

/// Linear attenuation coefficients per mm, (high, low).
const MU_KIMBERLITE: (f64, f64) = (0.045, 0.085);
const MU_DIAMOND: (f64, f64) = (0.020, 0.028);

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

/// Material thickness in mm at scan position `x`, as (kimberlite, diamond).
fn thickness_at(x: f64) -> (f64, f64) {
    // wedge 2mm → 30mm between 100 and 500, diamond 10mm at 600..620
    let kimberlite = if (100.0..=500.0).contains(&x) {
        2.0 + (x - 100.0) / 400.0 * 28.0
    } else {
        0.0
    };
    let diamond = if (600.0..=620.0).contains(&x) { 10.0 } else { 0.0 };
    (kimberlite, diamond)
}

/// Expected (high, low) transmitted intensity at position `x`.
fn beer_lambert(x: f64) -> (f64, f64) {
    let (tk, td) = thickness_at(x);
    let high = I0_HIGH * (-(MU_KIMBERLITE.0 * tk + MU_DIAMOND.0 * td)).exp();
    let low = I0_LOW * (-(MU_KIMBERLITE.1 * tk + MU_DIAMOND.1 * td)).exp();
    (high, low)
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    // columns[c][row] for D1..D(2 * CHANNELS_PER_BAND)
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(ROWS); 2 * CHANNELS_PER_BAND];
    let mut dropouts = 0usize;

    for row in 0..ROWS {
        let x = row as f64 * PITCH_MM;
        let (high, low) = beer_lambert(x);

        // Occasional single-exposure dropout on the high band.
        let high_gain = if rng.next_f64() < 0.01 {
            dropouts += 1;
            0.4
        } else {
            1.0
        };

        for (c, column) in columns.iter_mut().enumerate() {
            let (level, gain) = if c < CHANNELS_PER_BAND {
                (high, high_gain)
            } else {
                (low, 1.0)
            };
            let reading = rng.gauss(level * gain, level * 0.005).max(1.0);
            column.push(reading.round());
        }
    }

    let names: Vec<String> = (1..=columns.len()).map(|c| format!("D{c}")).collect();

    // CSV
    let csv_path = "sample_scan.csv";
    let mut writer = csv::Writer::from_path(csv_path).context("creating CSV")?;
    writer.write_record(&names)?;
    for row in 0..ROWS {
        writer.write_record(columns.iter().map(|col| col[row].to_string()))?;
    }
    writer.flush()?;

    // Parquet
    let schema = Arc::new(Schema::new(
        names
            .iter()
            .map(|n| Field::new(n, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|col| Arc::new(Float64Array::from(col)) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let parquet_path = "sample_scan.parquet";
    let file = std::fs::File::create(parquet_path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;

    log::info!("{dropouts} high-band dropouts injected");
    println!(
        "Wrote {ROWS} exposures ({BOARDS} boards, {} channels) to {csv_path} and {parquet_path}",
        names.len()
    );
    Ok(())
}
