use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const MODELS: [&str; 4] = ["MESSAGEix-GLOBIOM 1.1", "REMIND-MAgPIE 2.1", "GCAM 5.3", "AIM/CGE 2.2"];
const REGIONS: [&str; 5] = ["World", "Asia", "Europe", "North America", "Latin America"];

/// (scenario, climate category, yearly decline of the trajectory)
const SCENARIOS: [(&str, &str, f64); 3] = [
    ("SSP1-1.9", "C1", 0.06),
    ("SSP2-2.6", "C2", 0.03),
    ("SSP2-4.5", "C3", 0.01),
];

/// (variable, unit, world 2020 value)
const VARIABLES: [(&str, &str, f64); 4] = [
    ("Emissions|CO2", "Mt CO2/yr", 38_000.0),
    ("Emissions|CH4", "Mt CH4/yr", 370.0),
    ("Primary Energy", "EJ/yr", 590.0),
    ("Final Energy|Electricity", "EJ/yr", 85.0),
];

/// Region shares of the world value, same order as `REGIONS`.
const REGION_SHARES: [f64; 5] = [1.0, 0.52, 0.12, 0.16, 0.09];

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

    /// Uniform noise in `[-spread, spread)`.
    fn jitter(&mut self, spread: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * spread
    }
}

/// One row of the long-format summary table.
struct Record {
    category: &'static str,
    model: &'static str,
    scenario: &'static str,
    region: &'static str,
    variable: &'static str,
    unit: &'static str,
    values: Vec<f64>,
}

fn years() -> Vec<i64> {
    (2020..=2050).step_by(5).collect()
}

fn build_records(rng: &mut SimpleRng) -> Vec<Record> {
    let years = years();
    let mut records = Vec::new();

    for model in MODELS {
        for &(scenario, category, decline) in &SCENARIOS {
            for (region, share) in REGIONS.into_iter().zip(REGION_SHARES) {
                for &(variable, unit, base) in &VARIABLES {
                    let start = base * share * (1.0 + rng.jitter(0.05));
                    let values = years
                        .iter()
                        .map(|&year| {
                            let t = (year - 2020) as f64;
                            let v = start * (1.0 - decline).powf(t) * (1.0 + rng.jitter(0.02));
                            (v * 100.0).round() / 100.0
                        })
                        .collect();
                    records.push(Record {
                        category,
                        model,
                        scenario,
                        region,
                        variable,
                        unit,
                        values,
                    });
                }
            }
        }
    }
    records
}

/// Write `records` with the leading text columns picked by `ids`
/// followed by every year column.
fn write_table(
    path: &Path,
    ids: &[&str],
    records: &[Record],
    keep: impl Fn(&Record) -> bool,
) -> Result<usize> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let year_names: Vec<String> = years().iter().map(|y| y.to_string()).collect();
    let header: Vec<&str> = ids
        .iter()
        .copied()
        .chain(year_names.iter().map(String::as_str))
        .collect();
    writer.write_record(&header)?;

    let mut written = 0;
    for rec in records.iter().filter(|&r| keep(r)) {
        let mut row: Vec<String> = ids
            .iter()
            .map(|id| match *id {
                "Category" => rec.category,
                "Model" => rec.model,
                "Scenario" => rec.scenario,
                "Region" => rec.region,
                "Variable" => rec.variable,
                "Unit" => rec.unit,
                _ => "",
            })
            .map(str::to_string)
            .collect();
        row.extend(rec.values.iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir).context("creating output directory")?;

    let mut rng = SimpleRng::new(42);
    let records = build_records(&mut rng);

    let tables: [(&str, &[&str], fn(&Record) -> bool); 4] = [
        (
            "C1-3_summary_2050_variable.csv",
            &["Category", "Model", "Scenario", "Region", "Variable", "Unit"],
            |_| true,
        ),
        (
            "AllData.csv",
            &["Model", "Scenario", "Region", "Variable", "Unit"],
            |r| r.variable.starts_with("Emissions"),
        ),
        (
            "AllData3.csv",
            &["Model", "Scenario", "Region", "Variable", "Unit"],
            |r| r.variable.contains("Energy"),
        ),
        (
            "AllData4.csv",
            &["Model", "Scenario", "Variable", "Unit"],
            |r| r.region == "World",
        ),
    ];

    for (name, ids, keep) in tables {
        let path = out_dir.join(name);
        let n = write_table(&path, ids, &records, keep)?;
        println!("Wrote {n} rows to {}", path.display());
    }
    Ok(())
}
