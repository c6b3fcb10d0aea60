//! nuoscillator CLI - evaluate a configured oscillator and print every probability
//!
//! Run with: `cargo run --release -- --config configs/unbinned.yaml`

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use nuoscillator::engine::{nufast_atmospheric, nufast_linear};
use nuoscillator::grid::{linspace, logspace};
use nuoscillator::{EngineRegistry, Oscillator, OscillatorConfig, OscillatorFactory, ProbabilityRecord};

#[derive(Parser)]
#[command(name = "nuoscillator")]
#[command(about = "nuoscillator - oscillation probabilities from a YAML configuration")]
#[command(version)]
struct Cli {
    /// Oscillator configuration (YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Energy points (GeV, log-spaced over [0.1, 100]) when the strategy does not fix the grid
    #[arg(long, default_value = "20")]
    energy_points: usize,

    /// Cosine-z points (lin-spaced over [-1, 1]) when the strategy does not fix the grid
    #[arg(long, default_value = "10")]
    cosine_z_points: usize,

    /// Comma-separated parameter vector. Defaults to the engine's reference values.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    params: Option<Vec<f64>>,

    /// Print JSON lines instead of a table
    #[arg(long)]
    json: bool,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    let config = OscillatorConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let params = match cli.params.clone() {
        Some(p) => p,
        None => reference_parameters(&config)?,
    };

    let registry = EngineRegistry::with_builtin();
    let base_dir = cli.config.parent().unwrap_or_else(|| Path::new("."));
    let mut oscillator = OscillatorFactory::new(&registry).create(&config, base_dir)?;

    if !oscillator.evaluation_points_fixed() {
        let energies = logspace(0.1, 100.0, cli.energy_points);
        let cosine_z = linspace(-1.0, 1.0, cli.cosine_z_points);
        for engine in 0..oscillator.n_engines() {
            oscillator.set_energy_grid(engine, energies.clone())?;
            if !oscillator.is_cosine_z_ignored() {
                oscillator.set_cosine_z_grid(engine, cosine_z.clone())?;
            }
        }
    }

    oscillator.setup()?;
    oscillator.calculate_probabilities(&params)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if !cli.json {
        writeln!(out, "{}", oscillator.name())?;
        writeln!(out, "{}", "=".repeat(oscillator.name().len()))?;
    }
    for index in 0..oscillator.n_engines() {
        print_engine(&mut out, &oscillator, index, cli.json)?;
    }
    Ok(())
}

fn reference_parameters(config: &OscillatorConfig) -> Result<Vec<f64>> {
    let Some(first) = config.engines.first() else {
        bail!("configuration lists no engines");
    };
    match first.implementation.as_str() {
        nufast_linear::IMPLEMENTATION => Ok(nufast_linear::reference_parameters().to_vec()),
        nufast_atmospheric::IMPLEMENTATION => Ok(nufast_atmospheric::reference_parameters().to_vec()),
        other => bail!("no reference parameters for '{other}'; pass --params"),
    }
}

fn print_engine(out: &mut impl Write, oscillator: &Oscillator, index: usize, json: bool) -> Result<()> {
    let engine = oscillator.engine(index)?;
    let records = oscillator.enumerate_all(index)?;

    if json {
        for record in &records {
            writeln!(out, "{}", serde_json::to_string(&JsonRecord::new(engine.name(), record))?)?;
        }
        return Ok(());
    }

    writeln!(out, "\n{} ({})", engine.name(), engine.implementation_name())?;
    writeln!(out, "  nu  channel          energy    cos_z   probability")?;
    for r in &records {
        let cz = r.cosine_z.map_or_else(|| "-".to_string(), |c| format!("{c:>7.3}"));
        writeln!(
            out,
            "  {:>2}  {:<15} {:>8.4}  {:>7}  {:>11.6}",
            r.nu_type,
            r.channel.to_string(),
            r.energy,
            cz,
            r.probability
        )?;
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct JsonRecord<'a> {
    engine: &'a str,
    nu_type: i32,
    generated: i32,
    detected: i32,
    energy: f64,
    cosine_z: Option<f64>,
    probability: f64,
}

impl<'a> JsonRecord<'a> {
    fn new(engine: &'a str, r: &ProbabilityRecord) -> Self {
        Self {
            engine,
            nu_type: r.nu_type.sign(),
            generated: r.channel.generated.code(),
            detected: r.channel.detected.code(),
            energy: r.energy,
            cosine_z: r.cosine_z,
            probability: r.probability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuoscillator::{NeutrinoFlavour, NuType, OscillationChannel};

    #[test]
    fn test_json_record_uses_flavour_codes() {
        let record = ProbabilityRecord {
            nu_type: NuType::Antineutrino,
            channel: OscillationChannel::new(NeutrinoFlavour::Muon, NeutrinoFlavour::Electron),
            energy: 2.5,
            cosine_z: None,
            probability: 0.25,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&JsonRecord::new("beam", &record)).unwrap()).unwrap();
        assert_eq!(json["nu_type"], -1);
        assert_eq!(json["generated"], 2);
        assert_eq!(json["detected"], 1);
        assert!(json["cosine_z"].is_null());
    }
}
