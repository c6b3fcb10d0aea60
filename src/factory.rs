//! Configuration → oscillator.

use std::path::Path;

use crate::config::{BinningFile, CalculationType, OscillatorConfig};
use crate::engine::{Engine, EngineRegistry};
use crate::oscillator::{Binned, Oscillator, Strategy, SubSampling};
use crate::{Error, Result};

/// Builds oscillators from configuration using an engine registry.
pub struct OscillatorFactory<'r> {
    registry: &'r EngineRegistry,
}

impl<'r> OscillatorFactory<'r> {
    pub fn new(registry: &'r EngineRegistry) -> Self {
        Self { registry }
    }

    /// Load a YAML configuration and build its oscillator. Binning files are
    /// resolved relative to the configuration file.
    pub fn create_from_file(&self, path: &Path) -> Result<Oscillator> {
        tracing::info!(path = %path.display(), "loading oscillator configuration");
        let config = OscillatorConfig::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.create(&config, base_dir)
    }

    /// Build engines and strategy. Nothing is set up yet.
    pub fn create(&self, config: &OscillatorConfig, base_dir: &Path) -> Result<Oscillator> {
        let kind = config.general.calculation_type;
        let cosine_z_ignored = config.general.cosine_z_ignored;

        let engines = config
            .engines
            .iter()
            .map(|engine| self.registry.build(engine))
            .collect::<Result<Vec<Engine>>>()?;

        let strategy = match kind {
            CalculationType::Binned => {
                let section = config.binned.as_ref().ok_or_else(|| {
                    Error::configuration(kind.name(), "missing 'binned' configuration section")
                })?;
                let binning = BinningFile::load(&base_dir.join(&section.file))?;
                let cosine_z = match (&section.cosine_z_axis, cosine_z_ignored) {
                    (_, true) => None,
                    (Some(axis), false) => Some(binning.axis(axis)?),
                    (None, false) => {
                        return Err(Error::configuration(
                            kind.name(),
                            "cosine_z_axis is required unless cosine_z_ignored is set",
                        ));
                    }
                };
                Strategy::Binned(Binned::new(binning.axis(&section.energy_axis)?, cosine_z))
            }
            CalculationType::Unbinned => Strategy::Unbinned,
            CalculationType::SubSampling => {
                let section = config.sub_sampling.as_ref().ok_or_else(|| {
                    Error::configuration(kind.name(), "missing 'sub_sampling' configuration section")
                })?;
                let binning = BinningFile::load(&base_dir.join(&section.file))?;
                let (coarse_cz, fine_cz) = if cosine_z_ignored {
                    (None, None)
                } else {
                    match (&section.coarse_cosine_z_axis, &section.fine_cosine_z_axis) {
                        (Some(coarse), Some(fine)) => (Some(binning.axis(coarse)?), Some(binning.axis(fine)?)),
                        _ => {
                            return Err(Error::configuration(
                                kind.name(),
                                "coarse_cosine_z_axis and fine_cosine_z_axis are required unless \
                                 cosine_z_ignored is set",
                            ));
                        }
                    }
                };
                Strategy::SubSampling(SubSampling::new(
                    binning.axis(&section.coarse_energy_axis)?,
                    binning.axis(&section.fine_energy_axis)?,
                    coarse_cz,
                    fine_cz,
                )?)
            }
        };

        Oscillator::new(strategy, engines, cosine_z_ignored)
    }
}
