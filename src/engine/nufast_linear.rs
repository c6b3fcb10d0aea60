//! Long-baseline engine on the NuFast kernel.

use rayon::prelude::*;
use serde::Deserialize;

use crate::config::EngineConfig;
use crate::engine::{GridView, OscProbBackend, WeightCoords};
use crate::flavour::{ChannelMap, NeutrinoFlavour, NuType};
use crate::nufast::{Medium, MixingParameters, PmnsSquares, ProbabilityMatrix};
use crate::{Error, Result};

/// Registry key.
pub const IMPLEMENTATION: &str = "NuFASTLinear";

/// Parameter vector layout.
pub mod param {
    /// sin²θ12
    pub const TH12: usize = 0;
    /// sin²θ23
    pub const TH23: usize = 1;
    /// sin²θ13
    pub const TH13: usize = 2;
    /// Δm²21 in eV²
    pub const DM12: usize = 3;
    /// Δm²32 in eV²
    pub const DM23: usize = 4;
    /// δCP in radians
    pub const DCP: usize = 5;
    /// Baseline in km
    pub const PATHL: usize = 6;
    /// Density in g/cm³
    pub const DENS: usize = 7;
    /// Electron fraction
    pub const ELECDENS: usize = 8;
    pub const COUNT: usize = 9;
}

/// Options shared by the NuFast engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NuFastOptions {
    /// Newton iterations on the DMP eigenvalue.
    pub n_newton: u8,
}

impl Default for NuFastOptions {
    fn default() -> Self {
        Self { n_newton: 3 }
    }
}

pub(crate) const NU_TYPES: [NuType; 2] = [NuType::Neutrino, NuType::Antineutrino];

/// Reference parameters: NuFit 5.2 normal ordering, T2K-like baseline.
pub fn reference_parameters() -> [f64; param::COUNT] {
    let m = MixingParameters::nufit52_no();
    let mut p = [0.0; param::COUNT];
    p[param::TH12] = m.s12sq;
    p[param::TH23] = m.s23sq;
    p[param::TH13] = m.s13sq;
    p[param::DM12] = m.Dmsq21;
    p[param::DM23] = m.Dmsq31 - m.Dmsq21;
    p[param::DCP] = m.delta;
    p[param::PATHL] = 295.0;
    p[param::DENS] = 2.6;
    p[param::ELECDENS] = 0.5;
    p
}

/// Convert the six leading mixing entries (NuFast engine order) into the
/// kernel's parameters. Δm²31 is built as Δm²32 + Δm²21.
pub(crate) fn mixing_from(origin: &str, params: &[f64]) -> Result<MixingParameters> {
    for (i, name) in [(param::TH12, "sin2_th12"), (param::TH23, "sin2_th23"), (param::TH13, "sin2_th13")]
    {
        if !(0.0..=1.0).contains(&params[i]) {
            return Err(Error::range(origin, format!("{name} = {} is outside [0, 1]", params[i])));
        }
    }
    Ok(MixingParameters {
        s12sq: params[param::TH12],
        s13sq: params[param::TH13],
        s23sq: params[param::TH23],
        delta: params[param::DCP],
        Dmsq21: params[param::DM12],
        Dmsq31: params[param::DM23] + params[param::DM12],
    })
}

/// Medium from the trailing density entries, checked for physical values.
pub(crate) fn medium_from(origin: &str, rho: f64, ye: f64, n_newton: u8) -> Result<Medium> {
    if !(rho >= 0.0) {
        return Err(Error::range(origin, format!("density = {rho} is negative")));
    }
    if !(0.0..=1.0).contains(&ye) {
        return Err(Error::range(origin, format!("electron fraction = {ye} is outside [0, 1]")));
    }
    Ok(Medium { rho, Ye: ye, N_Newton: n_newton })
}

/// Reject channels outside the three active flavours.
pub(crate) fn require_active_channels(config: &EngineConfig, channels: &ChannelMap) -> Result<()> {
    match channels.as_slice().iter().find(|c| !c.generated.is_active() || !c.detected.is_active()) {
        Some(channel) => Err(Error::configuration(
            &config.name,
            format!("{} supports three active flavours only, got {channel}", config.implementation),
        )),
        None => Ok(()),
    }
}

#[inline]
pub(crate) fn element(matrix: &ProbabilityMatrix, from: NeutrinoFlavour, to: NeutrinoFlavour) -> f64 {
    matrix[from.code() as usize - 1][to.code() as usize - 1]
}

/// NuFast in a constant-density slab of fixed length.
#[derive(Debug, Clone)]
pub struct NuFastLinear {
    name: String,
    options: NuFastOptions,
}

impl NuFastLinear {
    pub fn new(options: NuFastOptions) -> Self {
        Self { name: format!("{IMPLEMENTATION}-CPU"), options }
    }

    /// Registry builder.
    pub fn build(config: &EngineConfig, channels: &ChannelMap) -> Result<Box<dyn OscProbBackend>> {
        require_active_channels(config, channels)?;
        Ok(Box::new(Self::new(config.backend_options()?)))
    }
}

impl OscProbBackend for NuFastLinear {
    fn implementation_name(&self) -> &str {
        &self.name
    }

    fn n_parameters(&self) -> usize {
        param::COUNT
    }

    fn neutrino_types(&self) -> &[NuType] {
        &NU_TYPES
    }

    fn ignores_cosine_z(&self) -> bool {
        true
    }

    fn calculate(&mut self, params: &[f64], grid: &GridView<'_>, weights: &mut [f64]) -> Result<()> {
        let pmns = PmnsSquares::new(&mixing_from(&self.name, params)?);
        let medium = medium_from(
            &self.name,
            params[param::DENS],
            params[param::ELECDENS],
            self.options.n_newton,
        )?;
        let baseline = params[param::PATHL];
        if !(baseline >= 0.0) {
            return Err(Error::range(&self.name, format!("baseline = {baseline} is negative")));
        }

        let n_energy = grid.energies.len();
        let matrices: Vec<ProbabilityMatrix> = (0..grid.nu_types.len() * n_energy)
            .into_par_iter()
            .map(|k| {
                let sign = f64::from(grid.nu_types[k / n_energy].sign());
                pmns.matter(baseline, sign * grid.energies[k % n_energy], &medium)
            })
            .collect();

        for (k, matrix) in matrices.iter().enumerate() {
            for (channel, c) in grid.channels.iter().enumerate() {
                let coords =
                    WeightCoords { nu_type: k / n_energy, channel, energy: k % n_energy, cosine_z: None };
                weights[self.weight_index(&grid.layout, coords)] =
                    element(matrix, c.generated, c.detected);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use approx::assert_relative_eq;

    fn engine(channels: &[&str]) -> Engine {
        let config = EngineConfig::new("beam", IMPLEMENTATION, channels);
        let map = ChannelMap::from_descriptors(&config.channels).unwrap();
        let backend = NuFastLinear::build(&config, &map).unwrap();
        Engine::new("beam", backend, map, 1e-6).unwrap()
    }

    #[test]
    fn test_default_options() {
        assert_eq!(NuFastOptions::default().n_newton, 3);
    }

    #[test]
    fn test_rejects_sterile_channels() {
        let config = EngineConfig::new("beam", IMPLEMENTATION, &["Muon:Sterile1"]);
        let map = ChannelMap::from_descriptors(&config.channels).unwrap();
        assert!(matches!(NuFastLinear::build(&config, &map), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_rows_sum_to_one() {
        let mut e = engine(&["Muon:Electron", "Muon:Muon", "Muon:Tau"]);
        e.set_energy_grid(vec![0.3, 0.6, 1.0, 3.0]).unwrap();
        e.setup().unwrap();
        e.reweight(&reference_parameters()).unwrap();
        for &energy in e.energies() {
            for sign in [1, -1] {
                let total: f64 =
                    [1, 2, 3].iter().map(|&d| e.probability(2 * sign, d * sign, energy, None).unwrap()).sum();
                assert_relative_eq!(total, 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_matches_kernel() {
        let mut e = engine(&["Muon:Electron"]);
        e.set_energy_grid(vec![0.6]).unwrap();
        e.setup().unwrap();
        let params = reference_parameters();
        e.reweight(&params).unwrap();

        let pmns = PmnsSquares::new(&MixingParameters::nufit52_no());
        let medium = Medium { rho: 2.6, Ye: 0.5, N_Newton: 3 };
        let nu = pmns.matter(295.0, 0.6, &medium);
        let nubar = pmns.matter(295.0, -0.6, &medium);
        assert_relative_eq!(e.probability(2, 1, 0.6, None).unwrap(), nu[1][0], epsilon = 1e-12);
        assert_relative_eq!(e.probability(-2, -1, 0.6, None).unwrap(), nubar[1][0], epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_unphysical_mixing() {
        let mut e = engine(&["Muon:Muon"]);
        e.set_energy_grid(vec![1.0]).unwrap();
        e.setup().unwrap();
        let mut params = reference_parameters();
        params[param::TH23] = 1.5;
        assert!(matches!(e.reweight(&params), Err(Error::Range { .. })));
    }
}
