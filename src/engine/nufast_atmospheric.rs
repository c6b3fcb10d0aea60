//! Atmospheric engine: NuFast along a zenith-dependent chord through a
//! constant-density Earth.

use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::engine::nufast_linear::{
    element, medium_from, mixing_from, require_active_channels, NuFastOptions, NU_TYPES,
};
use crate::engine::{GridView, OscProbBackend, WeightCoords};
use crate::flavour::{ChannelMap, NuType};
use crate::nufast::{MixingParameters, PmnsSquares, ProbabilityMatrix};
use crate::{Error, Result};

/// Registry key.
pub const IMPLEMENTATION: &str = "NuFASTAtmospheric";

/// Earth radius in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Parameter vector layout. The mixing entries share the long-baseline order.
pub mod param {
    pub use crate::engine::nufast_linear::param::{DCP, DM12, DM23, TH12, TH13, TH23};
    /// Production height in km
    pub const PRODH: usize = 6;
    /// Density in g/cm³
    pub const DENS: usize = 7;
    /// Electron fraction
    pub const ELECDENS: usize = 8;
    pub const COUNT: usize = 9;
}

/// Reference parameters: NuFit 5.2 normal ordering, 15 km production height.
pub fn reference_parameters() -> [f64; param::COUNT] {
    let mut p = crate::engine::nufast_linear::reference_parameters();
    p[param::PRODH] = 15.0;
    p[param::DENS] = 4.5;
    p[param::ELECDENS] = 0.5;
    p
}

/// Path length from a production point at height `h` above the surface to a
/// detector on the surface, for zenith cosine `cosine_z` (−1 is upgoing).
pub fn chord_length(cosine_z: f64, production_height: f64) -> f64 {
    let r = EARTH_RADIUS_KM;
    let rh = r + production_height;
    (rh * rh - r * r * (1.0 - cosine_z * cosine_z)).sqrt() - r * cosine_z
}

/// NuFast with atmospheric addressing `nu·C·E·Z + c·E·Z + e·Z + z`.
#[derive(Debug, Clone)]
pub struct NuFastAtmospheric {
    name: String,
    options: NuFastOptions,
}

impl NuFastAtmospheric {
    pub fn new(options: NuFastOptions) -> Self {
        Self { name: format!("{IMPLEMENTATION}-CPU"), options }
    }

    /// Registry builder.
    pub fn build(config: &EngineConfig, channels: &ChannelMap) -> Result<Box<dyn OscProbBackend>> {
        require_active_channels(config, channels)?;
        Ok(Box::new(Self::new(config.backend_options()?)))
    }
}

impl OscProbBackend for NuFastAtmospheric {
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
        false
    }

    fn setup(&mut self, grid: &GridView<'_>) -> Result<()> {
        if grid.cosine_z.is_none() {
            return Err(Error::configuration(&self.name, "a cosine-z grid is required"));
        }
        Ok(())
    }

    fn calculate(&mut self, params: &[f64], grid: &GridView<'_>, weights: &mut [f64]) -> Result<()> {
        let cosine_z = grid
            .cosine_z
            .ok_or_else(|| Error::configuration(&self.name, "a cosine-z grid is required"))?;
        let mixing: MixingParameters = mixing_from(&self.name, params)?;
        let pmns = PmnsSquares::new(&mixing);
        let medium = medium_from(
            &self.name,
            params[param::DENS],
            params[param::ELECDENS],
            self.options.n_newton,
        )?;
        let height = params[param::PRODH];
        if !(height >= 0.0) {
            return Err(Error::range(&self.name, format!("production height = {height} is negative")));
        }
        let baselines: Vec<f64> = cosine_z.iter().map(|&cz| chord_length(cz, height)).collect();

        let (n_energy, n_cz) = (grid.energies.len(), cosine_z.len());
        let per_nu = n_energy * n_cz;
        let matrices: Vec<ProbabilityMatrix> = (0..grid.nu_types.len() * per_nu)
            .into_par_iter()
            .map(|k| {
                let sign = f64::from(grid.nu_types[k / per_nu].sign());
                let (e, z) = ((k % per_nu) / n_cz, k % n_cz);
                pmns.matter(baselines[z], sign * grid.energies[e], &medium)
            })
            .collect();

        for (k, matrix) in matrices.iter().enumerate() {
            let (nu_type, energy, z) = (k / per_nu, (k % per_nu) / n_cz, k % n_cz);
            for (channel, c) in grid.channels.iter().enumerate() {
                let coords = WeightCoords { nu_type, channel, energy, cosine_z: Some(z) };
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

    fn engine() -> Engine {
        let config = EngineConfig::new("atm", IMPLEMENTATION, &["Muon:Muon", "Electron:Electron"]);
        let map = ChannelMap::from_descriptors(&config.channels).unwrap();
        Engine::new("atm", NuFastAtmospheric::build(&config, &map).unwrap(), map, 1e-6).unwrap()
    }

    #[test]
    fn test_chord_length_limits() {
        assert_relative_eq!(chord_length(1.0, 15.0), 15.0, epsilon = 1e-9);
        assert_relative_eq!(chord_length(-1.0, 15.0), 2.0 * EARTH_RADIUS_KM + 15.0, epsilon = 1e-9);
        assert!(chord_length(0.0, 15.0) > 15.0);
    }

    #[test]
    fn test_requires_cosine_z() {
        let mut e = engine();
        assert!(!e.is_cosine_z_ignored());
        e.set_energy_grid(vec![1.0]).unwrap();
        e.ignore_cosine_z_dimension().unwrap();
        assert!(matches!(e.setup(), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_weights_follow_atmospheric_layout() {
        let mut e = engine();
        e.set_energy_grid(vec![1.0, 5.0, 20.0]).unwrap();
        e.set_cosine_z_grid(vec![-1.0, -0.5, 0.2, 1.0]).unwrap();
        e.setup().unwrap();
        assert_eq!(e.weights().len(), 2 * 2 * 3 * 4);
        let params = reference_parameters();
        e.reweight(&params).unwrap();

        let pmns = PmnsSquares::new(&mixing_from("t", &params).unwrap());
        let medium = medium_from("t", 4.5, 0.5, 3).unwrap();
        let expected = pmns.matter(chord_length(-0.5, 15.0), 5.0, &medium)[1][1];
        // nu=0, c=0, e=1, z=1
        assert_relative_eq!(e.weights()[4 + 1], expected, epsilon = 1e-12);
        assert_relative_eq!(e.probability(2, 2, 5.0, Some(-0.5)).unwrap(), expected, epsilon = 1e-12);

        let records = e.enumerate_all().unwrap();
        assert_eq!(records.len(), 48);
        assert!(records.iter().all(|r| r.cosine_z.is_some()));
    }
}
