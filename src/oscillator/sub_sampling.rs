//! Fine evaluation grid averaged into coarse output bins.
//!
//! Engines evaluate at the centres of the fine bins. Each coarse bin owns the
//! list of fine slots whose centre falls inside it (a fine centre outside the
//! coarse edges is a range error at setup); after every recomputation
//! the lists are averaged into storage owned by the strategy.

use crate::engine::{Engine, WeightHandle};
use crate::flavour::{NuType, ProbabilityRecord};
use crate::grid::BinEdges;
use crate::{Error, Result};

const ORIGIN: &str = "SubSampling";

/// Coarse lists and averages of one engine.
#[derive(Debug, Clone, Default)]
struct CoarseTable {
    members: Vec<Vec<WeightHandle>>,
    averages: Vec<f64>,
    filled: bool,
}

/// Sub-sampling strategy.
#[derive(Debug, Clone)]
pub struct SubSampling {
    coarse_energy: BinEdges,
    fine_energy: BinEdges,
    coarse_cosine_z: Option<BinEdges>,
    fine_cosine_z: Option<BinEdges>,
    tables: Vec<CoarseTable>,
}

impl SubSampling {
    /// Cosine-z edges must be given for both levels or for neither.
    pub fn new(
        coarse_energy: BinEdges,
        fine_energy: BinEdges,
        coarse_cosine_z: Option<BinEdges>,
        fine_cosine_z: Option<BinEdges>,
    ) -> Result<Self> {
        if coarse_cosine_z.is_some() != fine_cosine_z.is_some() {
            return Err(Error::configuration(
                ORIGIN,
                "coarse and fine cosine-z binnings must be given together",
            ));
        }
        Ok(Self { coarse_energy, fine_energy, coarse_cosine_z, fine_cosine_z, tables: Vec::new() })
    }

    pub fn coarse_energy_edges(&self) -> &BinEdges {
        &self.coarse_energy
    }

    pub fn coarse_cosine_z_edges(&self) -> Option<&BinEdges> {
        self.coarse_cosine_z.as_ref()
    }

    pub fn fine_energy_edges(&self) -> &BinEdges {
        &self.fine_energy
    }

    pub fn fine_cosine_z_edges(&self) -> Option<&BinEdges> {
        self.fine_cosine_z.as_ref()
    }

    fn n_coarse_cosine_z(&self) -> usize {
        self.coarse_cosine_z.as_ref().map_or(1, BinEdges::n_bins)
    }

    /// `nu·C·Zc·Ec + c·Zc·Ec + zc·Ec + ec`
    fn coarse_index(&self, n_channels: usize, nu: usize, channel: usize, zc: usize, ec: usize) -> usize {
        let n_e = self.coarse_energy.n_bins();
        let per_channel = self.n_coarse_cosine_z() * n_e;
        nu * n_channels * per_channel + channel * per_channel + zc * n_e + ec
    }

    /// Build the coarse lists for every engine. Runs once, after engine setup.
    pub(crate) fn build(&mut self, engines: &[Engine]) -> Result<()> {
        let fine_energies = self.fine_energy.centers();
        let fine_cosine_z: Vec<Option<f64>> = match &self.fine_cosine_z {
            Some(edges) => edges.centers().into_iter().map(Some).collect(),
            None => vec![None],
        };

        let mut tables = Vec::with_capacity(engines.len());
        for engine in engines {
            let n_channels = engine.channels().len();
            let n_coarse = engine.neutrino_types().len()
                * n_channels
                * self.n_coarse_cosine_z()
                * self.coarse_energy.n_bins();
            let mut members = vec![Vec::new(); n_coarse];

            for (nu, &nu_type) in engine.neutrino_types().iter().enumerate() {
                for (channel, c) in engine.channels().as_slice().iter().enumerate() {
                    let generated = c.generated.code() * nu_type.sign();
                    let detected = c.detected.code() * nu_type.sign();
                    for &cz in &fine_cosine_z {
                        let zc = match (cz, &self.coarse_cosine_z) {
                            (Some(value), Some(edges)) => edges.locate(ORIGIN, "cosine_z", value)?,
                            _ => 0,
                        };
                        for &energy in &fine_energies {
                            let ec = self.coarse_energy.locate(ORIGIN, "energy", energy)?;
                            let handle = engine.query(generated, detected, energy, cz)?;
                            members[self.coarse_index(n_channels, nu, channel, zc, ec)].push(handle);
                        }
                    }
                }
            }

            if let Some(empty) = members.iter().position(Vec::is_empty) {
                return Err(Error::configuration(
                    ORIGIN,
                    format!(
                        "coarse bin {empty} of engine '{}' contains no fine samples",
                        engine.name()
                    ),
                ));
            }
            tracing::debug!(
                engine = engine.name(),
                n_coarse,
                n_fine = members.iter().map(Vec::len).sum::<usize>(),
                "built coarse bin lists"
            );
            tables.push(CoarseTable { averages: vec![0.0; n_coarse], members, filled: false });
        }
        self.tables = tables;
        Ok(())
    }

    /// Average every coarse list from the current engine weights.
    pub(crate) fn average(&mut self, engines: &[Engine]) -> Result<()> {
        for (table, engine) in self.tables.iter_mut().zip(engines) {
            for (average, members) in table.averages.iter_mut().zip(&table.members) {
                let mut sum = 0.0;
                for &handle in members {
                    sum += engine.weight(handle)?;
                }
                *average = sum / members.len() as f64;
            }
            table.filled = true;
        }
        Ok(())
    }

    pub(crate) fn is_filled(&self) -> bool {
        self.tables.iter().all(|table| table.filled)
    }

    /// Mark every table stale until the next successful average.
    pub(crate) fn invalidate(&mut self) {
        for table in &mut self.tables {
            table.filled = false;
        }
    }

    /// Coarse slot of a query; the same edge scan as the build step.
    pub(crate) fn locate(
        &self,
        engine: &Engine,
        generated: i32,
        detected: i32,
        energy: f64,
        cosine_z: Option<f64>,
    ) -> Result<usize> {
        let nu_type = NuType::from_flavour_pair(generated, detected).map_err(|e| e.with_origin(ORIGIN))?;
        let nu = engine.neutrino_types().iter().position(|&t| t == nu_type).ok_or_else(|| {
            Error::lookup(ORIGIN, format!("neutrino type {nu_type} is not computed"))
        })?;
        let channel = engine.channels().index_of(generated, detected).ok_or_else(|| {
            Error::lookup(ORIGIN, format!("no oscillation channel for flavours ({generated}, {detected})"))
        })?;
        let ec = self.coarse_energy.locate(ORIGIN, "energy", energy)?;
        let zc = match (&self.coarse_cosine_z, cosine_z) {
            (Some(edges), Some(value)) => edges.locate(ORIGIN, "cosine_z", value)?,
            (Some(_), None) => return Err(Error::lookup(ORIGIN, "a cosine_z value is required")),
            (None, _) => 0,
        };
        Ok(self.coarse_index(engine.channels().len(), nu, channel, zc, ec))
    }

    /// Averaged value of one coarse slot.
    pub(crate) fn value(&self, engine: usize, index: usize) -> Result<f64> {
        let table = self
            .tables
            .get(engine)
            .ok_or_else(|| Error::lookup(ORIGIN, format!("no coarse table for engine {engine}")))?;
        if !table.filled {
            return Err(Error::numerical(ORIGIN, "coarse averages have not been calculated"));
        }
        table
            .averages
            .get(index)
            .copied()
            .ok_or_else(|| Error::lookup(ORIGIN, format!("coarse index {index} is out of range")))
    }

    /// Every coarse average of one engine as records at coarse bin centres.
    pub(crate) fn records(&self, slot: usize, engine: &Engine) -> Result<Vec<ProbabilityRecord>> {
        let energies = self.coarse_energy.centers();
        let cosine_z: Vec<Option<f64>> = match &self.coarse_cosine_z {
            Some(edges) => edges.centers().into_iter().map(Some).collect(),
            None => vec![None],
        };
        let n_channels = engine.channels().len();
        let mut records = Vec::new();
        for (nu, &nu_type) in engine.neutrino_types().iter().enumerate() {
            for (channel_index, &channel) in engine.channels().as_slice().iter().enumerate() {
                for (zc, &cz) in cosine_z.iter().enumerate() {
                    for (ec, &energy) in energies.iter().enumerate() {
                        let index = self.coarse_index(n_channels, nu, channel_index, zc, ec);
                        records.push(ProbabilityRecord {
                            nu_type,
                            channel,
                            energy,
                            cosine_z: cz,
                            probability: self.value(slot, index)?,
                        });
                    }
                }
            }
        }
        Ok(records)
    }
}
