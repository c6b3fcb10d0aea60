//! Strategies over a set of engines.
//!
//! An [`Oscillator`] owns one or more [`Engine`]s and one [`Strategy`] that
//! decides where the engines are evaluated and how a query point is turned
//! into a probability:
//!
//! - [`Strategy::Binned`]: engines evaluate at bin centres, queries snap to
//!   the centre of their bin;
//! - [`Strategy::Unbinned`]: grids come from the caller, queries must hit a
//!   grid point exactly;
//! - [`Strategy::SubSampling`]: engines evaluate at fine bin centres, queries
//!   read the average of the fine samples in their coarse bin.
//!
//! Every engine receives the same parameter vector.

use crate::config::CalculationType;
use crate::engine::{Engine, WeightHandle};
use crate::flavour::ProbabilityRecord;
use crate::grid::BinEdges;
use crate::{Error, Result};

mod binned;
mod sub_sampling;

pub use binned::Binned;
pub use sub_sampling::SubSampling;

/// Evaluation topology and its state.
#[derive(Debug, Clone)]
pub enum Strategy {
    Binned(Binned),
    Unbinned,
    SubSampling(SubSampling),
}

impl Strategy {
    pub fn calculation_type(&self) -> CalculationType {
        match self {
            Strategy::Binned(_) => CalculationType::Binned,
            Strategy::Unbinned => CalculationType::Unbinned,
            Strategy::SubSampling(_) => CalculationType::SubSampling,
        }
    }

    fn has_cosine_z_binning(&self) -> Option<bool> {
        match self {
            Strategy::Binned(b) => Some(b.cosine_z_edges().is_some()),
            Strategy::Unbinned => None,
            Strategy::SubSampling(s) => Some(s.coarse_cosine_z_edges().is_some()),
        }
    }
}

/// Result of [`Oscillator::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbabilityHandle {
    /// A slot in an engine's weight array.
    Engine(WeightHandle),
    /// An averaged coarse bin owned by the sub-sampling strategy.
    Coarse { engine: usize, index: usize },
}

/// Engines plus the strategy that evaluates them.
#[derive(Debug)]
pub struct Oscillator {
    name: String,
    engines: Vec<Engine>,
    strategy: Strategy,
    cosine_z_ignored: bool,
    set_up: bool,
}

impl Oscillator {
    /// Bind `engines` to `strategy`.
    ///
    /// Checks that every engine agrees with `cosine_z_ignored` and pushes the
    /// strategy's fixed grids into the engines.
    pub fn new(strategy: Strategy, mut engines: Vec<Engine>, cosine_z_ignored: bool) -> Result<Self> {
        let kind = strategy.calculation_type().name();
        if engines.is_empty() {
            return Err(Error::configuration(kind, "at least one engine is required"));
        }
        if let Some(binned_cz) = strategy.has_cosine_z_binning() {
            if binned_cz == cosine_z_ignored {
                return Err(Error::configuration(
                    kind,
                    format!(
                        "cosine_z_ignored = {cosine_z_ignored} but the binning {} a cosine-z axis",
                        if binned_cz { "has" } else { "lacks" }
                    ),
                ));
            }
        }

        for (slot, engine) in engines.iter_mut().enumerate() {
            engine.set_slot(slot);
            if engine.is_cosine_z_ignored() != cosine_z_ignored {
                return Err(Error::configuration(
                    kind,
                    format!(
                        "engine '{}' ({}) has cosine_z_ignored = {}, the oscillator has {}",
                        engine.name(),
                        engine.implementation_name(),
                        engine.is_cosine_z_ignored(),
                        cosine_z_ignored
                    ),
                ));
            }

            match &strategy {
                Strategy::Binned(binned) => {
                    engine.set_energy_grid(binned.energy_centers().to_vec())?;
                    if let Some(centers) = binned.cosine_z_centers() {
                        engine.set_cosine_z_grid(centers.to_vec())?;
                    }
                }
                Strategy::SubSampling(sub) => {
                    engine.set_energy_grid(sub.fine_energy_edges().centers())?;
                    if let Some(edges) = sub.fine_cosine_z_edges() {
                        engine.set_cosine_z_grid(edges.centers())?;
                    }
                }
                Strategy::Unbinned => {}
            }
        }

        let implementations: Vec<&str> = engines.iter().map(Engine::implementation_name).collect();
        let name = format!("{kind}_{}", implementations.join("_"));
        tracing::info!(oscillator = %name, n_engines = engines.len(), cosine_z_ignored, "oscillator created");
        Ok(Self { name, engines, strategy, cosine_z_ignored, set_up: false })
    }

    /// `"<Strategy>_<implementation>"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calculation_type(&self) -> CalculationType {
        self.strategy.calculation_type()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn is_cosine_z_ignored(&self) -> bool {
        self.cosine_z_ignored
    }

    /// True when the strategy fixes the engine grids itself.
    pub fn evaluation_points_fixed(&self) -> bool {
        !matches!(self.strategy, Strategy::Unbinned)
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    pub fn engines(&self) -> &[Engine] {
        &self.engines
    }

    pub fn n_engines(&self) -> usize {
        self.engines.len()
    }

    pub fn engine(&self, index: usize) -> Result<&Engine> {
        self.engines.get(index).ok_or_else(|| {
            Error::lookup(&self.name, format!("engine index {index} out of range ({} engines)", self.engines.len()))
        })
    }

    fn engine_mut(&mut self, index: usize) -> Result<&mut Engine> {
        let n = self.engines.len();
        self.engines
            .get_mut(index)
            .ok_or_else(|| Error::lookup(&self.name, format!("engine index {index} out of range ({n} engines)")))
    }

    /// Output energy binning (Binned edges or SubSampling coarse edges).
    pub fn energy_edges(&self) -> Option<&BinEdges> {
        match &self.strategy {
            Strategy::Binned(b) => Some(b.energy_edges()),
            Strategy::SubSampling(s) => Some(s.coarse_energy_edges()),
            Strategy::Unbinned => None,
        }
    }

    /// Output cosine-z binning, if any.
    pub fn cosine_z_edges(&self) -> Option<&BinEdges> {
        match &self.strategy {
            Strategy::Binned(b) => b.cosine_z_edges(),
            Strategy::SubSampling(s) => s.coarse_cosine_z_edges(),
            Strategy::Unbinned => None,
        }
    }

    /// Set one engine's energy grid. Only for strategies without fixed grids;
    /// assigning a grid twice is an error.
    pub fn set_energy_grid(&mut self, engine: usize, grid: Vec<f64>) -> Result<()> {
        if self.evaluation_points_fixed() {
            return Err(Error::configuration(&self.name, "the strategy fixes the energy grid"));
        }
        let target = self.engine_mut(engine)?;
        if target.has_energy_grid() {
            return Err(Error::configuration(
                target.name(),
                "energy grid has already been set",
            ));
        }
        target.set_energy_grid(grid)
    }

    /// Set one engine's cosine-z grid; see [`Oscillator::set_energy_grid`].
    pub fn set_cosine_z_grid(&mut self, engine: usize, grid: Vec<f64>) -> Result<()> {
        if self.evaluation_points_fixed() {
            return Err(Error::configuration(&self.name, "the strategy fixes the cosine-z grid"));
        }
        if self.cosine_z_ignored {
            return Err(Error::configuration(&self.name, "cosine-z is ignored by this oscillator"));
        }
        let target = self.engine_mut(engine)?;
        if target.has_cosine_z_grid() {
            return Err(Error::configuration(
                target.name(),
                "cosine-z grid has already been set",
            ));
        }
        target.set_cosine_z_grid(grid)
    }

    /// Set up every engine, then the strategy.
    pub fn setup(&mut self) -> Result<()> {
        if self.set_up {
            return Err(Error::configuration(&self.name, "setup called twice"));
        }
        for engine in &mut self.engines {
            engine.setup()?;
        }
        if let Strategy::SubSampling(sub) = &mut self.strategy {
            sub.build(&self.engines)?;
        }
        self.set_up = true;
        tracing::info!(oscillator = %self.name, "oscillator set up");
        Ok(())
    }

    /// Reweight every engine with `params`.
    ///
    /// Returns whether any engine recomputed. Sub-sampling averages are
    /// refreshed after any recomputation and left unusable when an engine
    /// fails part way through.
    pub fn calculate_probabilities(&mut self, params: &[f64]) -> Result<bool> {
        if !self.set_up {
            return Err(Error::configuration(&self.name, "calculate_probabilities called before setup"));
        }
        let mut recomputed = false;
        for engine in &mut self.engines {
            match engine.reweight(params) {
                Ok(changed) => recomputed |= changed,
                Err(err) => {
                    if let Strategy::SubSampling(sub) = &mut self.strategy {
                        sub.invalidate();
                    }
                    return Err(err);
                }
            }
        }
        if let Strategy::SubSampling(sub) = &mut self.strategy {
            if recomputed || !sub.is_filled() {
                if let Err(err) = sub.average(&self.engines) {
                    sub.invalidate();
                    return Err(err);
                }
            }
        }
        if recomputed {
            tracing::debug!(oscillator = %self.name, "probabilities recalculated");
        }
        Ok(recomputed)
    }

    /// Resolve a query into a handle.
    ///
    /// `cosine_z` is ignored when the oscillator ignores cosine-z.
    pub fn query(
        &self,
        engine: usize,
        generated: i32,
        detected: i32,
        energy: f64,
        cosine_z: Option<f64>,
    ) -> Result<ProbabilityHandle> {
        if !self.set_up {
            return Err(Error::configuration(&self.name, "query called before setup"));
        }
        let target = self.engine(engine)?;
        let cosine_z = if self.cosine_z_ignored { None } else { cosine_z };
        match &self.strategy {
            Strategy::Binned(binned) => {
                let (e, cz) = binned.resolve(&self.name, energy, cosine_z)?;
                Ok(ProbabilityHandle::Engine(target.query(generated, detected, e, cz)?))
            }
            Strategy::Unbinned => {
                Ok(ProbabilityHandle::Engine(target.query(generated, detected, energy, cosine_z)?))
            }
            Strategy::SubSampling(sub) => {
                let index = sub.locate(target, generated, detected, energy, cosine_z)?;
                Ok(ProbabilityHandle::Coarse { engine, index })
            }
        }
    }

    /// Current value behind `handle`.
    pub fn probability(&self, handle: ProbabilityHandle) -> Result<f64> {
        match handle {
            ProbabilityHandle::Engine(h) => self.engine(h.engine())?.weight(h),
            ProbabilityHandle::Coarse { engine, index } => match &self.strategy {
                Strategy::SubSampling(sub) => sub.value(engine, index),
                _ => Err(Error::lookup(&self.name, "coarse handle used with a non-sub-sampling strategy")),
            },
        }
    }

    /// [`Oscillator::query`] followed by [`Oscillator::probability`].
    pub fn probability_at(
        &self,
        engine: usize,
        generated: i32,
        detected: i32,
        energy: f64,
        cosine_z: Option<f64>,
    ) -> Result<f64> {
        self.probability(self.query(engine, generated, detected, energy, cosine_z)?)
    }

    /// Every output probability of one engine: engine slots, or coarse bins
    /// for the sub-sampling strategy.
    pub fn enumerate_all(&self, engine: usize) -> Result<Vec<ProbabilityRecord>> {
        let target = self.engine(engine)?;
        match &self.strategy {
            Strategy::SubSampling(sub) if self.set_up => sub.records(engine, target),
            _ => target.enumerate_all(),
        }
    }

    pub fn has_channel(&self, engine: usize, generated: i32, detected: i32) -> Result<bool> {
        Ok(self.engine(engine)?.has_channel(generated, detected))
    }
}
