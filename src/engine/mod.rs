//! The engine contract.
//!
//! An [`Engine`] owns everything that is independent of the oscillation
//! model: the evaluation grids, the channel map, the flattened weight array,
//! the parameter cache and the sanitization step. The model itself lives
//! behind the small [`OscProbBackend`] trait, which only has to declare its
//! shape (parameters, neutrino types, cosine-z policy, addressing) and fill
//! the weight array on request.
//!
//! Lifecycle: set grids → [`Engine::setup`] → any number of
//! [`Engine::reweight`] calls. Handles returned by [`Engine::query`] stay
//! valid for the lifetime of the engine and always read the latest weights.

use core::fmt;

use crate::flavour::{ChannelMap, NuType, OscillationChannel, ProbabilityRecord};
use crate::grid::{exact_index, validate_cosine_z_grid, validate_energy_grid};
use crate::{Error, Result};

mod cache;
pub mod nufast_atmospheric;
pub mod nufast_linear;
pub mod registry;
mod sanitize;

pub use cache::ParameterCache;
pub use registry::{BackendBuilder, EngineRegistry};
pub use sanitize::{sanitize_weights, DEFAULT_TOLERANCE};

/// Value of every weight between setup and the first recomputation.
pub const UNFILLED: f64 = -999.0;

/// Dimensions of an engine's weight array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub n_nu_types: usize,
    pub n_channels: usize,
    pub n_energy: usize,
    /// `None` when the engine ignores cosine-z.
    pub n_cosine_z: Option<usize>,
}

impl GridLayout {
    pub fn n_slots(&self) -> usize {
        self.n_nu_types * self.n_channels * self.n_energy * self.n_cosine_z.unwrap_or(1)
    }

    /// `nu·C·E + c·E + e` without cosine-z, `nu·C·E·Z + c·E·Z + e·Z + z` with it.
    pub fn default_index(&self, coords: WeightCoords) -> usize {
        let WeightCoords { nu_type, channel, energy, cosine_z } = coords;
        match (self.n_cosine_z, cosine_z) {
            (Some(n_cz), Some(cz)) => {
                let per_channel = self.n_energy * n_cz;
                nu_type * self.n_channels * per_channel + channel * per_channel + energy * n_cz + cz
            }
            _ => nu_type * self.n_channels * self.n_energy + channel * self.n_energy + energy,
        }
    }
}

/// Indices of one slot along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightCoords {
    pub nu_type: usize,
    pub channel: usize,
    pub energy: usize,
    pub cosine_z: Option<usize>,
}

/// Read-only view of an engine's grids handed to its backend.
#[derive(Debug, Clone, Copy)]
pub struct GridView<'a> {
    pub energies: &'a [f64],
    pub cosine_z: Option<&'a [f64]>,
    pub channels: &'a [OscillationChannel],
    pub nu_types: &'a [NuType],
    pub layout: GridLayout,
}

/// A concrete oscillation-probability model.
///
/// Backends are created by the [`EngineRegistry`] and wrapped in an
/// [`Engine`]; they never see a query or the parameter cache.
pub trait OscProbBackend: Send {
    /// Implementation name used in logs and errors.
    fn implementation_name(&self) -> &str;

    /// Length of the parameter vector accepted by [`OscProbBackend::calculate`].
    fn n_parameters(&self) -> usize;

    /// Neutrino types the backend computes, in weight-array order.
    fn neutrino_types(&self) -> &[NuType];

    /// True for backends with no cosine-z dependence.
    fn ignores_cosine_z(&self) -> bool;

    fn weight_array_size(&self, layout: &GridLayout) -> usize {
        layout.n_slots()
    }

    /// Injective map from slot coordinates to a weight-array offset.
    fn weight_index(&self, layout: &GridLayout, coords: WeightCoords) -> usize {
        layout.default_index(coords)
    }

    /// One-off initialization once the grids are final.
    fn setup(&mut self, grid: &GridView<'_>) -> Result<()> {
        let _ = grid;
        Ok(())
    }

    /// Fill every slot of `weights` for `params`.
    fn calculate(&mut self, params: &[f64], grid: &GridView<'_>, weights: &mut [f64])
    -> Result<()>;
}

/// Address of one weight slot: engine slot plus flattened offset.
///
/// Resolve it with [`Engine::weight`]; the value read is always the one from
/// the latest recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightHandle {
    engine: usize,
    offset: usize,
}

impl WeightHandle {
    pub fn engine(&self) -> usize {
        self.engine
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CosineZGrid {
    Unset,
    Ignored,
    Set(Vec<f64>),
}

impl CosineZGrid {
    fn as_slice(&self) -> Option<&[f64]> {
        match self {
            CosineZGrid::Set(grid) => Some(grid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Readiness {
    energy_grid: bool,
    cosine_z_grid: bool,
    weights_allocated: bool,
    channel_map: bool,
    backend: bool,
}

impl Readiness {
    fn is_ready(&self) -> bool {
        self.energy_grid
            && self.cosine_z_grid
            && self.weights_allocated
            && self.channel_map
            && self.backend
    }
}

/// One backend instance plus its grids, weights and parameter cache.
pub struct Engine {
    slot: usize,
    name: String,
    backend: Box<dyn OscProbBackend>,
    channels: ChannelMap,
    nu_types: Vec<NuType>,
    tolerance: f64,
    energies: Vec<f64>,
    cosine_z: CosineZGrid,
    weights: Vec<f64>,
    cache: ParameterCache,
    layout: Option<GridLayout>,
    ready: Readiness,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("slot", &self.slot)
            .field("name", &self.name)
            .field("implementation", &self.backend.implementation_name())
            .field("channels", &self.channels)
            .field("n_energy", &self.energies.len())
            .field("cosine_z", &self.cosine_z.as_slice().map(<[f64]>::len))
            .field("n_weights", &self.weights.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Wrap `backend`. Backends that ignore cosine-z start with the cosine-z
    /// grid already marked as ignored.
    pub fn new(
        name: impl Into<String>,
        backend: Box<dyn OscProbBackend>,
        channels: ChannelMap,
        tolerance: f64,
    ) -> Result<Self> {
        let name = name.into();
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(Error::configuration(
                &name,
                format!("tolerance must be finite and non-negative, got {tolerance}"),
            ));
        }
        let cosine_z =
            if backend.ignores_cosine_z() { CosineZGrid::Ignored } else { CosineZGrid::Unset };
        let nu_types = backend.neutrino_types().to_vec();
        tracing::debug!(
            engine = %name,
            implementation = backend.implementation_name(),
            n_channels = channels.len(),
            "engine created"
        );
        Ok(Self {
            slot: 0,
            name,
            backend,
            channels,
            nu_types,
            tolerance,
            energies: Vec::new(),
            cosine_z,
            weights: Vec::new(),
            cache: ParameterCache::new(),
            layout: None,
            ready: Readiness::default(),
        })
    }

    pub(crate) fn set_slot(&mut self, slot: usize) {
        self.slot = slot;
    }

    /// Set the energy grid. A second call is a no-op.
    pub fn set_energy_grid(&mut self, grid: Vec<f64>) -> Result<()> {
        if self.ready.energy_grid {
            tracing::debug!(engine = %self.name, "energy grid already set; ignoring");
            return Ok(());
        }
        validate_energy_grid(&self.name, &grid)?;
        tracing::debug!(engine = %self.name, n_points = grid.len(), "energy grid set");
        self.energies = grid;
        self.ready.energy_grid = true;
        Ok(())
    }

    /// Set the cosine-z grid. A no-op when already set or ignored.
    pub fn set_cosine_z_grid(&mut self, grid: Vec<f64>) -> Result<()> {
        match self.cosine_z {
            CosineZGrid::Ignored => {
                tracing::debug!(engine = %self.name, "cosine-z grid is ignored by this engine");
                Ok(())
            }
            CosineZGrid::Set(_) => {
                tracing::debug!(engine = %self.name, "cosine-z grid already set; ignoring");
                Ok(())
            }
            CosineZGrid::Unset => {
                validate_cosine_z_grid(&self.name, &grid)?;
                tracing::debug!(engine = %self.name, n_points = grid.len(), "cosine-z grid set");
                self.cosine_z = CosineZGrid::Set(grid);
                Ok(())
            }
        }
    }

    /// Declare the cosine-z dimension unused.
    pub fn ignore_cosine_z_dimension(&mut self) -> Result<()> {
        if let CosineZGrid::Set(_) = self.cosine_z {
            return Err(Error::configuration(
                &self.name,
                "cannot ignore cosine-z after a cosine-z grid has been set",
            ));
        }
        self.cosine_z = CosineZGrid::Ignored;
        Ok(())
    }

    /// Allocate the weight array and initialize the backend.
    pub fn setup(&mut self) -> Result<()> {
        if self.layout.is_some() {
            return Err(Error::configuration(&self.name, "setup called twice"));
        }
        if !self.ready.energy_grid {
            return Err(Error::configuration(&self.name, "energy grid must be set before setup"));
        }
        self.ready.cosine_z_grid = self.cosine_z != CosineZGrid::Unset;
        if !self.ready.cosine_z_grid {
            return Err(Error::configuration(
                &self.name,
                "cosine-z grid must be set or ignored before setup",
            ));
        }
        if !self.backend.ignores_cosine_z() && self.cosine_z == CosineZGrid::Ignored {
            return Err(Error::configuration(
                &self.name,
                format!("{} requires a cosine-z grid", self.backend.implementation_name()),
            ));
        }

        self.ready.channel_map = self.check_mapping()?;

        let layout = GridLayout {
            n_nu_types: self.nu_types.len(),
            n_channels: self.channels.len(),
            n_energy: self.energies.len(),
            n_cosine_z: self.cosine_z.as_slice().map(<[f64]>::len),
        };
        let n_weights = self.backend.weight_array_size(&layout);
        if n_weights == 0 {
            return Err(Error::configuration(&self.name, "backend declared an empty weight array"));
        }
        self.weights = vec![UNFILLED; n_weights];
        self.ready.weights_allocated = true;
        self.cache.invalidate();

        let view = GridView {
            energies: &self.energies,
            cosine_z: self.cosine_z.as_slice(),
            channels: self.channels.as_slice(),
            nu_types: &self.nu_types,
            layout,
        };
        self.backend.setup(&view)?;
        self.ready.backend = true;

        let r = self.ready;
        if !r.is_ready() {
            return Err(Error::configuration(
                &self.name,
                format!(
                    "engine is not ready: energy_grid={} cosine_z_grid={} weights_allocated={} \
                     channel_map={} backend={}",
                    r.energy_grid, r.cosine_z_grid, r.weights_allocated, r.channel_map, r.backend
                ),
            ));
        }
        self.layout = Some(layout);
        tracing::info!(
            engine = %self.name,
            implementation = self.backend.implementation_name(),
            n_weights,
            "engine set up"
        );
        Ok(())
    }

    fn check_mapping(&self) -> Result<bool> {
        if self.nu_types.is_empty() {
            return Err(Error::configuration(&self.name, "backend declared no neutrino types"));
        }
        for (i, t) in self.nu_types.iter().enumerate() {
            if self.nu_types[..i].contains(t) {
                return Err(Error::configuration(
                    &self.name,
                    format!("neutrino type {t} declared twice"),
                ));
            }
        }
        Ok(!self.channels.is_empty())
    }

    /// Recompute the weights for `params` unless they equal the cached vector.
    ///
    /// Returns whether a recomputation happened. On failure the cache is
    /// cleared, so the weights are never trusted for those parameters.
    pub fn reweight(&mut self, params: &[f64]) -> Result<bool> {
        let layout = self
            .layout
            .ok_or_else(|| Error::configuration(&self.name, "reweight called before setup"))?;
        let expected = self.backend.n_parameters();
        if params.len() != expected {
            return Err(Error::configuration(
                &self.name,
                format!("expected {expected} oscillation parameters, got {}", params.len()),
            ));
        }
        if !self.cache.needs_update(params) {
            tracing::trace!(engine = %self.name, "parameters unchanged; skipping recomputation");
            return Ok(false);
        }

        let view = GridView {
            energies: &self.energies,
            cosine_z: self.cosine_z.as_slice(),
            channels: self.channels.as_slice(),
            nu_types: &self.nu_types,
            layout,
        };
        let outcome = self
            .backend
            .calculate(params, &view, &mut self.weights)
            .and_then(|()| sanitize_weights(&self.name, &mut self.weights, self.tolerance));

        match outcome {
            Ok(clamped) => {
                self.cache.store(params);
                if clamped > 0 {
                    tracing::debug!(engine = %self.name, clamped, "clamped weights into [0, 1]");
                }
                Ok(true)
            }
            Err(err) => {
                self.cache.invalidate();
                Err(err)
            }
        }
    }

    /// Resolve a signed flavour pair and exact grid point to a handle.
    ///
    /// `cosine_z` is ignored by engines that ignore the dimension and required
    /// otherwise.
    pub fn query(
        &self,
        generated: i32,
        detected: i32,
        energy: f64,
        cosine_z: Option<f64>,
    ) -> Result<WeightHandle> {
        let layout = self
            .layout
            .ok_or_else(|| Error::configuration(&self.name, "query called before setup"))?;

        let nu_type =
            NuType::from_flavour_pair(generated, detected).map_err(|e| e.with_origin(&self.name))?;
        let nu_index = self.nu_types.iter().position(|&t| t == nu_type).ok_or_else(|| {
            Error::lookup(&self.name, format!("neutrino type {nu_type} is not computed"))
        })?;
        let channel = self.channels.index_of(generated, detected).ok_or_else(|| {
            let known: Vec<String> = self.channels.as_slice().iter().map(|c| c.to_string()).collect();
            Error::lookup(
                &self.name,
                format!(
                    "no oscillation channel for flavours ({generated}, {detected}); known: [{}]",
                    known.join(", ")
                ),
            )
        })?;
        let energy_index = exact_index(&self.energies, energy).ok_or_else(|| {
            Error::lookup(&self.name, format!("energy {energy} is not a grid point"))
        })?;
        let cosine_z_index = match (&self.cosine_z, cosine_z) {
            (CosineZGrid::Set(grid), Some(value)) => Some(exact_index(grid, value).ok_or_else(|| {
                Error::lookup(&self.name, format!("cosine_z {value} is not a grid point"))
            })?),
            (CosineZGrid::Set(_), None) => {
                return Err(Error::lookup(&self.name, "a cosine_z value is required"));
            }
            _ => None,
        };

        let coords =
            WeightCoords { nu_type: nu_index, channel, energy: energy_index, cosine_z: cosine_z_index };
        let offset = self.backend.weight_index(&layout, coords);
        if offset >= self.weights.len() {
            return Err(Error::configuration(
                &self.name,
                format!(
                    "addressing returned offset {offset} for {coords:?}, weight array has {} slots",
                    self.weights.len()
                ),
            ));
        }
        tracing::trace!(engine = %self.name, offset, "resolved weight handle");
        Ok(WeightHandle { engine: self.slot, offset })
    }

    /// Current value behind `handle`.
    pub fn weight(&self, handle: WeightHandle) -> Result<f64> {
        if handle.engine != self.slot {
            return Err(Error::lookup(
                &self.name,
                format!("handle belongs to engine slot {}, not {}", handle.engine, self.slot),
            ));
        }
        self.weights.get(handle.offset).copied().ok_or_else(|| {
            Error::lookup(&self.name, format!("handle offset {} is out of range", handle.offset))
        })
    }

    /// [`Engine::query`] followed by [`Engine::weight`].
    pub fn probability(
        &self,
        generated: i32,
        detected: i32,
        energy: f64,
        cosine_z: Option<f64>,
    ) -> Result<f64> {
        self.weight(self.query(generated, detected, energy, cosine_z)?)
    }

    /// Every slot as a record, ordered by weight-array offset.
    pub fn enumerate_all(&self) -> Result<Vec<ProbabilityRecord>> {
        let layout = self
            .layout
            .ok_or_else(|| Error::configuration(&self.name, "enumerate called before setup"))?;

        let cosine_z_points: Vec<Option<(usize, f64)>> = match &self.cosine_z {
            CosineZGrid::Set(grid) => grid.iter().copied().enumerate().map(Some).collect(),
            _ => vec![None],
        };

        let mut records: Vec<Option<ProbabilityRecord>> = vec![None; self.weights.len()];
        for (nu_index, &nu_type) in self.nu_types.iter().enumerate() {
            for (channel_index, &channel) in self.channels.as_slice().iter().enumerate() {
                for &cz in &cosine_z_points {
                    for (energy_index, &energy) in self.energies.iter().enumerate() {
                        let coords = WeightCoords {
                            nu_type: nu_index,
                            channel: channel_index,
                            energy: energy_index,
                            cosine_z: cz.map(|(i, _)| i),
                        };
                        let offset = self.backend.weight_index(&layout, coords);
                        let slot = records.get_mut(offset).ok_or_else(|| {
                            Error::configuration(
                                &self.name,
                                format!("addressing returned offset {offset} outside the weight array"),
                            )
                        })?;
                        if slot.is_some() {
                            return Err(Error::configuration(
                                &self.name,
                                format!("weight slot {offset} is addressed twice"),
                            ));
                        }
                        let probability = self.weights[offset];
                        if probability == UNFILLED {
                            return Err(Error::numerical(
                                &self.name,
                                format!("weight slot {offset} has not been calculated"),
                            ));
                        }
                        *slot = Some(ProbabilityRecord {
                            nu_type,
                            channel,
                            energy,
                            cosine_z: cz.map(|(_, c)| c),
                            probability,
                        });
                    }
                }
            }
        }

        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                r.ok_or_else(|| {
                    Error::configuration(&self.name, format!("weight slot {i} is never addressed"))
                })
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn implementation_name(&self) -> &str {
        self.backend.implementation_name()
    }

    pub fn expected_parameter_count(&self) -> usize {
        self.backend.n_parameters()
    }

    pub fn is_cosine_z_ignored(&self) -> bool {
        self.cosine_z == CosineZGrid::Ignored
    }

    pub fn has_energy_grid(&self) -> bool {
        self.ready.energy_grid
    }

    /// True once the cosine-z grid is set or ignored.
    pub fn has_cosine_z_grid(&self) -> bool {
        self.cosine_z != CosineZGrid::Unset
    }

    pub fn is_set_up(&self) -> bool {
        self.layout.is_some()
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn cosine_z(&self) -> Option<&[f64]> {
        self.cosine_z.as_slice()
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn neutrino_types(&self) -> &[NuType] {
        &self.nu_types
    }

    pub fn has_channel(&self, generated: i32, detected: i32) -> bool {
        self.channels.index_of(generated, detected).is_some()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Parameters behind the current weights, if any.
    pub fn current_parameters(&self) -> Option<&[f64]> {
        self.cache.previous()
    }

    /// The flattened weight array, in the backend's addressing order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}
