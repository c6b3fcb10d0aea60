//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nuoscillator::engine::{GridLayout, GridView, OscProbBackend, WeightCoords, DEFAULT_TOLERANCE};
use nuoscillator::{ChannelMap, Engine, EngineRegistry, NuType, Result};

/// Registry key of [`ScriptedBackend`].
pub const SCRIPTED: &str = "Scripted";

/// `(params, nu_type, channel index, energy, cosine_z) -> weight`
pub type ProbFn = Arc<dyn Fn(&[f64], NuType, usize, f64, Option<f64>) -> f64 + Send + Sync>;

/// A backend whose weights come from a closure, counting its calculations.
///
/// With `reversed` set, the weight array is addressed back to front to check
/// that nothing outside the backend assumes the default layout.
pub struct ScriptedBackend {
    pub nu_types: Vec<NuType>,
    pub cosine_z: bool,
    pub reversed: bool,
    pub prob: ProbFn,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(
        cosine_z: bool,
        prob: impl Fn(&[f64], NuType, usize, f64, Option<f64>) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            nu_types: vec![NuType::Neutrino, NuType::Antineutrino],
            cosine_z,
            reversed: false,
            prob: Arc::new(prob),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl OscProbBackend for ScriptedBackend {
    fn implementation_name(&self) -> &str {
        SCRIPTED
    }

    fn n_parameters(&self) -> usize {
        1
    }

    fn neutrino_types(&self) -> &[NuType] {
        &self.nu_types
    }

    fn ignores_cosine_z(&self) -> bool {
        !self.cosine_z
    }

    fn weight_index(&self, layout: &GridLayout, coords: WeightCoords) -> usize {
        let i = layout.default_index(coords);
        if self.reversed {
            layout.n_slots() - 1 - i
        } else {
            i
        }
    }

    fn calculate(&mut self, params: &[f64], grid: &GridView<'_>, weights: &mut [f64]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let cosine_z: Vec<Option<f64>> = match grid.cosine_z {
            Some(cz) => cz.iter().copied().map(Some).collect(),
            None => vec![None],
        };
        for (nu, &nu_type) in grid.nu_types.iter().enumerate() {
            for channel in 0..grid.channels.len() {
                for (energy, &e) in grid.energies.iter().enumerate() {
                    for (z, &cz) in cosine_z.iter().enumerate() {
                        let coords = WeightCoords {
                            nu_type: nu,
                            channel,
                            energy,
                            cosine_z: cz.map(|_| z),
                        };
                        weights[self.weight_index(&grid.layout, coords)] =
                            (self.prob)(params, nu_type, channel, e, cz);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Engine around a [`ScriptedBackend`], not yet set up.
pub fn scripted_engine(backend: ScriptedBackend, channels: &[&str]) -> Engine {
    let map = ChannelMap::from_descriptors(channels).expect("channels");
    Engine::new("scripted", Box::new(backend), map, DEFAULT_TOLERANCE).expect("engine")
}

/// A registry serving [`SCRIPTED`] engines that share `prob` and one counter.
pub fn scripted_registry(
    cosine_z: bool,
    prob: impl Fn(&[f64], NuType, usize, f64, Option<f64>) -> f64 + Send + Sync + 'static,
) -> (EngineRegistry, Arc<AtomicUsize>) {
    let prob: ProbFn = Arc::new(prob);
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = EngineRegistry::with_builtin();
    let (shared_prob, shared_calls) = (prob.clone(), calls.clone());
    registry
        .register(SCRIPTED, move |_config, _channels| {
            Ok(Box::new(ScriptedBackend {
                nu_types: vec![NuType::Neutrino, NuType::Antineutrino],
                cosine_z,
                reversed: false,
                prob: shared_prob.clone(),
                calls: shared_calls.clone(),
            }) as Box<dyn OscProbBackend>)
        })
        .expect("register");
    (registry, calls)
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
