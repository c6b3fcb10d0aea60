//! # nuoscillator
//!
//! Oscillation-probability bookkeeping for neutrino analyses, on top of the
//! NuFast three-flavour kernel.
//!
//! ## Features
//!
//! - **Engine contract**: grids, flattened weight arrays, parameter caching and
//!   sanitization shared by every backend ([`engine::Engine`])
//! - **Pluggable backends**: one small trait ([`engine::OscProbBackend`]) and a
//!   string-keyed [`engine::EngineRegistry`]
//! - **Strategies**: binned, unbinned and sub-sampled evaluation
//!   ([`oscillator::Oscillator`])
//! - **Built-in engines**: `NuFASTLinear` (fixed baseline) and
//!   `NuFASTAtmospheric` (zenith-dependent baseline)
//! - **YAML configuration** via [`factory::OscillatorFactory`]
//!
//! ## Quick Start
//!
//! ```rust
//! use nuoscillator::config::EngineConfig;
//! use nuoscillator::engine::{nufast_linear, EngineRegistry};
//!
//! let registry = EngineRegistry::with_builtin();
//! let config = EngineConfig::new("beam", "NuFASTLinear", &["Muon:Electron", "Muon:Muon"]);
//! let mut engine = registry.build(&config)?;
//! engine.set_energy_grid(vec![0.5, 0.6, 0.7])?;
//! engine.setup()?;
//! engine.reweight(&nufast_linear::reference_parameters())?;
//!
//! let p = engine.probability(2, 1, 0.6, None)?; // P(νμ → νe)
//! assert!((0.0..=1.0).contains(&p));
//! # Ok::<(), nuoscillator::Error>(())
//! ```
//!
//! Flavour codes are signed: `+2, +1` is νμ → νe and `-2, -1` the
//! antineutrino channel.

pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod flavour;
pub mod grid;
pub mod nufast;
pub mod oscillator;

pub use config::{CalculationType, EngineConfig, OscillatorConfig};
pub use engine::{Engine, EngineRegistry, OscProbBackend, WeightHandle};
pub use error::{Error, Result};
pub use factory::OscillatorFactory;
pub use flavour::{ChannelMap, NeutrinoFlavour, NuType, OscillationChannel, ProbabilityRecord};
pub use oscillator::{Oscillator, ProbabilityHandle, Strategy};
