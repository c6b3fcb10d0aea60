//! String-keyed engine construction.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::engine::nufast_atmospheric::{self, NuFastAtmospheric};
use crate::engine::nufast_linear::{self, NuFastLinear};
use crate::engine::{Engine, OscProbBackend, DEFAULT_TOLERANCE};
use crate::flavour::ChannelMap;
use crate::{Error, Result};

/// Builds a backend from its configuration and parsed channel map.
pub type BackendBuilder =
    Box<dyn Fn(&EngineConfig, &ChannelMap) -> Result<Box<dyn OscProbBackend>> + Send + Sync>;

/// Implementation name → backend builder.
///
/// Constructed explicitly and passed to the factory; callers may register
/// their own backends next to the built-in ones.
#[derive(Default)]
pub struct EngineRegistry {
    builders: BTreeMap<String, BackendBuilder>,
}

impl EngineRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `NuFASTLinear` and `NuFASTAtmospheric`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.builders.insert(nufast_linear::IMPLEMENTATION.to_string(), Box::new(NuFastLinear::build));
        registry
            .builders
            .insert(nufast_atmospheric::IMPLEMENTATION.to_string(), Box::new(NuFastAtmospheric::build));
        registry
    }

    /// Add a builder. Registering a name twice is a configuration error.
    pub fn register<F>(&mut self, implementation: impl Into<String>, builder: F) -> Result<()>
    where
        F: Fn(&EngineConfig, &ChannelMap) -> Result<Box<dyn OscProbBackend>> + Send + Sync + 'static,
    {
        let implementation = implementation.into();
        if self.builders.contains_key(&implementation) {
            return Err(Error::configuration(
                "engine registry",
                format!("implementation '{implementation}' is already registered"),
            ));
        }
        tracing::debug!(implementation = %implementation, "registered engine implementation");
        self.builders.insert(implementation, Box::new(builder));
        Ok(())
    }

    pub fn contains(&self, implementation: &str) -> bool {
        self.builders.contains_key(implementation)
    }

    /// Registered implementation names, sorted.
    pub fn implementations(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Construct an engine (not yet set up) from its configuration.
    pub fn build(&self, config: &EngineConfig) -> Result<Engine> {
        let builder = self.builders.get(&config.implementation).ok_or_else(|| {
            Error::configuration(
                &config.name,
                format!(
                    "unknown engine implementation '{}'; known: [{}]",
                    config.implementation,
                    self.implementations().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;
        let channels =
            ChannelMap::from_descriptors(&config.channels).map_err(|e| e.with_origin(&config.name))?;
        let backend = builder(config, &channels)?;
        Engine::new(&config.name, backend, channels, config.tolerance.unwrap_or(DEFAULT_TOLERANCE))
    }
}
