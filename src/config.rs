//! Declarative configuration (YAML).
//!
//! ```yaml
//! general:
//!   calculation_type: Binned
//!   cosine_z_ignored: true
//! engines:
//!   - name: beam
//!     implementation: NuFASTLinear
//!     channels: ["Muon:Muon", "Muon:Electron"]
//!     options: { n_newton: 3 }
//! binned:
//!   file: binning.yaml
//!   energy_axis: energy
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::grid::BinEdges;
use crate::{Error, Result};

/// Top-level oscillator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OscillatorConfig {
    pub general: GeneralConfig,
    pub engines: Vec<EngineConfig>,
    #[serde(default)]
    pub binned: Option<BinnedConfig>,
    #[serde(default)]
    pub sub_sampling: Option<SubSamplingConfig>,
}

impl OscillatorConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        parse_yaml("oscillator config", yaml)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    pub calculation_type: CalculationType,
    #[serde(default)]
    pub cosine_z_ignored: bool,
}

/// Evaluation topology of an oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculationType {
    Binned,
    Unbinned,
    SubSampling,
}

impl CalculationType {
    pub fn name(self) -> &'static str {
        match self {
            CalculationType::Binned => "Binned",
            CalculationType::Unbinned => "Unbinned",
            CalculationType::SubSampling => "SubSampling",
        }
    }
}

/// One engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Human-readable identifier used in logs and errors.
    pub name: String,
    /// Registry key of the backend, e.g. `NuFASTLinear`.
    pub implementation: String,
    /// `"GeneratedFlavour:DetectedFlavour"` descriptors.
    pub channels: Vec<String>,
    /// Sanitization tolerance ε; defaults to [`crate::engine::DEFAULT_TOLERANCE`].
    #[serde(default)]
    pub tolerance: Option<f64>,
    /// Backend-specific options, opaque to the core.
    #[serde(default)]
    pub options: serde_yaml_ng::Value,
}

impl EngineConfig {
    pub fn new(
        name: impl Into<String>,
        implementation: impl Into<String>,
        channels: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            tolerance: None,
            options: serde_yaml_ng::Value::Null,
        }
    }

    /// Deserialize the opaque options into a backend's own option type.
    ///
    /// Missing options give `T::default()`.
    pub fn backend_options<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.options.is_null() {
            return Ok(T::default());
        }
        serde_yaml_ng::from_value(self.options.clone()).map_err(|e| {
            Error::configuration(&self.name, format!("invalid options for {}: {e}", self.implementation))
        })
    }
}

/// Binned strategy: one edge array per axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinnedConfig {
    /// Binning file, relative to the configuration file.
    pub file: PathBuf,
    pub energy_axis: String,
    #[serde(default)]
    pub cosine_z_axis: Option<String>,
}

/// Sub-sampling strategy: coarse (output) and fine (evaluation) axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubSamplingConfig {
    pub file: PathBuf,
    pub coarse_energy_axis: String,
    pub fine_energy_axis: String,
    #[serde(default)]
    pub coarse_cosine_z_axis: Option<String>,
    #[serde(default)]
    pub fine_cosine_z_axis: Option<String>,
}

/// Named bin-edge arrays, the binning resource of the binned strategies.
///
/// ```yaml
/// energy: [0.5, 1.0, 2.0, 5.0]
/// cosine_z: [-1.0, 0.0, 1.0]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinningFile {
    pub axes: BTreeMap<String, Vec<f64>>,
}

impl BinningFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        parse_yaml("binning file", yaml)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "reading binning file");
        Self::from_yaml_str(&text)
    }

    /// Edges of the named axis.
    pub fn axis(&self, name: &str) -> Result<BinEdges> {
        let edges = self.axes.get(name).ok_or_else(|| {
            Error::configuration("binning", format!("axis '{name}' not found in binning file"))
        })?;
        BinEdges::new(edges.clone())
    }
}

/// A missing required field is a configuration error; malformed YAML stays
/// a YAML error.
fn parse_yaml<T: DeserializeOwned>(origin: &str, yaml: &str) -> Result<T> {
    serde_yaml_ng::from_str(yaml).map_err(|err| {
        if err.to_string().contains("missing field") {
            Error::configuration(origin, err.to_string())
        } else {
            Error::Yaml(err)
        }
    })
}
