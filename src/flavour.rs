//! Neutrino flavours, oscillation channels and the channel map.
//!
//! Flavours are identified by positive integer codes (`Electron = 1` ...
//! `Sterile3 = 6`). At query time the *sign* of the codes selects neutrino
//! (`+`) or antineutrino (`-`); the channel itself is always looked up by the
//! absolute values.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Neutrino flavours known to the configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NeutrinoFlavour {
    Electron = 1,
    Muon = 2,
    Tau = 3,
    Sterile1 = 4,
    Sterile2 = 5,
    Sterile3 = 6,
}

impl NeutrinoFlavour {
    /// All flavours in code order.
    pub const ALL: [NeutrinoFlavour; 6] = [
        NeutrinoFlavour::Electron,
        NeutrinoFlavour::Muon,
        NeutrinoFlavour::Tau,
        NeutrinoFlavour::Sterile1,
        NeutrinoFlavour::Sterile2,
        NeutrinoFlavour::Sterile3,
    ];

    /// Positive integer code of this flavour.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`NeutrinoFlavour::code`]. Signs are not accepted here.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            NeutrinoFlavour::Electron => "Electron",
            NeutrinoFlavour::Muon => "Muon",
            NeutrinoFlavour::Tau => "Tau",
            NeutrinoFlavour::Sterile1 => "Sterile1",
            NeutrinoFlavour::Sterile2 => "Sterile2",
            NeutrinoFlavour::Sterile3 => "Sterile3",
        }
    }

    /// True for the three active flavours.
    pub fn is_active(self) -> bool {
        matches!(self, NeutrinoFlavour::Electron | NeutrinoFlavour::Muon | NeutrinoFlavour::Tau)
    }
}

impl fmt::Display for NeutrinoFlavour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NeutrinoFlavour {
    type Err = Error;

    /// Accepts the capitalised name or its all-lowercase spelling.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| s == f.name() || s == f.name().to_lowercase())
            .ok_or_else(|| {
                Error::configuration("flavour map", format!("unknown neutrino flavour '{s}'"))
            })
    }
}

/// Neutrino (+1) or antineutrino (-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NuType {
    Neutrino = 1,
    Antineutrino = -1,
}

impl NuType {
    pub fn sign(self) -> i32 {
        self as i32
    }

    /// Classify a (generated, detected) flavour-code pair by its shared sign.
    ///
    /// Mixed signs are a configuration error; a zero code has no sign and
    /// fails the lookup.
    pub fn from_flavour_pair(generated: i32, detected: i32) -> Result<Self> {
        match (generated.signum(), detected.signum()) {
            (1, 1) => Ok(NuType::Neutrino),
            (-1, -1) => Ok(NuType::Antineutrino),
            (g, d) if g * d < 0 => Err(Error::configuration(
                "flavour map",
                format!(
                    "generated flavour {generated} and detected flavour {detected} are different \
                     neutrino types"
                ),
            )),
            _ => Err(Error::lookup(
                "flavour map",
                format!("flavour codes ({generated}, {detected}) carry no neutrino type"),
            )),
        }
    }
}

impl fmt::Display for NuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.sign())
    }
}

/// Ordered (generated, detected) flavour pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OscillationChannel {
    pub generated: NeutrinoFlavour,
    pub detected: NeutrinoFlavour,
}

impl OscillationChannel {
    pub fn new(generated: NeutrinoFlavour, detected: NeutrinoFlavour) -> Self {
        Self { generated, detected }
    }

    /// True when the channel matches the absolute flavour codes.
    pub fn matches(&self, generated: i32, detected: i32) -> bool {
        self.generated.code() == generated.abs() && self.detected.code() == detected.abs()
    }
}

impl fmt::Display for OscillationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.generated, self.detected)
    }
}

impl FromStr for OscillationChannel {
    type Err = Error;

    /// Parse a `"GeneratedFlavour:DetectedFlavour"` descriptor.
    fn from_str(s: &str) -> Result<Self> {
        let (generated, detected) = s.split_once(':').ok_or_else(|| {
            Error::configuration(
                "flavour map",
                format!("expected 'GeneratedFlavour:DetectedFlavour', got '{s}'"),
            )
        })?;
        Ok(Self::new(generated.trim().parse()?, detected.trim().parse()?))
    }
}

/// Configured channels of one engine, in configuration order.
///
/// The position of a channel in this list is its channel index in the
/// engine's weight array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    channels: Vec<OscillationChannel>,
}

impl ChannelMap {
    /// Build a map, rejecting an empty list and duplicates.
    pub fn new(channels: Vec<OscillationChannel>) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::configuration("flavour map", "no oscillation channels configured"));
        }
        for (i, channel) in channels.iter().enumerate() {
            if channels[..i].contains(channel) {
                return Err(Error::configuration(
                    "flavour map",
                    format!("duplicate oscillation channel {channel} at position {i}"),
                ));
            }
        }
        Ok(Self { channels })
    }

    /// Parse `"Generated:Detected"` descriptors.
    pub fn from_descriptors<S: AsRef<str>>(descriptors: &[S]) -> Result<Self> {
        let channels = descriptors
            .iter()
            .map(|d| d.as_ref().parse::<OscillationChannel>())
            .collect::<Result<Vec<_>>>()?;
        Self::new(channels)
    }

    /// Linear scan for the channel matching the absolute flavour codes.
    pub fn index_of(&self, generated: i32, detected: i32) -> Option<usize> {
        self.channels.iter().position(|c| c.matches(generated, detected))
    }

    pub fn as_slice(&self) -> &[OscillationChannel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// One externally visible probability, produced by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbabilityRecord {
    pub nu_type: NuType,
    pub channel: OscillationChannel,
    pub energy: f64,
    /// `None` for engines that ignore the cosine-z dimension.
    pub cosine_z: Option<f64>,
    pub probability: f64,
}
