//! Fixed bin-edge grid shared by all engines.

use crate::grid::BinEdges;
use crate::{Error, Result};

/// Binned strategy: queries snap to the centre of their bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Binned {
    energy: BinEdges,
    cosine_z: Option<BinEdges>,
    energy_centers: Vec<f64>,
    cosine_z_centers: Option<Vec<f64>>,
}

impl Binned {
    /// `cosine_z` is `None` when the oscillator ignores cosine-z.
    pub fn new(energy: BinEdges, cosine_z: Option<BinEdges>) -> Self {
        let energy_centers = energy.centers();
        let cosine_z_centers = cosine_z.as_ref().map(BinEdges::centers);
        Self { energy, cosine_z, energy_centers, cosine_z_centers }
    }

    pub fn energy_edges(&self) -> &BinEdges {
        &self.energy
    }

    pub fn cosine_z_edges(&self) -> Option<&BinEdges> {
        self.cosine_z.as_ref()
    }

    /// Engine energy grid.
    pub fn energy_centers(&self) -> &[f64] {
        &self.energy_centers
    }

    /// Engine cosine-z grid.
    pub fn cosine_z_centers(&self) -> Option<&[f64]> {
        self.cosine_z_centers.as_deref()
    }

    /// Map a query point to the grid point of its bin.
    pub fn resolve(&self, origin: &str, energy: f64, cosine_z: Option<f64>) -> Result<(f64, Option<f64>)> {
        let e = self.energy.locate(origin, "energy", energy)?;
        let cz = match (&self.cosine_z, &self.cosine_z_centers, cosine_z) {
            (Some(edges), Some(centers), Some(value)) => {
                Some(centers[edges.locate(origin, "cosine_z", value)?])
            }
            (Some(_), _, None) => return Err(Error::lookup(origin, "a cosine_z value is required")),
            _ => None,
        };
        Ok((self.energy_centers[e], cz))
    }
}
