//! Evaluation grids and bin edges.
//!
//! Engines look up energies and cosine-z values by *exact* match: a query
//! value must be bit-identical to a grid point. Strategies that accept
//! arbitrary values first snap them to a bin with [`BinEdges::find_bin`].

use crate::{Error, Result};

/// Validate an energy grid: non-empty, strictly positive, non-decreasing.
pub fn validate_energy_grid(origin: &str, grid: &[f64]) -> Result<()> {
    if grid.is_empty() {
        return Err(Error::range(origin, "energy grid is empty"));
    }
    for (i, &e) in grid.iter().enumerate() {
        // `!(e > 0)` also rejects NaN
        if !(e > 0.0) {
            return Err(Error::range(origin, format!("energy[{i}] = {e} is not positive")));
        }
    }
    check_ascending(origin, "energy", grid)
}

/// Validate a cosine-z grid: non-empty, within [-1, 1], non-decreasing.
pub fn validate_cosine_z_grid(origin: &str, grid: &[f64]) -> Result<()> {
    if grid.is_empty() {
        return Err(Error::range(origin, "cosine-z grid is empty"));
    }
    for (i, &c) in grid.iter().enumerate() {
        if !(-1.0..=1.0).contains(&c) {
            return Err(Error::range(origin, format!("cosine_z[{i}] = {c} is outside [-1, 1]")));
        }
    }
    check_ascending(origin, "cosine_z", grid)
}

fn check_ascending(origin: &str, axis: &str, grid: &[f64]) -> Result<()> {
    match grid.windows(2).position(|w| w[0] > w[1]) {
        Some(i) => Err(Error::range(
            origin,
            format!("{axis} grid is not ascending: {axis}[{i}] = {} > {axis}[{}] = {}", grid[i], i + 1, grid[i + 1]),
        )),
        None => Ok(()),
    }
}

/// Index of the first grid point exactly equal to `value`.
///
/// Binary search for the lower bound followed by an equality test; there is
/// no tolerance and no interpolation.
pub fn exact_index(grid: &[f64], value: f64) -> Option<usize> {
    let i = grid.partition_point(|&g| g < value);
    (i < grid.len() && grid[i] == value).then_some(i)
}

/// Strictly increasing bin edges of one axis (`n_bins + 1` values).
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::range(
                "binning",
                format!("need at least two bin edges, got {}", edges.len()),
            ));
        }
        if let Some(i) = edges.iter().position(|e| !e.is_finite()) {
            return Err(Error::range("binning", format!("edge[{i}] = {} is not finite", edges[i])));
        }
        if let Some(i) = edges.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Error::range(
                "binning",
                format!("edges are not strictly increasing at edge[{}] = {}", i + 1, edges[i + 1]),
            ));
        }
        Ok(Self { edges })
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn lower(&self) -> f64 {
        self.edges[0]
    }

    pub fn upper(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.edges
    }

    /// Arithmetic midpoints of every bin.
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    }

    /// Bin containing `value` under the half-open rule `[low, high)`.
    ///
    /// A value equal to the final upper edge is outside the binning. This
    /// function is pure: the same value and edges always give the same bin,
    /// which the sub-sampling strategy relies on.
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        self.edges.windows(2).position(|w| value >= w[0] && value < w[1])
    }

    /// [`BinEdges::find_bin`] reporting a range error for `origin`.
    pub fn locate(&self, origin: &str, axis: &str, value: f64) -> Result<usize> {
        self.find_bin(value).ok_or_else(|| {
            Error::range(
                origin,
                format!(
                    "{axis} = {value} is outside the binning [{}, {})",
                    self.lower(),
                    self.upper()
                ),
            )
        })
    }
}

/// `n` evenly spaced points from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { stop } else { start + step * i as f64 }).collect()
        }
    }
}

/// `n` logarithmically spaced points from `start` to `stop` inclusive.
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let (lo, hi) = (start.log10(), stop.log10());
    linspace(lo, hi, n)
        .into_iter()
        .enumerate()
        .map(|(i, x)| match i {
            0 => start,
            _ if i == n - 1 => stop,
            _ => 10f64.powf(x),
        })
        .collect()
}
