// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multipole binning.
//!
//! Bandpower `b` covers the multipoles `[edges[b], edges[b + 1])` with uniform
//! weights. Multipoles at or above `3 nside` are never included.


use std::ops::Range;

use itertools::Itertools;
use log::{debug, warn};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::constants::N19_BANDPOWER_EDGES;

/// How bandpower edges are chosen.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BinSpacing {
    /// A fixed list of edges (by default those of Nicola et al. 2019).
    #[default]
    Fixed,

    /// Geometrically-spaced edges between `ell_min` and `3 nside`.
    Log,

    /// Linearly-spaced edges between `ell_min` and `3 nside`.
    Linear,
}

/// User-facing bandpower settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandpowerSettings {
    #[serde(default)]
    pub spacing: BinSpacing,

    /// Edges for [`BinSpacing::Fixed`].
    #[serde(default = "default_edges")]
    pub edges: Vec<u32>,

    /// The first edge for [`BinSpacing::Log`] and [`BinSpacing::Linear`].
    #[serde(default = "default_ell_min")]
    pub ell_min: u32,

    /// The number of edges for [`BinSpacing::Log`] and
    /// [`BinSpacing::Linear`].
    #[serde(default = "default_nbpws")]
    pub nbpws: usize,
}

fn default_edges() -> Vec<u32> {
    N19_BANDPOWER_EDGES.to_vec()
}

fn default_ell_min() -> u32 {
    100
}

fn default_nbpws() -> usize {
    14
}

impl Default for BandpowerSettings {
    fn default() -> Self {
        BandpowerSettings {
            spacing: BinSpacing::default(),
            edges: default_edges(),
            ell_min: default_ell_min(),
            nbpws: default_nbpws(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum BandpowerError {
    #[error("Only {num} bandpower edge(s) remain below ell = {ell_max}; at least 2 are needed")]
    TooFewEdges { num: usize, ell_max: usize },

    #[error("Fixed bandpower edges must be strictly increasing, but got {edges:?}")]
    NotIncreasing { edges: Vec<u32> },

    #[error("ell_min ({ell_min}) must be positive and below ell = {ell_max}")]
    BadEllMin { ell_min: u32, ell_max: usize },

    #[error("At least 2 bandpower edges must be requested, but nbpws = {0}")]
    TooFewRequested(usize),
}

/// Multipole bins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bandpowers {
    edges: Vec<usize>,
}

impl Bandpowers {
    /// Derive bandpowers for a map with resolution `nside`.
    pub fn new(settings: &BandpowerSettings, nside: u32) -> Result<Bandpowers, BandpowerError> {
        let ell_max = 3 * nside as usize;
        let edges: Vec<usize> = match settings.spacing {
            BinSpacing::Fixed => {
                if settings.edges.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(BandpowerError::NotIncreasing {
                        edges: settings.edges.clone(),
                    });
                }
                settings
                    .edges
                    .iter()
                    .map(|&e| e as usize)
                    .filter(|&e| e <= ell_max)
                    .collect()
            }
            BinSpacing::Log | BinSpacing::Linear => {
                let ell_min = settings.ell_min as usize;
                if ell_min == 0 || ell_min >= ell_max {
                    return Err(BandpowerError::BadEllMin {
                        ell_min: settings.ell_min,
                        ell_max,
                    });
                }
                let n = settings.nbpws;
                if n < 2 {
                    return Err(BandpowerError::TooFewRequested(n));
                }
                let spaced = if settings.spacing == BinSpacing::Log {
                    geomspace(ell_min as f64, ell_max as f64, n)
                } else {
                    linspace(ell_min as f64, ell_max as f64, n)
                };
                // Truncation to integers can produce repeated edges.
                let truncated: Vec<usize> = spaced.into_iter().map(|e| e as usize).collect();
                let deduped: Vec<usize> = truncated.iter().copied().dedup().collect();
                if deduped.len() != truncated.len() {
                    warn!(
                        "Dropped {} duplicate bandpower edge(s) after truncating to integers",
                        truncated.len() - deduped.len()
                    );
                }
                deduped
            }
        };

        if edges.len() < 2 {
            return Err(BandpowerError::TooFewEdges {
                num: edges.len(),
                ell_max,
            });
        }
        debug!("Bandpower edges: {edges:?}");
        Ok(Bandpowers { edges })
    }

    /// Bandpowers straight from a list of edges. The edges must be strictly
    /// increasing.
    pub fn from_edges(edges: Vec<usize>) -> Result<Bandpowers, BandpowerError> {
        if edges.len() < 2 {
            return Err(BandpowerError::TooFewEdges {
                num: edges.len(),
                ell_max: edges.last().copied().unwrap_or(0),
            });
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BandpowerError::NotIncreasing {
                edges: edges.iter().map(|&e| e as u32).collect(),
            });
        }
        Ok(Bandpowers { edges })
    }

    pub fn edges(&self) -> &[usize] {
        &self.edges
    }

    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// The multipoles belonging to each bin.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.edges.windows(2).map(|w| w[0]..w[1])
    }

    /// The mean multipole of each bin.
    pub fn ell_effs(&self) -> Array1<f64> {
        self.ranges()
            .map(|r| (r.start + r.end - 1) as f64 / 2.0)
            .collect()
    }

    /// Average a per-multipole spectrum into bandpowers. `cl` must cover every
    /// multipole below the last edge.
    pub fn bin_spectrum(&self, cl: ArrayView1<f64>) -> Array1<f64> {
        self.ranges()
            .map(|r| {
                let n = r.len() as f64;
                cl.slice(s![r]).sum() / n
            })
            .collect()
    }

    /// The `(num_bins, num_ells)` matrix that [`Bandpowers::bin_spectrum`]
    /// applies.
    pub fn binning_matrix(&self, num_ells: usize) -> Array2<f64> {
        let mut b = Array2::zeros((self.num_bins(), num_ells));
        for (i, r) in self.ranges().enumerate() {
            let weight = 1.0 / r.len() as f64;
            for ell in r.filter(|&ell| ell < num_ells) {
                b[(i, ell)] = weight;
            }
        }
        b
    }
}

fn geomspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    let (log_start, log_stop) = (start.ln(), stop.ln());
    let step = (log_stop - log_start) / (num - 1) as f64;
    let mut out: Vec<f64> = (0..num)
        .map(|i| (log_start + i as f64 * step).exp())
        .collect();
    // Pin the end points, as rounding in exp/ln can nudge them below an
    // integer.
    out[0] = start;
    out[num - 1] = stop;
    out
}

fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    let step = (stop - start) / (num - 1) as f64;
    let mut out: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
    out[num - 1] = stop;
    out
}
