// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Survey masks and dense sky maps.
//!
//! Everything here is a full-sky, RING-ordered array of `12 nside^2` pixels.
//! Pixels without data in the sparse files are set to zero.

mod error;
#[cfg(test)]
mod tests;

pub use error::MapError;

use std::path::{Path, PathBuf};

use log::{debug, warn};
use ndarray::prelude::*;

use crate::{healpix::nside2pixarea, io::sparse_map::SparseMap};

/// A survey mask and its summary statistics.
#[derive(Debug, Clone)]
pub struct MaskData {
    /// The mask weights for every pixel of the sky. Always within [0, 1].
    pub weights: Array1<f64>,

    /// The RING indices of pixels with weight above the threshold.
    pub valid_pixels: Vec<usize>,

    pub summary: MaskSummary,
}

/// The numbers describing a mask that are still needed once the mask itself
/// has been consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskSummary {
    pub nside: u32,

    /// The weight threshold used to define valid pixels.
    pub threshold: f64,

    pub num_valid: usize,

    /// Σ w over valid pixels.
    pub sum: f64,

    /// `sum / num_valid`.
    pub mean: f64,

    /// Σ w² / `num_valid`.
    pub meansq: f64,
}

impl MaskSummary {
    /// The solid angle of a single pixel [steradians].
    pub fn pixel_area(&self) -> f64 {
        nside2pixarea(self.nside)
    }
}

impl MaskData {
    /// Read a mask from a sparse map file. The file must have `nside`
    /// resolution.
    pub fn read<P: AsRef<Path>>(file: P, nside: u32, threshold: f64) -> Result<MaskData, MapError> {
        let file = file.as_ref();
        let sparse = SparseMap::read(file)?;
        if sparse.nside() != nside {
            return Err(MapError::NsideMismatch {
                file: file.to_path_buf(),
                expected: nside,
                got: sparse.nside(),
            });
        }
        let weights = sparse.to_dense_ring(0, 0.0)?;
        MaskData::from_weights(file, nside, weights, threshold)
    }

    /// Build a mask from dense weights. `source` is only used in error
    /// messages.
    pub(crate) fn from_weights(
        source: &Path,
        nside: u32,
        weights: Array1<f64>,
        threshold: f64,
    ) -> Result<MaskData, MapError> {
        if let Some((pixel, &value)) = weights
            .iter()
            .enumerate()
            .find(|(_, &w)| !(0.0..=1.0).contains(&w))
        {
            return Err(MapError::WeightOutOfRange {
                file: source.to_path_buf(),
                pixel,
                value,
            });
        }

        let valid_pixels: Vec<usize> = weights
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > threshold)
            .map(|(p, _)| p)
            .collect();
        if valid_pixels.is_empty() {
            return Err(MapError::NoValidPixels {
                file: source.to_path_buf(),
                threshold,
            });
        }

        let (sum, sum_sq) = valid_pixels
            .iter()
            .map(|&p| weights[p])
            .fold((0.0, 0.0), |(s, s2), w| (s + w, s2 + w * w));
        let num_valid = valid_pixels.len();
        let summary = MaskSummary {
            nside,
            threshold,
            num_valid,
            sum,
            mean: sum / num_valid as f64,
            meansq: sum_sq / num_valid as f64,
        };
        debug!(
            "Mask {}: {num_valid} valid pixels, mean weight {}, mean square weight {}",
            source.display(),
            summary.mean,
            summary.meansq
        );

        Ok(MaskData {
            weights,
            valid_pixels,
            summary,
        })
    }

    /// The mask-weighted mean of `map` over valid pixels, `Σ map w / sum`.
    pub fn weighted_mean(&self, map: ArrayView1<f64>) -> f64 {
        self.valid_pixels
            .iter()
            .map(|&p| map[p] * self.weights[p])
            .sum::<f64>()
            / self.summary.sum
    }

    /// `Σ map / sum` over valid pixels. For a map of galaxy counts, this is
    /// the mean number of galaxies per unit of mask weight.
    pub fn mean_count(&self, map: ArrayView1<f64>) -> f64 {
        self.valid_pixels.iter().map(|&p| map[p]).sum::<f64>() / self.summary.sum
    }
}

fn check_nside(file: &Path, sparse: &SparseMap, mask: Option<&MaskData>) -> Result<(), MapError> {
    match mask {
        Some(mask) if mask.summary.nside != sparse.nside() => Err(MapError::NsideMismatch {
            file: file.to_path_buf(),
            expected: mask.summary.nside,
            got: sparse.nside(),
        }),
        _ => Ok(()),
    }
}

fn apply_mask_to(map: &mut Array1<f64>, mask: Option<&MaskData>) {
    match mask {
        Some(mask) => *map *= &mask.weights,
        None => warn!("Could not apply mask to map; no mask was provided"),
    }
}

/// Load a single dense map. Systematics maps have their mask-weighted mean
/// subtracted from every valid pixel. Both that and masking need `mask`;
/// without it, they are skipped with a warning.
pub fn load_map<P: AsRef<Path>>(
    file: P,
    apply_mask: bool,
    is_systmap: bool,
    mask: Option<&MaskData>,
) -> Result<Array1<f64>, MapError> {
    let file = file.as_ref();
    let sparse = SparseMap::read(file)?;
    check_nside(file, &sparse, mask)?;
    let mut map = sparse.to_dense_ring(0, 0.0)?;

    if is_systmap {
        match mask {
            Some(mask) => {
                let mu = mask.weighted_mean(map.view());
                debug!("Subtracting mean {mu} from {}", file.display());
                for &p in &mask.valid_pixels {
                    map[p] -= mu;
                }
            }
            None => warn!(
                "Could not correct systematics map {}; no mask was provided",
                file.display()
            ),
        }
    }

    if apply_mask {
        apply_mask_to(&mut map, mask);
    }

    Ok(map)
}

/// Load every map (one per band) in a tomographic sparse map file, or only
/// those at `indices`, in the order given.
pub fn load_tomographic_maps<P: AsRef<Path>>(
    file: P,
    apply_mask: bool,
    mask: Option<&MaskData>,
    indices: Option<&[usize]>,
) -> Result<Vec<Array1<f64>>, MapError> {
    let file = file.as_ref();
    let sparse = SparseMap::read(file)?;
    check_nside(file, &sparse, mask)?;

    let num_maps = sparse.num_bands();
    let indices: Vec<usize> = match indices {
        Some(indices) => indices.to_vec(),
        None => (0..num_maps).collect(),
    };

    let mut maps = Vec::with_capacity(indices.len());
    for index in indices {
        if index >= num_maps {
            return Err(MapError::BadIndex {
                file: PathBuf::from(file),
                index,
                num_maps,
            });
        }
        let mut map = sparse.to_dense_ring(index, 0.0)?;
        if apply_mask {
            apply_mask_to(&mut map, mask);
        }
        maps.push(map);
    }
    Ok(maps)
}

/// The number of maps in a tomographic sparse map file, without reading any
/// of them.
pub fn count_tomographic_maps<P: AsRef<Path>>(file: P) -> Result<usize, MapError> {
    Ok(SparseMap::count_bands(file)?)
}
