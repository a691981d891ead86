// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with loading masks and maps.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("{file} has nside {got}, but nside {expected} was expected")]
    NsideMismatch {
        file: PathBuf,
        expected: u32,
        got: u32,
    },

    #[error("{file}: mask weight {value} at pixel {pixel} is outside [0, 1]")]
    WeightOutOfRange {
        file: PathBuf,
        pixel: usize,
        value: f64,
    },

    #[error("{file}: no pixel has a mask weight above the threshold {threshold}")]
    NoValidPixels { file: PathBuf, threshold: f64 },

    #[error("{file}: requested map index {index}, but the file only has {num_maps} map(s)")]
    BadIndex {
        file: PathBuf,
        index: usize,
        num_maps: usize,
    },

    #[error(transparent)]
    SparseMap(#[from] crate::io::sparse_map::SparseMapError),
}
