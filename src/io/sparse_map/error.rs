// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading and writing sparse maps.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SparseMapError {
    #[error("Sparse map file {0} does not exist")]
    DoesNotExist(PathBuf),

    #[error("{file}: the coverage nside ({nside_coverage}) must not exceed the map nside ({nside})")]
    BadCoverageNside {
        file: PathBuf,
        nside: u32,
        nside_coverage: u32,
    },

    #[error("{file}: expected {expected} elements in {thing}, but found {actual}")]
    BadShape {
        file: PathBuf,
        thing: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{file}: coverage pixel {coverage_pixel} points outside the sparse array")]
    BadCoverageIndex { file: PathBuf, coverage_pixel: usize },

    #[error("Requested band {band}, but the map only has {num_bands} band(s)")]
    BandOutOfRange { band: usize, num_bands: usize },

    #[error("Cannot write a sparse map without any bands")]
    NoBands,

    #[error("Band {band} has {actual} pixels, but nside {nside} requires {expected}")]
    DenseSize {
        band: usize,
        nside: u32,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Healpix(#[from] crate::healpix::HealpixError),

    #[error(transparent)]
    Fits(#[from] crate::io::fits::FitsError),

    #[error(transparent)]
    Fitsio(#[from] fitsio::errors::Error),
}
