// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with computing power spectra and covariances.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CellsError {
    #[error("Couldn't parse '{0}' as a bin pairing; expected something like '(0,1)'")]
    BadPairing(String),

    #[error("Bin pairing {pairing} was requested, but there are only {num_bins} tomographic bins")]
    PairingOutOfRange { pairing: String, num_bins: usize },

    #[error("{deltag} has {num_deltag} tomographic maps, but {ngal} has {num_ngal}")]
    BinCountMismatch {
        deltag: PathBuf,
        num_deltag: usize,
        ngal: PathBuf,
        num_ngal: usize,
    },

    #[error("Tomographic bin {bin} of {file} has no galaxies in the unmasked area; can't compute its shot noise")]
    NoGalaxies { file: PathBuf, bin: usize },

    #[error("Cached workspace {0} doesn't exist or doesn't match the current mask and bandpowers; run 'power-spectra' first")]
    MissingWorkspace(PathBuf),

    #[error("Result {0} doesn't exist; run 'power-spectra' for every bin pairing first")]
    MissingResult(PathBuf),

    #[error("Couldn't create directory {dir}: {err}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Map(#[from] crate::maps::MapError),

    #[error(transparent)]
    Bandpower(#[from] crate::bandpowers::BandpowerError),

    #[error(transparent)]
    Harmonic(#[from] crate::harmonic::HarmonicError),

    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),

    #[error(transparent)]
    Results(#[from] crate::results::ResultsError),
}
