// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all gcells-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use crate::{
    bandpowers::BandpowerError,
    cache::CacheError,
    cells::CellsError,
    config::ConfigError,
    harmonic::HarmonicError,
    io::{fits::FitsError, sparse_map::SparseMapError},
    maps::MapError,
    results::ResultsError,
};

const DOCS: &str = "the README";

/// The *only* publicly visible error from gcells. Each error message should
/// point at the relevant documentation, unless it's "generic".
#[derive(Error, Debug)]
pub enum GcellsError {
    /// An error related to the configuration file.
    #[error("{0}\n\nSee the \"Configuration\" section of {DOCS} for more info.")]
    Config(String),

    /// An error related to input maps.
    #[error("{0}\n\nSee the \"Input maps\" section of {DOCS} for more info.")]
    Maps(String),

    /// An error related to bandpowers.
    #[error("{0}\n\nSee the \"Bandpowers\" section of {DOCS} for more info.")]
    Bandpowers(String),

    /// An error related to the cache of workspaces and deprojection state.
    #[error("{0}\n\nDeleting the field's cache directory (or setting 'recompute: true') forces everything to be recomputed. See the \"Caching\" section of {DOCS} for more info.")]
    Cache(String),

    /// An error related to computing power spectra.
    #[error("{0}\n\nSee the \"Power spectra\" section of {DOCS} for more info.")]
    PowerSpectra(String),

    /// An error related to computing covariances.
    #[error("{0}\n\nSee the \"Covariances\" section of {DOCS} for more info.")]
    Covariances(String),

    /// An error related to result files.
    #[error("{0}\n\nSee the \"Output files\" section of {DOCS} for more info.")]
    Results(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    Cfitsio(String),

    /// A generic error that can't be clarified further with documentation, e.g.
    /// IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<CellsError> for GcellsError {
    fn from(e: CellsError) -> Self {
        let s = e.to_string();
        match e {
            CellsError::Config(_) => Self::Config(s),
            CellsError::Map(e) => Self::from(e),
            CellsError::Bandpower(_) => Self::Bandpowers(s),
            CellsError::Harmonic(e) => Self::from(e),
            CellsError::Cache(_) => Self::Cache(s),
            CellsError::Results(e) => Self::from(e),
            CellsError::MissingWorkspace(_) | CellsError::MissingResult(_) => {
                Self::Covariances(s)
            }
            CellsError::BadPairing(_)
            | CellsError::PairingOutOfRange { .. }
            | CellsError::BinCountMismatch { .. }
            | CellsError::NoGalaxies { .. } => Self::PowerSpectra(s),
            CellsError::CreateDir { .. } => Self::Generic(s),
        }
    }
}

impl From<ConfigError> for GcellsError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<MapError> for GcellsError {
    fn from(e: MapError) -> Self {
        match e {
            MapError::SparseMap(e) => Self::from(e),
            e => Self::Maps(e.to_string()),
        }
    }
}

impl From<SparseMapError> for GcellsError {
    fn from(e: SparseMapError) -> Self {
        let s = e.to_string();
        match e {
            SparseMapError::Fits(e) => Self::from(e),
            SparseMapError::Fitsio(_) => Self::Cfitsio(s),
            _ => Self::Maps(s),
        }
    }
}

impl From<HarmonicError> for GcellsError {
    fn from(e: HarmonicError) -> Self {
        let s = e.to_string();
        match e {
            HarmonicError::Fits(e) => Self::from(e),
            HarmonicError::Bandpower(_) => Self::Bandpowers(s),
            _ => Self::PowerSpectra(s),
        }
    }
}

impl From<ResultsError> for GcellsError {
    fn from(e: ResultsError) -> Self {
        match e {
            ResultsError::Fits(e) => Self::from(e),
            e => Self::Results(e.to_string()),
        }
    }
}

impl From<FitsError> for GcellsError {
    fn from(e: FitsError) -> Self {
        Self::Cfitsio(e.to_string())
    }
}

impl From<BandpowerError> for GcellsError {
    fn from(e: BandpowerError) -> Self {
        Self::Bandpowers(e.to_string())
    }
}

impl From<CacheError> for GcellsError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e.to_string())
    }
}

impl From<std::io::Error> for GcellsError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
