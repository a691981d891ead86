// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Angular power spectra (and their covariances) of every pairing of
//! tomographic bins, field by field.
//!
//! The expensive parts of a run (the mode-coupling matrix, the covariance
//! coupling coefficients and the deprojection bias) are cached in each field's
//! `cache` directory and only recomputed when the mask, bandpowers or
//! deprojected templates change.

mod covariances;
mod error;
mod fields;
mod power_spectra;

pub use covariances::CovariancesParams;
pub use error::CellsError;
pub use fields::FieldSet;
pub use power_spectra::PowerSpectraParams;

use std::{fmt, str::FromStr};

use itertools::iproduct;

/// An unordered pair of tomographic bins, stored with `i <= j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pairing {
    pub i: usize,
    pub j: usize,
}

impl Pairing {
    pub fn new(i: usize, j: usize) -> Pairing {
        Pairing {
            i: i.min(j),
            j: i.max(j),
        }
    }

    /// Every pairing of `num_bins` bins, in row-major order; `(0,0), (0,1),
    /// ..., (1,1), ...`.
    pub fn all(num_bins: usize) -> Vec<Pairing> {
        iproduct!(0..num_bins, 0..num_bins)
            .filter(|(i, j)| i <= j)
            .map(|(i, j)| Pairing { i, j })
            .collect()
    }

    /// Only auto-correlations have shot noise.
    pub fn is_auto(&self) -> bool {
        self.i == self.j
    }

    /// The label used to name this pairing in files, e.g. `(0,1)`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.i, self.j)
    }
}

impl FromStr for Pairing {
    type Err = CellsError;

    /// Accepts `(i,j)`, `i,j` or `i j`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CellsError::BadPairing(s.to_string());
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parts = inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let i = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let j = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Pairing::new(i, j))
    }
}

/// The multiplicative correction to a power spectrum for a stellar fraction
/// `fs` of the galaxy sample; stars dilute the overdensity by `1 - fs`.
pub fn stellar_correction(fs: f64) -> f64 {
    (1.0 / (1.0 - fs)).powi(2)
}
