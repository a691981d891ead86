// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with harmonic analysis.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarmonicError {
    #[error("The binned mode-coupling matrix is singular; every bandpower must contain multipoles coupled by the mask")]
    SingularCouplingMatrix,

    #[error("Couldn't form the pseudo-inverse of the template Gram matrix: {0}")]
    PseudoInverse(&'static str),

    #[error("Expected {expected} elements in {thing}, but got {got}")]
    SizeMismatch {
        thing: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("A field built in lite mode can't be used to compute a deprojection bias")]
    LiteField,

    #[error("{file}: workspace {thing} has shape {got:?}, but {expected:?} was expected")]
    BadWorkspaceShape {
        file: PathBuf,
        thing: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error(transparent)]
    Bandpower(#[from] crate::bandpowers::BandpowerError),

    #[error(transparent)]
    Fits(#[from] crate::io::fits::FitsError),
}
