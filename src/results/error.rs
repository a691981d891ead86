// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with power-spectrum result files.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Result file '{0}' doesn't exist")]
    DoesNotExist(PathBuf),

    #[error("{file}: dataset '{name}' has shape {got:?}, but a {expected}-dimensional array was expected")]
    BadShape {
        file: PathBuf,
        name: String,
        expected: usize,
        got: Vec<usize>,
    },

    #[error("Linked theory file '{theory}' no longer has HDU '{hdu}'")]
    BrokenTheoryLink {
        theory: PathBuf,
        hdu: String,
    },

    #[error("Couldn't move '{from}' to '{to}': {err}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error(transparent)]
    Fits(#[from] crate::io::fits::FitsError),
}
