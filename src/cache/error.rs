// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with cache files.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("{file}: line {line_num}: couldn't parse a template coefficient from '{line}'")]
    BadAlphaLine {
        file: PathBuf,
        line_num: usize,
        line: String,
    },

    #[error("Got {num_names} template names but {num_alphas} coefficients")]
    AlphaCountMismatch { num_names: usize, num_alphas: usize },

    #[error("{file}: {err}")]
    Io {
        file: PathBuf,
        #[source]
        err: std::io::Error,
    },
}
