// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with pipeline configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file '{0}' doesn't exist")]
    DoesNotExist(PathBuf),

    #[error("Config file '{file}' doesn't have a recognised file extension! Valid extensions are: {valid}")]
    UnrecognisedExtension { file: PathBuf, valid: String },

    #[error("Couldn't decode {format} structure from '{file}':\n{message}")]
    Parse {
        file: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("No fields were specified")]
    NoFields,

    #[error("nside_hi ({nside}) must be a power of 2 no larger than 2^29")]
    BadNside { nside: u32 },

    #[error("The stellar fraction must be in [0, 1), but got {0}")]
    BadStellarFraction(f64),

    #[error("The weight threshold must be in [0, 1), but got {0}")]
    BadWeightThreshold(f64),

    #[error("Couldn't find systematics maps: {0}")]
    Glob(#[from] crate::io::GlobError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
