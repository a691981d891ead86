// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Small files recording what a previous run did, so that expensive results
//! can be reused.
//!
//! - A deprojection-state file lists the templates deprojected for a bin
//!   pairing (one per line), followed by a line recording lite mode. It is
//!   compared as a set, so the order of templates doesn't matter.
//! - Coupling workspaces carry a SHA-256 key of the mask, resolution and
//!   bandpower edges they were computed with.
//! - Template coefficient ("alphas") files have a template name and its
//!   coefficient on each line.

mod error;
#[cfg(test)]
mod tests;

pub use error::CacheError;

use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use log::{debug, trace};
use ndarray::ArrayView1;
use sha2::{Digest, Sha256};
use strum_macros::Display;

/// Whether the results cached for a bin pairing can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeprojectionState {
    /// The same templates (and lite mode) as the previous run, or no
    /// templates and no previous run.
    Valid,

    /// Anything cached must be recomputed.
    Stale,
}

/// The lines a deprojection-state file should contain.
fn record_lines(template_ids: &[String], lite: bool) -> BTreeSet<String> {
    let mut lines: BTreeSet<String> = template_ids.iter().cloned().collect();
    lines.insert(format!("lite={lite}"));
    lines
}

/// Compare the templates requested now with those recorded in `file`.
pub fn check_deprojection_state(
    file: &Path,
    template_ids: &[String],
    lite: bool,
) -> Result<DeprojectionState, CacheError> {
    if !file.exists() {
        let state = if template_ids.is_empty() {
            DeprojectionState::Valid
        } else {
            DeprojectionState::Stale
        };
        debug!("No deprojection record at {}; {state}", file.display());
        return Ok(state);
    }

    let io_err = |err| CacheError::Io {
        file: file.to_path_buf(),
        err,
    };
    let reader = BufReader::new(File::open(file).map_err(io_err)?);
    let mut recorded = BTreeSet::new();
    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        let line = line.trim();
        if !line.is_empty() {
            recorded.insert(line.to_string());
        }
    }

    let state = if recorded == record_lines(template_ids, lite) {
        DeprojectionState::Valid
    } else {
        DeprojectionState::Stale
    };
    debug!("Deprojection record {}: {state}", file.display());
    Ok(state)
}

/// Record the templates deprojected by a run that completed.
pub fn write_deprojection_state(
    file: &Path,
    template_ids: &[String],
    lite: bool,
) -> Result<(), CacheError> {
    trace!("Writing deprojection record {}", file.display());
    let io_err = |err| CacheError::Io {
        file: file.to_path_buf(),
        err,
    };
    let mut writer = BufWriter::new(File::create(file).map_err(io_err)?);
    for id in template_ids {
        writeln!(writer, "{id}").map_err(io_err)?;
    }
    writeln!(writer, "lite={lite}").map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    Ok(())
}

/// The key identifying the inputs of a mode-coupling or covariance workspace.
pub fn workspace_cache_key(weights: ArrayView1<f64>, nside: u32, edges: &[usize]) -> String {
    let mut hasher = Sha256::new();
    for w in weights.iter() {
        hasher.update(w.to_le_bytes());
    }
    hasher.update(nside.to_le_bytes());
    hasher.update((edges.len() as u64).to_le_bytes());
    for &e in edges {
        hasher.update((e as u64).to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn write_alphas(file: &Path, names: &[String], alphas: &[f64]) -> Result<(), CacheError> {
    if names.len() != alphas.len() {
        return Err(CacheError::AlphaCountMismatch {
            num_names: names.len(),
            num_alphas: alphas.len(),
        });
    }
    trace!("Writing template coefficients {}", file.display());
    let io_err = |err| CacheError::Io {
        file: file.to_path_buf(),
        err,
    };
    let mut writer = BufWriter::new(File::create(file).map_err(io_err)?);
    for (name, alpha) in names.iter().zip(alphas) {
        writeln!(writer, "{name} {alpha}").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(())
}

pub fn read_alphas(file: &Path) -> Result<Vec<(String, f64)>, CacheError> {
    let io_err = |err| CacheError::Io {
        file: file.to_path_buf(),
        err,
    };
    let reader = BufReader::new(File::open(file).map_err(io_err)?);
    let mut alphas = vec![];
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = line
            .trim()
            .rsplit_once(char::is_whitespace)
            .and_then(|(name, alpha)| Some((name.trim().to_string(), alpha.parse().ok()?)));
        match parsed {
            Some(p) => alphas.push(p),
            None => {
                return Err(CacheError::BadAlphaLine {
                    file: file.to_path_buf(),
                    line_num: i + 1,
                    line,
                })
            }
        }
    }
    Ok(alphas)
}
