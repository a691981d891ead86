// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Mode-decoupled angular power spectra (and their Gaussian covariances) of
galaxy clustering, from HEALPix survey maps.
 */

pub mod bandpowers;
pub mod cache;
pub mod cells;
mod cli;
pub mod config;
pub mod constants;
pub mod harmonic;
pub mod healpix;
pub mod io;
pub mod maps;
pub mod results;

use crossbeam_utils::atomic::AtomicCell;

/// Should progress bars be drawn? Set once by the CLI; everything else only
/// reads it.
pub static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

// Re-exports.
pub use cli::{Gcells, GcellsError};
