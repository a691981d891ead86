// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. `gcells` does all of its harmonic
analysis in double precision.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// The value HEALPix uses to flag a pixel without data.
pub const UNSEEN: f64 = -1.6375e30;

/// Pixels with a mask weight at or below this value are excluded from mask
/// statistics, unless the configuration says otherwise.
pub const DEFAULT_WEIGHT_THRESHOLD: f64 = 0.0;

/// Bandpower edges used for the HSC first-year clustering analysis of Nicola
/// et al. (2019). These are clipped to the maximum multipole supported by the
/// map resolution.
pub const N19_BANDPOWER_EDGES: [u32; 18] = [
    100, 200, 300, 400, 600, 800, 1000, 1400, 1800, 2200, 3000, 3800, 4600, 6200, 7800, 9400,
    12600, 15800,
];

/// The default fraction of the galaxy sample assumed to be misclassified stars.
pub const DEFAULT_FS_FIDUCIAL: f64 = 0.02;

/// Singular values of the template Gram matrix smaller than this (relative to
/// the largest) are discarded when forming its pseudo-inverse.
pub const TEMPLATE_SVD_EPSILON: f64 = 1e-10;

/// A masked template whose squared norm is at most this fraction of the masked
/// map's is treated as zero. Constant templates only keep floating-point
/// residue once their mean is subtracted.
pub const NEGLIGIBLE_TEMPLATE_NORM: f64 = 1e-24;

/// The number of HEALPix rings handled together by one parallel task in the
/// spherical-harmonic transforms. Partial sums are combined in ring order, so
/// results don't depend on the number of threads.
pub const SHT_RING_CHUNK: usize = 8;
