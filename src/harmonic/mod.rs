// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pseudo-C_ell machinery: spherical-harmonic transforms, fields with
//! template deprojection, mode-coupling workspaces, deprojection bias and
//! Gaussian covariances. Everything is spin-0.

mod bias;
mod covariance;
mod error;
mod field;
mod sht;
mod wigner;
mod workspace;

pub use bias::deprojection_bias;
pub use covariance::{gaussian_covariance, CovarianceWorkspace};
pub use error::HarmonicError;
pub use field::{DeprojectionData, Field};
pub use sht::{alm2map, map2alm, pseudo_cl, Alm};
pub use workspace::CouplingWorkspace;

use nalgebra::DMatrix;
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::constants::PI;
use wigner::Wigner3j0;

/// The pseudo-power spectrum of a mask, up to `3 nside - 1`.
pub fn mask_spectrum(weights: ArrayView1<f64>, nside: u32) -> Result<Array1<f64>, HarmonicError> {
    let alm = map2alm(weights, nside)?;
    Ok(pseudo_cl(&alm, &alm))
}

/// The `(num_ells, num_ells)` kernel
///
/// `K_ll' = 1/(4π) Σ_l3 (2 l3 + 1) W_l3 (l l' l3; 0 0 0)^2`
///
/// for a mask spectrum `W`. The mode-coupling matrix is `K_ll' (2l' + 1)`.
/// Rows are independent, so they are computed in parallel.
pub(crate) fn coupling_kernel(spectrum: ArrayView1<f64>, num_ells: usize) -> Array2<f64> {
    if spectrum.is_empty() {
        return Array2::zeros((num_ells, num_ells));
    }
    let lmax = num_ells.saturating_sub(1);
    let w3j = Wigner3j0::new(3 * lmax.max(spectrum.len()));
    let rows: Vec<Vec<f64>> = (0..num_ells)
        .into_par_iter()
        .map(|l1| {
            (0..num_ells)
                .map(|l2| {
                    let l3_max = (l1 + l2).min(spectrum.len().saturating_sub(1));
                    // Only even l1 + l2 + l3 contribute.
                    (l1.abs_diff(l2)..=l3_max)
                        .step_by(2)
                        .map(|l3| (2 * l3 + 1) as f64 * spectrum[l3] * w3j.squared(l1, l2, l3))
                        .sum::<f64>()
                        / (4.0 * PI)
                })
                .collect()
        })
        .collect();

    let mut kernel = Array2::zeros((num_ells, num_ells));
    for (mut out, row) in kernel.outer_iter_mut().zip(rows) {
        out.assign(&Array1::from(row));
    }
    kernel
}

fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)])
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}
