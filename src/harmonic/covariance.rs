// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gaussian covariances of decoupled bandpowers.

use std::path::Path;

use fitsio::images::ImageType;
use log::{debug, trace};
use ndarray::prelude::*;

use super::{coupling_kernel, mask_spectrum, CouplingWorkspace, HarmonicError};
use crate::{healpix::lmax_for_nside, io::fits::*};

/// The coupling coefficients `Ξ_ll'` of the squared mask, used by the Gaussian
/// covariance of pseudo-power spectra.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceWorkspace {
    pub(super) coefficients: Array2<f64>,
}

impl CovarianceWorkspace {
    pub fn compute(mask: ArrayView1<f64>, nside: u32) -> Result<CovarianceWorkspace, HarmonicError> {
        let num_ells = lmax_for_nside(nside) + 1;
        debug!("Computing covariance coupling coefficients for {num_ells} multipoles");
        let squared = mask.mapv(|w| w * w);
        let spectrum = mask_spectrum(squared.view(), nside)?;
        Ok(CovarianceWorkspace {
            coefficients: coupling_kernel(spectrum.view(), num_ells),
        })
    }

    pub fn coefficients(&self) -> ArrayView2<f64> {
        self.coefficients.view()
    }

    pub fn num_ells(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn write<P: AsRef<Path>>(&self, file: P, cache_key: &str) -> Result<(), HarmonicError> {
        let file = file.as_ref();
        trace!("Writing covariance workspace {}", file.display());
        let mut fptr = fits_create(file)?;
        let n = self.num_ells();
        let data: Vec<f64> = self.coefficients.iter().copied().collect();
        let hdu = fits_write_image(&mut fptr, "XI", ImageType::Double, &[n, n], &data)?;
        fits_write_key(&mut fptr, &hdu, "CACHEKEY", cache_key)?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(file: P) -> Result<(CovarianceWorkspace, String), HarmonicError> {
        let file = file.as_ref();
        trace!("Reading covariance workspace {}", file.display());
        let mut fptr = fits_open(file)?;
        let hdu = fits_open_hdu(&mut fptr, "XI")?;
        let shape = fits_get_image_shape(&fptr, &hdu)?.to_vec();
        let bad_shape = || HarmonicError::BadWorkspaceShape {
            file: file.to_path_buf(),
            thing: "XI",
            expected: vec![shape.first().copied().unwrap_or(0); 2],
            got: shape.clone(),
        };
        if shape.len() != 2 || shape[0] != shape[1] {
            return Err(bad_shape());
        }
        let cache_key: String = fits_get_required_key(&mut fptr, &hdu, "CACHEKEY")?;
        let data: Vec<f64> = fits_get_image(&mut fptr, &hdu)?;
        let coefficients =
            Array2::from_shape_vec((shape[0], shape[1]), data).map_err(|_| bad_shape())?;
        Ok((CovarianceWorkspace { coefficients }, cache_key))
    }
}

/// The Gaussian covariance between the decoupled bandpowers of the pairs
/// `(a1, a2)` and `(b1, b2)`, and the square root of its diagonal.
///
/// `spectra` are the best guesses of the true spectra of the pairs
/// `[(a1, b1), (a1, b2), (a2, b1), (a2, b2)]`. The unbinned covariance
///
/// `Cov_ll' = [C^a1b1_(l C^a2b2_l') + C^a1b2_(l C^a2b1_l')] Ξ_ll'`,
///
/// with `X_(l Y_l') = (X_l Y_l' + X_l' Y_l) / 2`, is binned and decoupled with
/// `wsp_a` on the left and `wsp_b` on the right.
pub fn gaussian_covariance(
    cov_wsp: &CovarianceWorkspace,
    wsp_a: &CouplingWorkspace,
    wsp_b: &CouplingWorkspace,
    spectra: [ArrayView1<f64>; 4],
) -> Result<(Array2<f64>, Array1<f64>), HarmonicError> {
    let n = cov_wsp.num_ells();
    for wsp in [wsp_a, wsp_b] {
        if wsp.num_ells() != n {
            return Err(HarmonicError::SizeMismatch {
                thing: "the multipoles of a coupling workspace",
                expected: n,
                got: wsp.num_ells(),
            });
        }
    }
    if let Some(cl) = spectra.iter().find(|cl| cl.len() != n) {
        return Err(HarmonicError::SizeMismatch {
            thing: "a guess power spectrum",
            expected: n,
            got: cl.len(),
        });
    }
    let [a1b1, a1b2, a2b1, a2b2] = spectra;

    let symmetrised = |x: ArrayView1<f64>, y: ArrayView1<f64>, l: usize, lp: usize| {
        0.5 * (x[l] * y[lp] + x[lp] * y[l])
    };
    let xi = cov_wsp.coefficients();
    let unbinned = Array2::from_shape_fn((n, n), |(l, lp)| {
        (symmetrised(a1b1, a2b2, l, lp) + symmetrised(a1b2, a2b1, l, lp)) * xi[(l, lp)]
    });

    let left = wsp_a.decoupling_matrix();
    let right = wsp_b.decoupling_matrix();
    let covariance = left.dot(&unbinned).dot(&right.t());
    let err = covariance.diag().mapv(f64::sqrt);
    Ok((covariance, err))
}
