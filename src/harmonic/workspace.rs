// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Binned mode-coupling matrices.

use std::path::Path;

use fitsio::images::ImageType;
use log::{debug, trace};
use ndarray::prelude::*;

use super::{coupling_kernel, from_dmatrix, mask_spectrum, to_dmatrix, HarmonicError};
use crate::{bandpowers::Bandpowers, healpix::lmax_for_nside, io::fits::*};

/// The binned mode-coupling matrix of a mask, and its inverse.
///
/// The binned matrix is `B M Q`, where `B` averages multipoles into
/// bandpowers, `M` is the unbinned mode-coupling matrix and `Q` spreads each
/// bandpower evenly over its multipoles.
#[derive(Debug, Clone)]
pub struct CouplingWorkspace {
    bandpowers: Bandpowers,

    /// The number of multipoles of the unbinned matrix, `lmax + 1`.
    num_ells: usize,

    binned: Array2<f64>,
    inverse: Array2<f64>,
}

impl CouplingWorkspace {
    /// Compute the workspace of a RING-ordered mask.
    pub fn compute(
        mask: ArrayView1<f64>,
        nside: u32,
        bandpowers: &Bandpowers,
    ) -> Result<CouplingWorkspace, HarmonicError> {
        let num_ells = lmax_for_nside(nside) + 1;
        debug!("Computing the mode-coupling matrix for {num_ells} multipoles");
        let spectrum = mask_spectrum(mask, nside)?;
        let mut mcm = coupling_kernel(spectrum.view(), num_ells);
        for (l2, mut column) in mcm.axis_iter_mut(Axis(1)).enumerate() {
            column *= (2 * l2 + 1) as f64;
        }
        CouplingWorkspace::from_coupling_matrix(mcm.view(), bandpowers.clone())
    }

    /// Bin an unbinned `(num_ells, num_ells)` mode-coupling matrix.
    pub fn from_coupling_matrix(
        mcm: ArrayView2<f64>,
        bandpowers: Bandpowers,
    ) -> Result<CouplingWorkspace, HarmonicError> {
        let num_ells = mcm.nrows();
        if mcm.ncols() != num_ells {
            return Err(HarmonicError::SizeMismatch {
                thing: "the columns of the mode-coupling matrix",
                expected: num_ells,
                got: mcm.ncols(),
            });
        }
        let last_edge = bandpowers.edges()[bandpowers.num_bins()];
        if last_edge > num_ells {
            return Err(HarmonicError::SizeMismatch {
                thing: "the multipoles covered by the bandpowers",
                expected: num_ells,
                got: last_edge,
            });
        }

        let binning = bandpowers.binning_matrix(num_ells);
        let mut unbinning = Array2::zeros((num_ells, bandpowers.num_bins()));
        for (i, range) in bandpowers.ranges().enumerate() {
            unbinning.slice_mut(s![range, i]).fill(1.0);
        }
        let binned = binning.dot(&mcm).dot(&unbinning);
        CouplingWorkspace::from_binned(binned, bandpowers, num_ells)
    }

    fn from_binned(
        binned: Array2<f64>,
        bandpowers: Bandpowers,
        num_ells: usize,
    ) -> Result<CouplingWorkspace, HarmonicError> {
        let inverse = to_dmatrix(binned.view())
            .lu()
            .try_inverse()
            .ok_or(HarmonicError::SingularCouplingMatrix)?;
        Ok(CouplingWorkspace {
            bandpowers,
            num_ells,
            binned,
            inverse: from_dmatrix(&inverse),
        })
    }

    pub fn bandpowers(&self) -> &Bandpowers {
        &self.bandpowers
    }

    pub fn num_ells(&self) -> usize {
        self.num_ells
    }

    pub fn binned(&self) -> ArrayView2<f64> {
        self.binned.view()
    }

    pub fn inverse(&self) -> ArrayView2<f64> {
        self.inverse.view()
    }

    /// Bin and decouple a coupled pseudo-power spectrum.
    pub fn decouple(&self, cl: ArrayView1<f64>) -> Result<Array1<f64>, HarmonicError> {
        if cl.len() != self.num_ells {
            return Err(HarmonicError::SizeMismatch {
                thing: "a coupled power spectrum",
                expected: self.num_ells,
                got: cl.len(),
            });
        }
        Ok(self.inverse.dot(&self.bandpowers.bin_spectrum(cl)))
    }

    /// `M_b^-1 B`; the linear map from a coupled spectrum to decoupled
    /// bandpowers.
    pub(crate) fn decoupling_matrix(&self) -> Array2<f64> {
        self.inverse.dot(&self.bandpowers.binning_matrix(self.num_ells))
    }

    /// Write the workspace to a FITS file, tagged with `cache_key`. Only the
    /// binned matrix is stored; the inverse is recomputed when read.
    pub fn write<P: AsRef<Path>>(&self, file: P, cache_key: &str) -> Result<(), HarmonicError> {
        let file = file.as_ref();
        trace!("Writing coupling workspace {}", file.display());
        let mut fptr = fits_create(file)?;
        let nb = self.bandpowers.num_bins();
        let data: Vec<f64> = self.binned.iter().copied().collect();
        let hdu = fits_write_image(&mut fptr, "MCM", ImageType::Double, &[nb, nb], &data)?;
        fits_write_key(&mut fptr, &hdu, "CACHEKEY", cache_key)?;
        fits_write_key(&mut fptr, &hdu, "NELLS", self.num_ells as i64)?;

        let edges: Vec<i64> = self.bandpowers.edges().iter().map(|&e| e as i64).collect();
        fits_write_image(
            &mut fptr,
            "EDGES",
            ImageType::LongLong,
            &[edges.len()],
            &edges,
        )?;
        Ok(())
    }

    /// Read a workspace written by [`CouplingWorkspace::write`], along with its
    /// cache key.
    pub fn read<P: AsRef<Path>>(file: P) -> Result<(CouplingWorkspace, String), HarmonicError> {
        let file = file.as_ref();
        trace!("Reading coupling workspace {}", file.display());
        let mut fptr = fits_open(file)?;

        let edges_hdu = fits_open_hdu(&mut fptr, "EDGES")?;
        let edges: Vec<i64> = fits_get_image(&mut fptr, &edges_hdu)?;
        let bandpowers = Bandpowers::from_edges(edges.into_iter().map(|e| e as usize).collect())?;
        let nb = bandpowers.num_bins();

        let hdu = fits_open_hdu(&mut fptr, "MCM")?;
        let shape = fits_get_image_shape(&fptr, &hdu)?.to_vec();
        if shape != [nb, nb] {
            return Err(HarmonicError::BadWorkspaceShape {
                file: file.to_path_buf(),
                thing: "MCM",
                expected: vec![nb, nb],
                got: shape,
            });
        }
        let cache_key: String = fits_get_required_key(&mut fptr, &hdu, "CACHEKEY")?;
        let num_ells: usize = fits_get_required_key(&mut fptr, &hdu, "NELLS")?;
        let data: Vec<f64> = fits_get_image(&mut fptr, &hdu)?;
        let binned = Array2::from_shape_vec((nb, nb), data).map_err(|_| {
            HarmonicError::BadWorkspaceShape {
                file: file.to_path_buf(),
                thing: "MCM",
                expected: vec![nb, nb],
                got: shape.clone(),
            }
        })?;

        let workspace = CouplingWorkspace::from_binned(binned, bandpowers, num_ells)?;
        Ok((workspace, cache_key))
    }
}
