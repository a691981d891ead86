// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading and writing HealSparse-style sparse HEALPix maps.
//!
//! A sparse map file has three HDUs:
//!
//! 1. an empty primary HDU;
//! 2. `COV`, a 64-bit integer image with one entry per pixel of a coarse
//!    "coverage" map (header keys `NSIDECOV` and `NSIDE`). For a NEST pixel `p`
//!    at the fine resolution, the position of its value in the sparse array is
//!    `cov[p / n_fine] + p`, where `n_fine = (nside / nside_cov)^2`;
//! 3. `SPARSE`, either a double-precision image (a single band) or a binary
//!    table with one double-precision column per band (header keys `NSIDE` and
//!    `SENTINEL`).
//!
//! The first `n_fine` entries of the sparse array are the "sentinel block";
//! every uncovered coverage pixel points at it. All fine pixels are in NEST
//! order.

mod error;
#[cfg(test)]
mod tests;

pub use error::SparseMapError;

use std::path::Path;

use fitsio::{
    hdu::HduInfo,
    images::ImageType,
    tables::{ColumnDataType, ColumnDescription},
};
use log::{debug, trace};
use ndarray::prelude::*;

use crate::{
    constants::UNSEEN,
    healpix::{check_nside, nest2ring_table, nside2npix},
    io::fits::*,
};

/// A sparse map held in memory in its on-disk layout.
#[derive(Debug, Clone)]
pub struct SparseMap {
    nside: u32,
    nside_coverage: u32,
    sentinel: f64,

    /// The names of the bands. If this is empty, the map has a single unnamed
    /// band stored as an image.
    band_names: Vec<String>,

    /// The coverage index; one entry per coverage pixel.
    cov_index: Vec<i64>,

    /// One sparse array per band, all the same length.
    sparse: Vec<Vec<f64>>,
}

impl SparseMap {
    /// Read a sparse map from a FITS file.
    pub fn read<P: AsRef<Path>>(file: P) -> Result<SparseMap, SparseMapError> {
        let file = file.as_ref();
        if !file.exists() {
            return Err(SparseMapError::DoesNotExist(file.to_path_buf()));
        }
        debug!("Reading sparse map {}", file.display());
        let mut fptr = fits_open(file)?;

        let cov_hdu = fits_open_hdu(&mut fptr, "COV")?;
        let nside_coverage: u32 = fits_get_required_key(&mut fptr, &cov_hdu, "NSIDECOV")?;
        let cov_index: Vec<i64> = fits_get_image(&mut fptr, &cov_hdu)?;

        let sparse_hdu = fits_open_hdu(&mut fptr, "SPARSE")?;
        let nside: u32 = fits_get_required_key(&mut fptr, &sparse_hdu, "NSIDE")?;
        let sentinel: f64 =
            fits_get_optional_key(&mut fptr, &sparse_hdu, "SENTINEL")?.unwrap_or(UNSEEN);
        check_nside(nside)?;
        check_nside(nside_coverage)?;
        if nside_coverage > nside {
            return Err(SparseMapError::BadCoverageNside {
                file: file.to_path_buf(),
                nside,
                nside_coverage,
            });
        }

        let (band_names, sparse) = if matches!(sparse_hdu.info, HduInfo::ImageInfo { .. }) {
            (vec![], vec![fits_get_image::<Vec<f64>>(&mut fptr, &sparse_hdu)?])
        } else {
            let names = fits_get_col_names(&fptr, &sparse_hdu)?;
            let mut sparse = Vec::with_capacity(names.len());
            for name in &names {
                sparse.push(fits_get_col::<f64>(&mut fptr, &sparse_hdu, name)?);
            }
            (names, sparse)
        };
        trace!(
            "nside {nside}, coverage nside {nside_coverage}, {} band(s)",
            sparse.len()
        );

        let map = SparseMap {
            nside,
            nside_coverage,
            sentinel,
            band_names,
            cov_index,
            sparse,
        };
        map.validate(file)?;
        Ok(map)
    }

    /// The number of bands in a sparse map file, from the layout of its
    /// `SPARSE` HDU; no data are read.
    pub fn count_bands<P: AsRef<Path>>(file: P) -> Result<usize, SparseMapError> {
        let file = file.as_ref();
        if !file.exists() {
            return Err(SparseMapError::DoesNotExist(file.to_path_buf()));
        }
        let mut fptr = fits_open(file)?;
        let sparse_hdu = fits_open_hdu(&mut fptr, "SPARSE")?;
        if matches!(sparse_hdu.info, HduInfo::ImageInfo { .. }) {
            Ok(1)
        } else {
            Ok(fits_get_col_names(&fptr, &sparse_hdu)?.len())
        }
    }

    fn validate(&self, file: &Path) -> Result<(), SparseMapError> {
        let expected_cov = nside2npix(self.nside_coverage);
        if self.cov_index.len() != expected_cov {
            return Err(SparseMapError::BadShape {
                file: file.to_path_buf(),
                thing: "the coverage index",
                expected: expected_cov,
                actual: self.cov_index.len(),
            });
        }

        let n_fine = self.num_fine_per_coverage();
        let sparse_len = self.sparse.first().map(|s| s.len()).unwrap_or(0);
        if sparse_len < n_fine || sparse_len % n_fine != 0 {
            return Err(SparseMapError::BadShape {
                file: file.to_path_buf(),
                thing: "the sparse array",
                expected: n_fine * (sparse_len / n_fine).max(1),
                actual: sparse_len,
            });
        }
        if let Some(band) = self.sparse.iter().find(|s| s.len() != sparse_len) {
            return Err(SparseMapError::BadShape {
                file: file.to_path_buf(),
                thing: "a sparse band",
                expected: sparse_len,
                actual: band.len(),
            });
        }
        for (coverage_pixel, &offset) in self.cov_index.iter().enumerate() {
            let start = offset + (coverage_pixel * n_fine) as i64;
            if start < 0 || start as usize + n_fine > sparse_len {
                return Err(SparseMapError::BadCoverageIndex {
                    file: file.to_path_buf(),
                    coverage_pixel,
                });
            }
        }
        Ok(())
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn nside_coverage(&self) -> u32 {
        self.nside_coverage
    }

    pub fn num_bands(&self) -> usize {
        self.sparse.len()
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// The number of fine pixels inside a single coverage pixel.
    fn num_fine_per_coverage(&self) -> usize {
        let ratio = (self.nside / self.nside_coverage) as usize;
        ratio * ratio
    }

    /// Expand a band into a dense RING-ordered map. Pixels without data (the
    /// sentinel block, or values equal to the sentinel) are set to `fill`.
    pub fn to_dense_ring(&self, band: usize, fill: f64) -> Result<Array1<f64>, SparseMapError> {
        let sparse = self
            .sparse
            .get(band)
            .ok_or(SparseMapError::BandOutOfRange {
                band,
                num_bands: self.num_bands(),
            })?;
        let nest2ring = nest2ring_table(self.nside)?;
        let n_fine = self.num_fine_per_coverage();

        let mut dense = Array1::from_elem(nside2npix(self.nside), fill);
        for (coverage_pixel, &offset) in self.cov_index.iter().enumerate() {
            let first_nest = coverage_pixel * n_fine;
            let start = (offset + first_nest as i64) as usize;
            // Uncovered pixels point at the sentinel block.
            if start == 0 {
                continue;
            }
            for (i, &value) in sparse[start..start + n_fine].iter().enumerate() {
                if value != self.sentinel {
                    dense[nest2ring[first_nest + i]] = value;
                }
            }
        }
        Ok(dense)
    }

    /// Build a sparse map from dense RING-ordered maps. A fine pixel has data if
    /// any band differs from [`UNSEEN`] there. If `band_names` is empty, there
    /// must be exactly one band, and it is stored as an image.
    pub fn from_dense_ring(
        nside: u32,
        nside_coverage: u32,
        bands: &[ArrayView1<f64>],
        band_names: &[String],
    ) -> Result<SparseMap, SparseMapError> {
        check_nside(nside)?;
        check_nside(nside_coverage)?;
        let nside_coverage = nside_coverage.min(nside);
        if bands.is_empty() || (band_names.is_empty() && bands.len() != 1) {
            return Err(SparseMapError::NoBands);
        }
        let npix = nside2npix(nside);
        for (band, b) in bands.iter().enumerate() {
            if b.len() != npix {
                return Err(SparseMapError::DenseSize {
                    band,
                    nside,
                    expected: npix,
                    actual: b.len(),
                });
            }
        }

        let nest2ring = nest2ring_table(nside)?;
        let ratio = (nside / nside_coverage) as usize;
        let n_fine = ratio * ratio;
        let num_coverage = nside2npix(nside_coverage);

        let has_data = |nest: usize| bands.iter().any(|b| b[nest2ring[nest]] != UNSEEN);

        // Block 0 is the sentinel block.
        let mut sparse: Vec<Vec<f64>> = vec![vec![UNSEEN; n_fine]; bands.len()];
        let mut cov_index = Vec::with_capacity(num_coverage);
        let mut next_block = 1;
        for coverage_pixel in 0..num_coverage {
            let first_nest = coverage_pixel * n_fine;
            let covered = (first_nest..first_nest + n_fine).any(|nest| has_data(nest));
            let block = if covered {
                for (s, b) in sparse.iter_mut().zip(bands) {
                    s.extend((first_nest..first_nest + n_fine).map(|nest| b[nest2ring[nest]]));
                }
                next_block += 1;
                next_block - 1
            } else {
                0
            };
            cov_index.push((block * n_fine) as i64 - first_nest as i64);
        }

        Ok(SparseMap {
            nside,
            nside_coverage,
            sentinel: UNSEEN,
            band_names: band_names.to_vec(),
            cov_index,
            sparse,
        })
    }

    /// Write this map to a FITS file, replacing anything already there.
    pub fn write<P: AsRef<Path>>(&self, file: P) -> Result<(), SparseMapError> {
        let file = file.as_ref();
        debug!("Writing sparse map {}", file.display());
        let mut fptr = fits_create(file)?;

        let cov_hdu = fits_write_image(
            &mut fptr,
            "COV",
            ImageType::LongLong,
            &[self.cov_index.len()],
            &self.cov_index,
        )?;
        fits_write_key(&mut fptr, &cov_hdu, "NSIDECOV", self.nside_coverage as i64)?;
        fits_write_key(&mut fptr, &cov_hdu, "NSIDE", self.nside as i64)?;

        let sparse_hdu = if self.band_names.is_empty() {
            fits_write_image(
                &mut fptr,
                "SPARSE",
                ImageType::Double,
                &[self.sparse[0].len()],
                &self.sparse[0],
            )?
        } else {
            let mut columns = Vec::with_capacity(self.band_names.len());
            for name in &self.band_names {
                columns.push(
                    ColumnDescription::new(name)
                        .with_type(ColumnDataType::Double)
                        .create()?,
                );
            }
            let hdu = fptr.create_table("SPARSE", &columns)?;
            for (name, values) in self.band_names.iter().zip(&self.sparse) {
                hdu.write_col(&mut fptr, name, values)?;
            }
            hdu
        };
        fits_write_key(&mut fptr, &sparse_hdu, "NSIDE", self.nside as i64)?;
        fits_write_key(&mut fptr, &sparse_hdu, "SENTINEL", self.sentinel)?;
        Ok(())
    }
}
