// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Power-spectrum result files.
//!
//! Each bin pairing gets its own FITS file with one named image HDU per
//! dataset. A result never copies theory predictions; if the field's theory
//! file has the pairing, the primary header links to it instead (keys
//! `THEORYF`, `THEORYE` and `THEORYC`) and [`PowerSpectrumResult::read_theory`]
//! follows the link.
//!
//! Result files are written to a hidden sibling first and then renamed into
//! place, so an interrupted run never leaves a partial result behind.

mod error;
#[cfg(test)]
mod tests;

pub use error::ResultsError;

use std::path::{Path, PathBuf};

use fitsio::{images::ImageType, FitsFile};
use log::{debug, trace, warn};
use ndarray::prelude::*;

use crate::io::fits::*;

/// Where the theory prediction of a pairing lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TheoryLink {
    pub file: PathBuf,

    /// The HDU holding the multipoles of the prediction.
    pub ells_hdu: String,

    /// The HDU holding the prediction itself; named after the pairing label.
    pub cl_hdu: String,
}

/// Everything computed for a single bin pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrumResult {
    pub ell_effs: Array1<f64>,

    pub cl_coupled: Array1<f64>,
    pub cl_decoupled: Array1<f64>,
    pub cl_guess: Array1<f64>,

    pub cl_coupled_no_deproj: Array1<f64>,
    pub cl_decoupled_no_deproj: Array1<f64>,
    pub cl_guess_no_deproj: Array1<f64>,

    /// Shot noise; zeros for cross-bin pairings.
    pub n_ell_coupled: Array1<f64>,
    pub n_ell_decoupled: Array1<f64>,

    pub covar: Array2<f64>,
    pub err_cell: Array1<f64>,
    pub covar_no_deproj: Array2<f64>,
    pub err_cell_no_deproj: Array1<f64>,

    /// The coupled deprojection bias; zeros without templates.
    pub cl_bias: Array1<f64>,
    pub cl_bias_decoupled: Array1<f64>,
    pub cl_decoupled_debiased: Array1<f64>,

    pub theory: Option<TheoryLink>,
}

impl PowerSpectrumResult {
    fn spectra(&self) -> [(&'static str, &Array1<f64>); 14] {
        [
            ("ell_effs", &self.ell_effs),
            ("cl_coupled", &self.cl_coupled),
            ("cl_decoupled", &self.cl_decoupled),
            ("cl_guess", &self.cl_guess),
            ("cl_coupled_no_deproj", &self.cl_coupled_no_deproj),
            ("cl_decoupled_no_deproj", &self.cl_decoupled_no_deproj),
            ("cl_guess_no_deproj", &self.cl_guess_no_deproj),
            ("N_ell_coupled", &self.n_ell_coupled),
            ("N_ell_decoupled", &self.n_ell_decoupled),
            ("err_cell", &self.err_cell),
            ("err_cell_no_deproj", &self.err_cell_no_deproj),
            ("cl_bias", &self.cl_bias),
            ("cl_bias_decoupled", &self.cl_bias_decoupled),
            ("cl_decoupled_debiased", &self.cl_decoupled_debiased),
        ]
    }

    /// Write the result to `file`, replacing anything already there.
    pub fn write<P: AsRef<Path>>(&self, file: P) -> Result<(), ResultsError> {
        let file = file.as_ref();
        debug!("Writing power spectra to {}", file.display());
        write_atomically(file, |fptr| {
            if let Some(link) = &self.theory {
                let hdu = fits_open_hdu(fptr, 0_usize)?;
                fits_write_key_long_string(
                    fptr,
                    &hdu,
                    "THEORYF",
                    &link.file.display().to_string(),
                    Some("Linked theory file"),
                )?;
                fits_write_key(fptr, &hdu, "THEORYE", link.ells_hdu.as_str())?;
                fits_write_key(fptr, &hdu, "THEORYC", link.cl_hdu.as_str())?;
            }

            for (name, data) in self.spectra() {
                write_array1(fptr, name, data.view())?;
            }
            write_array2(fptr, "covar", self.covar.view())?;
            write_array2(fptr, "covar_no_deproj", self.covar_no_deproj.view())?;
            Ok(())
        })
    }

    pub fn read<P: AsRef<Path>>(file: P) -> Result<PowerSpectrumResult, ResultsError> {
        let file = file.as_ref();
        trace!("Reading power spectra from {}", file.display());
        if !file.exists() {
            return Err(ResultsError::DoesNotExist(file.to_path_buf()));
        }
        let mut fptr = fits_open(file)?;

        let hdu = fits_open_hdu(&mut fptr, 0_usize)?;
        let theory = match fits_get_optional_key_long_string(&mut fptr, &hdu, "THEORYF")? {
            Some(theory_file) => Some(TheoryLink {
                file: PathBuf::from(theory_file),
                ells_hdu: fits_get_required_key(&mut fptr, &hdu, "THEORYE")?,
                cl_hdu: fits_get_required_key(&mut fptr, &hdu, "THEORYC")?,
            }),
            None => None,
        };

        let mut read1 = |name: &str| read_array1(&mut fptr, file, name);
        Ok(PowerSpectrumResult {
            ell_effs: read1("ell_effs")?,
            cl_coupled: read1("cl_coupled")?,
            cl_decoupled: read1("cl_decoupled")?,
            cl_guess: read1("cl_guess")?,
            cl_coupled_no_deproj: read1("cl_coupled_no_deproj")?,
            cl_decoupled_no_deproj: read1("cl_decoupled_no_deproj")?,
            cl_guess_no_deproj: read1("cl_guess_no_deproj")?,
            n_ell_coupled: read1("N_ell_coupled")?,
            n_ell_decoupled: read1("N_ell_decoupled")?,
            err_cell: read1("err_cell")?,
            err_cell_no_deproj: read1("err_cell_no_deproj")?,
            cl_bias: read1("cl_bias")?,
            cl_bias_decoupled: read1("cl_bias_decoupled")?,
            cl_decoupled_debiased: read1("cl_decoupled_debiased")?,
            covar: read_array2(&mut fptr, file, "covar")?,
            covar_no_deproj: read_array2(&mut fptr, file, "covar_no_deproj")?,
            theory,
        })
    }

    /// Follow the theory link, if there is one, returning the multipoles and
    /// the predicted spectrum.
    pub fn read_theory(&self) -> Result<Option<(Array1<f64>, Array1<f64>)>, ResultsError> {
        let link = match &self.theory {
            Some(l) => l,
            None => return Ok(None),
        };
        let mut fptr = fits_open(&link.file)?;
        let mut read = |name: &str| -> Result<Array1<f64>, ResultsError> {
            match fits_open_optional_hdu(&mut fptr, name)? {
                Some(hdu) => Ok(Array1::from(fits_get_image::<Vec<f64>>(&mut fptr, &hdu)?)),
                None => Err(ResultsError::BrokenTheoryLink {
                    theory: link.file.clone(),
                    hdu: name.to_string(),
                }),
            }
        };
        let ells = read(&link.ells_hdu)?;
        let cl = read(&link.cl_hdu)?;
        Ok(Some((ells, cl)))
    }
}

/// Check whether `theory_file` has a prediction for the pairing `label`.
pub fn find_theory_link(
    theory_file: &Path,
    label: &str,
) -> Result<Option<TheoryLink>, ResultsError> {
    if !theory_file.exists() {
        trace!("No theory file at {}", theory_file.display());
        return Ok(None);
    }
    let mut fptr = fits_open(theory_file)?;
    let has_ells = fits_open_optional_hdu(&mut fptr, "ells")?.is_some();
    let has_cl = fits_open_optional_hdu(&mut fptr, label)?.is_some();
    if has_ells && has_cl {
        Ok(Some(TheoryLink {
            file: theory_file.to_path_buf(),
            ells_hdu: "ells".to_string(),
            cl_hdu: label.to_string(),
        }))
    } else {
        warn!(
            "Theory file {} has no prediction for pairing {label}",
            theory_file.display()
        );
        Ok(None)
    }
}

/// A bandpower covariance between two pairings.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceBlock {
    pub label_a: String,
    pub label_b: String,
    pub covar: Array2<f64>,
    pub covar_no_deproj: Array2<f64>,
}

/// Write all of a field's covariance blocks into one file. Block `(a, b)`
/// lives in HDUs `{a}{b}` and `{a}{b}_no_deproj`.
pub fn write_covariances<P: AsRef<Path>>(
    file: P,
    blocks: &[CovarianceBlock],
) -> Result<(), ResultsError> {
    let file = file.as_ref();
    debug!(
        "Writing {} covariance blocks to {}",
        blocks.len(),
        file.display()
    );
    write_atomically(file, |fptr| {
        for block in blocks {
            let name = format!("{}{}", block.label_a, block.label_b);
            write_array2(fptr, &name, block.covar.view())?;
            write_array2(
                fptr,
                &format!("{name}_no_deproj"),
                block.covar_no_deproj.view(),
            )?;
        }
        Ok(())
    })
}

/// Read the covariance between pairings `label_a` and `label_b`, if the file
/// has it.
pub fn read_covariance<P: AsRef<Path>>(
    file: P,
    label_a: &str,
    label_b: &str,
) -> Result<Option<CovarianceBlock>, ResultsError> {
    let file = file.as_ref();
    if !file.exists() {
        return Err(ResultsError::DoesNotExist(file.to_path_buf()));
    }
    let mut fptr = fits_open(file)?;
    let name = format!("{label_a}{label_b}");
    if fits_open_optional_hdu(&mut fptr, &name)?.is_none() {
        return Ok(None);
    }
    Ok(Some(CovarianceBlock {
        label_a: label_a.to_string(),
        label_b: label_b.to_string(),
        covar: read_array2(&mut fptr, file, &name)?,
        covar_no_deproj: read_array2(&mut fptr, file, &format!("{name}_no_deproj"))?,
    }))
}

/// Run `write` against a temporary sibling of `file`, then move it into
/// place. The temporary file is removed if anything fails.
fn write_atomically<F>(file: &Path, write: F) -> Result<(), ResultsError>
where
    F: FnOnce(&mut FitsFile) -> Result<(), ResultsError>,
{
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = file.with_file_name(format!(".tmp_{file_name}"));

    let result = fits_create(&tmp)
        .map_err(ResultsError::from)
        .and_then(|mut fptr| write(&mut fptr));
    // The FITS file is closed once `fptr` is dropped above.
    let result = result.and_then(|()| {
        std::fs::rename(&tmp, file).map_err(|err| ResultsError::Rename {
            from: tmp.clone(),
            to: file.to_path_buf(),
            err,
        })
    });
    if result.is_err() && tmp.exists() {
        if let Err(e) = std::fs::remove_file(&tmp) {
            warn!("Couldn't remove {}: {e}", tmp.display());
        }
    }
    result
}

fn write_array1(
    fptr: &mut FitsFile,
    name: &str,
    data: ArrayView1<f64>,
) -> Result<(), ResultsError> {
    let data: Vec<f64> = data.iter().copied().collect();
    fits_write_image(fptr, name, ImageType::Double, &[data.len()], &data)?;
    Ok(())
}

fn write_array2(
    fptr: &mut FitsFile,
    name: &str,
    data: ArrayView2<f64>,
) -> Result<(), ResultsError> {
    let shape = [data.nrows(), data.ncols()];
    let data: Vec<f64> = data.iter().copied().collect();
    fits_write_image(fptr, name, ImageType::Double, &shape, &data)?;
    Ok(())
}

fn read_array1(
    fptr: &mut FitsFile,
    file: &Path,
    name: &str,
) -> Result<Array1<f64>, ResultsError> {
    let hdu = fits_open_hdu(fptr, name)?;
    let shape = fits_get_image_shape(fptr, &hdu)?.to_vec();
    if shape.len() != 1 {
        return Err(ResultsError::BadShape {
            file: file.to_path_buf(),
            name: name.to_string(),
            expected: 1,
            got: shape,
        });
    }
    let data: Vec<f64> = fits_get_image(fptr, &hdu)?;
    Ok(Array1::from(data))
}

fn read_array2(
    fptr: &mut FitsFile,
    file: &Path,
    name: &str,
) -> Result<Array2<f64>, ResultsError> {
    let hdu = fits_open_hdu(fptr, name)?;
    let shape = fits_get_image_shape(fptr, &hdu)?.to_vec();
    let bad_shape = || ResultsError::BadShape {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected: 2,
        got: shape.clone(),
    };
    if shape.len() != 2 {
        return Err(bad_shape());
    }
    let data: Vec<f64> = fits_get_image(fptr, &hdu)?;
    Array2::from_shape_vec((shape[0], shape[1]), data).map_err(|_| bad_shape())
}
