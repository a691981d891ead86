// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use tempfile::tempdir;

use super::*;

fn make_result(num_bins: usize, num_ells: usize) -> PowerSpectrumResult {
    let ramp = |n: usize, scale: f64| Array1::from_shape_fn(n, |i| scale * (i as f64 + 1.0));
    let covar = Array2::from_shape_fn((num_bins, num_bins), |(i, j)| {
        if i == j {
            1e-10 * (i + 1) as f64
        } else {
            1e-12
        }
    });
    PowerSpectrumResult {
        ell_effs: ramp(num_bins, 10.5),
        cl_coupled: ramp(num_ells, 1e-6),
        cl_decoupled: ramp(num_bins, 2e-6),
        cl_guess: ramp(num_ells, 1.5e-6),
        cl_coupled_no_deproj: ramp(num_ells, 1.1e-6),
        cl_decoupled_no_deproj: ramp(num_bins, 2.1e-6),
        cl_guess_no_deproj: ramp(num_ells, 1.6e-6),
        n_ell_coupled: Array1::from_elem(num_ells, 3e-7),
        n_ell_decoupled: Array1::from_elem(num_bins, 3e-7),
        err_cell: covar.diag().mapv(f64::sqrt),
        err_cell_no_deproj: covar.diag().mapv(f64::sqrt),
        covar: covar.clone(),
        covar_no_deproj: covar * 0.9,
        cl_bias: Array1::zeros(num_ells),
        cl_bias_decoupled: Array1::zeros(num_bins),
        cl_decoupled_debiased: ramp(num_bins, 2e-6),
        theory: None,
    }
}

fn write_theory(file: &Path, labels: &[&str]) {
    let mut fptr = fits_create(file).unwrap();
    let ells: Vec<f64> = (0..20).map(|l| l as f64).collect();
    fits_write_image(&mut fptr, "ells", ImageType::Double, &[20], &ells).unwrap();
    for label in labels {
        let cl: Vec<f64> = ells.iter().map(|l| 1e-5 / (l + 10.0)).collect();
        fits_write_image(&mut fptr, label, ImageType::Double, &[20], &cl).unwrap();
    }
}

#[test]
fn test_result_round_trip() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("power_spectra_info_0_0.fits");
    let result = make_result(4, 24);
    result.write(&file).unwrap();

    let read = PowerSpectrumResult::read(&file).unwrap();
    assert_eq!(read, result);
    assert!(read.read_theory().unwrap().is_none());

    // Nothing else is left in the directory.
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![file.file_name().unwrap().to_os_string()]);
}

#[test]
fn test_overwrite() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("result.fits");
    make_result(3, 12).write(&file).unwrap();
    let result = make_result(5, 30);
    result.write(&file).unwrap();
    assert_eq!(PowerSpectrumResult::read(&file).unwrap(), result);
}

#[test]
fn test_failed_write_leaves_nothing() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("missing_dir").join("result.fits");
    assert!(make_result(3, 12).write(&file).is_err());
    assert!(!file.exists());
    assert!(!dir.path().join("missing_dir").exists());

    assert!(matches!(
        PowerSpectrumResult::read(&file),
        Err(ResultsError::DoesNotExist(_))
    ));
}

#[test]
fn test_theory_link() {
    let dir = tempdir().unwrap();
    let theory_file = dir.path().join("theory_cells.fits");
    assert_eq!(find_theory_link(&theory_file, "(0,0)").unwrap(), None);

    write_theory(&theory_file, &["(0,0)", "(0,1)"]);
    assert_eq!(find_theory_link(&theory_file, "(1,1)").unwrap(), None);
    let link = find_theory_link(&theory_file, "(0,1)").unwrap().unwrap();
    assert_eq!(link.ells_hdu, "ells");
    assert_eq!(link.cl_hdu, "(0,1)");

    let mut result = make_result(4, 24);
    result.theory = Some(link.clone());
    let file = dir.path().join("result_0_1.fits");
    result.write(&file).unwrap();

    let read = PowerSpectrumResult::read(&file).unwrap();
    assert_eq!(read.theory.as_ref(), Some(&link));
    let (ells, cl) = read.read_theory().unwrap().unwrap();
    assert_eq!(ells.len(), 20);
    assert_abs_diff_eq!(ells[7], 7.0);
    assert_abs_diff_eq!(cl[0], 1e-6, epsilon = 1e-20);

    // Replacing the theory file without the pairing breaks the link.
    write_theory(&theory_file, &["(0,0)"]);
    assert!(matches!(
        read.read_theory(),
        Err(ResultsError::BrokenTheoryLink { .. })
    ));
}

#[test]
fn test_covariance_blocks() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("covariance_matrices.fits");
    let block = |a: &str, b: &str, scale: f64| CovarianceBlock {
        label_a: a.to_string(),
        label_b: b.to_string(),
        covar: Array2::from_shape_fn((3, 3), |(i, j)| scale * (i + 2 * j) as f64),
        covar_no_deproj: Array2::from_elem((3, 3), scale),
    };
    let blocks = vec![
        block("(0,0)", "(0,0)", 1.0),
        block("(0,0)", "(0,1)", 2.0),
        block("(0,1)", "(0,1)", 3.0),
    ];
    write_covariances(&file, &blocks).unwrap();

    for b in &blocks {
        let read = read_covariance(&file, &b.label_a, &b.label_b).unwrap();
        assert_eq!(read.as_ref(), Some(b));
    }
    assert_eq!(read_covariance(&file, "(0,1)", "(0,0)").unwrap(), None);
}
