// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs::read_to_string;

use tempfile::TempDir;

use gcells::results::PowerSpectrumResult;

use crate::{get_cmd_output, get_simple_field, gcells, FIELD, NSIDE};

#[test]
fn test_power_spectra_end_to_end() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());

    let cmd = gcells()
        .args(["power-spectra", &files.config.display().to_string()])
        .ok();
    let ok = cmd.is_ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(ok, "{stdout}\n{stderr}");
    for (i, j) in [(0, 0), (0, 1), (1, 1)] {
        let file = files.result(i, j);
        assert!(file.exists(), "{} is missing\n{stdout}", file.display());
        let result = PowerSpectrumResult::read(&file).unwrap();
        assert_eq!(result.ell_effs.len(), 4);
        // The only template is all zeros.
        assert!(result.cl_bias.iter().all(|&b| b == 0.0));
        assert!(result.cl_bias_decoupled.iter().all(|&b| b == 0.0));
        assert_eq!(result.cl_decoupled, result.cl_decoupled_debiased);
        assert_eq!(result.cl_decoupled, result.cl_decoupled_no_deproj);
        assert!(result.covar.diag().iter().all(|&c| c > 0.0));
        assert!(result.err_cell.iter().all(|&e| e > 0.0));
        assert_eq!(
            result.n_ell_coupled.iter().any(|&n| n != 0.0),
            i == j,
            "({i},{j})"
        );
    }

    let cache = files.field_dir.join("cache");
    for file in [
        format!("workspace_nside{NSIDE}.fits"),
        format!("covworkspace_nside{NSIDE}.fits"),
        format!("deprojected_nside{NSIDE}_0_1.txt"),
        format!("deprojection_alphas_nside{NSIDE}_bin0.txt"),
    ] {
        assert!(cache.join(&file).exists(), "{file} is missing");
    }
    let alphas =
        read_to_string(cache.join(format!("deprojection_alphas_nside{NSIDE}_bin1.txt"))).unwrap();
    assert_eq!(alphas.split_whitespace().next(), Some("zeros_16.hsp"));

    // A second run reuses the cache and gives the same numbers.
    let first = PowerSpectrumResult::read(files.result(0, 1)).unwrap();
    let cmd = gcells()
        .args(["power-spectra", &files.config.display().to_string(), "(1,0)"])
        .ok();
    let (stdout, _) = get_cmd_output(cmd);
    assert!(
        stdout.contains("Using the cached mode-coupling matrix"),
        "{stdout}"
    );
    assert_eq!(PowerSpectrumResult::read(files.result(0, 1)).unwrap(), first);
}

#[test]
fn test_dry_run_writes_nothing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());

    let cmd = gcells()
        .args([
            "power-spectra",
            &files.config.display().to_string(),
            "--dry-run",
        ])
        .ok();
    let ok = cmd.is_ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(ok, "{stdout}\n{stderr}");
    assert!(stdout.contains(&format!("Power spectra of {FIELD}")), "{stdout}");
    assert!(stdout.contains("zeros_16.hsp"), "{stdout}");
    assert!(!files.field_dir.join("cache").exists());
    assert!(!files.result(0, 0).exists());
}

#[test]
fn test_pairing_out_of_range() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());

    let cmd = gcells()
        .args(["power-spectra", &files.config.display().to_string(), "(0,2)"])
        .ok();
    assert!(cmd.is_err());
    let (stdout, stderr) = get_cmd_output(cmd);
    let output = stdout + &stderr;
    assert!(output.contains("only 2 tomographic bins"), "{output}");
}

#[test]
fn test_bad_config() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());
    let config = read_to_string(&files.config).unwrap();
    std::fs::write(&files.config, config + "  sparkle: true\n").unwrap();

    let cmd = gcells()
        .args(["power-spectra", &files.config.display().to_string()])
        .ok();
    assert!(cmd.is_err());
    let (stdout, stderr) = get_cmd_output(cmd);
    let output = stdout + &stderr;
    assert!(output.contains("sparkle"), "{output}");
    assert!(!files.result(0, 0).exists());
}

#[test]
fn test_missing_config() {
    let cmd = gcells().args(["power-spectra", "/does/not/exist.yml"]).ok();
    assert!(cmd.is_err());
    let output = cmd.unwrap_err();
    assert_eq!(output.as_output().unwrap().status.code(), Some(1));
}
