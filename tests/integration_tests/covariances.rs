// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tempfile::TempDir;

use gcells::results::{read_covariance, PowerSpectrumResult};

use crate::{get_cmd_output, get_simple_field, gcells};

#[test]
fn test_covariances_need_power_spectra() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());

    let cmd = gcells()
        .args(["covariances", &files.config.display().to_string()])
        .ok();
    assert!(cmd.is_err());
    let (stdout, stderr) = get_cmd_output(cmd);
    let output = stdout + &stderr;
    assert!(output.contains("run 'power-spectra' first"), "{output}");
    assert!(!files.covariances().exists());
}

#[test]
fn test_covariances_after_power_spectra() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());
    let config = files.config.display().to_string();

    let cmd = gcells().args(["power-spectra", &config]).ok();
    let ok = cmd.is_ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(ok, "{stdout}\n{stderr}");

    let cmd = gcells().args(["covariances", &config]).ok();
    let ok = cmd.is_ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(ok, "{stdout}\n{stderr}");

    let labels = ["(0,0)", "(0,1)", "(1,1)"];
    for (i_a, a) in labels.iter().enumerate() {
        for b in &labels[i_a..] {
            let block = read_covariance(files.covariances(), a, b)
                .unwrap()
                .unwrap_or_else(|| panic!("block {a}{b} is missing"));
            assert_eq!(block.covar.dim(), (4, 4));
        }
    }

    // The block of a pairing with itself is the covariance of its result.
    let result = PowerSpectrumResult::read(files.result(1, 1)).unwrap();
    let block = read_covariance(files.covariances(), "(1,1)", "(1,1)")
        .unwrap()
        .unwrap();
    assert_eq!(block.covar, result.covar);
    assert_eq!(block.covar_no_deproj, result.covar_no_deproj);
}
