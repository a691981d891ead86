// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use tempfile::TempDir;

use crate::{get_cmd_output, get_simple_field, gcells};

#[test]
fn test_power_spectra_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());

    let cmd = gcells()
        .args(["power-spectra", &files.config.display().to_string(), "-v"])
        .ok();
    assert!(
        cmd.is_ok(),
        "power-spectra failed on simple test data: {}",
        cmd.err().unwrap()
    );
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}

#[test]
fn test_dry_run_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let files = get_simple_field(tmp_dir.path());

    let cmd = gcells()
        .args([
            "--dry-run",
            "covariances",
            &files.config.display().to_string(),
        ])
        .ok();
    assert!(
        cmd.is_ok(),
        "covariances --dry-run failed: {}",
        cmd.err().unwrap()
    );
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}
