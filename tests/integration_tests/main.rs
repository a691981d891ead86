// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod covariances;
mod no_stderr;
mod power_spectra;

use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use indoc::formatdoc;
use ndarray::prelude::*;

use gcells::{constants::UNSEEN, healpix::nside2npix, io::sparse_map::SparseMap};

const NSIDE: u32 = 16;
const FIELD: &str = "equator00";

fn gcells() -> Command {
    Command::cargo_bin("gcells").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

fn write_map(file: &Path, bands: &[Array1<f64>], names: &[&str]) {
    let views: Vec<_> = bands.iter().map(|b| b.view()).collect();
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    SparseMap::from_dense_ring(NSIDE, 4, &views, &names)
        .unwrap()
        .write(file)
        .unwrap();
}

struct Files {
    config: PathBuf,
    field_dir: PathBuf,
}

impl Files {
    fn result(&self, i: usize, j: usize) -> PathBuf {
        self.field_dir
            .join(format!("power_spectra_info_nside{NSIDE}_{i}_{j}.fits"))
    }

    fn covariances(&self) -> PathBuf {
        self.field_dir
            .join(format!("covariance_matrices_nside{NSIDE}.fits"))
    }
}

/// A field with two tomographic bins and one all-zero template. Unmasked
/// pixels have weight 1 or 0.5 (in a 3:2 ratio), so the mask has a mean of
/// 0.8 and a mean square of 0.7 over its unmasked area.
fn get_simple_field(dir: &Path) -> Files {
    let out = dir.join("out");
    let field_dir = out.join(FIELD);
    create_dir_all(field_dir.join("systmaps")).unwrap();
    let npix = nside2npix(NSIDE);
    let num_unmasked = 3 * npix / 5;

    let mask = Array1::from_shape_fn(npix, |p| match (p < num_unmasked, p % 5 < 3) {
        (false, _) => 0.0,
        (true, true) => 1.0,
        (true, false) => 0.5,
    });
    let masked = |p: usize, value: f64| if mask[p] > 0.0 { value } else { UNSEEN };
    let deltag: Vec<Array1<f64>> = (0..2)
        .map(|b| {
            Array1::from_shape_fn(npix, |p| {
                let x = p as f64;
                masked(p, 0.2 * (0.13 * x + b as f64).sin() + 0.05 * (0.71 * x).cos())
            })
        })
        .collect();
    let ngal: Vec<Array1<f64>> = (0..2)
        .map(|b| Array1::from_shape_fn(npix, |p| masked(p, 10.0 + b as f64)))
        .collect();

    write_map(
        &field_dir.join(format!("survey_mask_nside{NSIDE}.hsp")),
        &[mask.clone()],
        &[],
    );
    write_map(
        &field_dir.join(format!("deltag_maps_nside{NSIDE}.hsp")),
        &deltag,
        &["delta_0", "delta_1"],
    );
    write_map(
        &field_dir.join(format!("ngal_maps_nside{NSIDE}.hsp")),
        &ngal,
        &["ngal_0", "ngal_1"],
    );
    write_map(
        &field_dir
            .join("systmaps")
            .join(format!("zeros_{NSIDE}.hsp")),
        &[Array1::zeros(npix)],
        &[],
    );

    let config = dir.join("config.yml");
    std::fs::write(
        &config,
        formatdoc! {"
            global:
              paths:
                out: {out}
              fields: [{FIELD}]
              nside_hi: {NSIDE}
            power_spectra:
              systematics: all
              lite: false
              bandpowers:
                spacing: linear
                ell_min: 2
                nbpws: 5
            ",
            out = out.display(),
        },
    )
    .unwrap();

    Files { config, field_dir }
}
