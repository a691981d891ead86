// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Covariances between every pair of pairings of a field.

use std::collections::HashMap;

use log::{debug, info};
use ndarray::prelude::*;

use super::{power_spectra::load_cached_workspaces, CellsError, Pairing};
use crate::{
    bandpowers::Bandpowers,
    cache::workspace_cache_key,
    config::{FieldPaths, PipelineConfig},
    harmonic::gaussian_covariance,
    maps::{count_tomographic_maps, MaskData},
    results::{write_covariances, CovarianceBlock, PowerSpectrumResult},
};

/// Everything needed to compute the covariance blocks of one field. The power
/// spectra of every pairing must already have been computed; their guess
/// spectra and the cached workspaces are reused.
#[derive(Debug)]
pub struct CovariancesParams {
    pub paths: FieldPaths,
    pub nside: u32,
    pub bandpowers: Bandpowers,
    pub weight_thresh: f64,
    pub num_bins: usize,
}

impl CovariancesParams {
    pub fn new(config: &PipelineConfig, field: &str) -> Result<CovariancesParams, CellsError> {
        let ps = &config.power_spectra;
        let nside = config.global.nside_hi;
        let paths = config.field_paths(field);
        let bandpowers = Bandpowers::new(&ps.bandpowers, nside)?;
        let num_bins = count_tomographic_maps(&paths.deltag)?;
        Ok(CovariancesParams {
            paths,
            nside,
            bandpowers,
            weight_thresh: ps.weight_thresh,
            num_bins,
        })
    }

    /// Every pair of pairings `(a, b)` with `a <= b`.
    pub fn blocks(&self) -> Vec<(Pairing, Pairing)> {
        let pairings = Pairing::all(self.num_bins);
        pairings
            .iter()
            .enumerate()
            .flat_map(|(i_a, &a)| pairings[i_a..].iter().map(move |&b| (a, b)))
            .collect()
    }

    pub fn run(&self) -> Result<(), CellsError> {
        let paths = &self.paths;
        let mask = MaskData::read(&paths.mask, self.nside, self.weight_thresh)?;
        let cache_key =
            workspace_cache_key(mask.weights.view(), self.nside, self.bandpowers.edges());
        drop(mask);
        let (wsp, cov_wsp) = load_cached_workspaces(paths, &cache_key)
            .ok_or_else(|| CellsError::MissingWorkspace(paths.workspace.clone()))?;

        // The (star-corrected) guess spectra of every pairing, with and
        // without deprojection.
        let mut guesses: HashMap<Pairing, (Array1<f64>, Array1<f64>)> = HashMap::new();
        for pairing in Pairing::all(self.num_bins) {
            let file = paths.result(pairing.i, pairing.j);
            if !file.exists() {
                return Err(CellsError::MissingResult(file));
            }
            let result = PowerSpectrumResult::read(&file)?;
            guesses.insert(pairing, (result.cl_guess, result.cl_guess_no_deproj));
        }
        let guess = |a: usize, b: usize, deprojected: bool| {
            let (with, without) = &guesses[&Pairing::new(a, b)];
            if deprojected {
                with.view()
            } else {
                without.view()
            }
        };

        let pairs = self.blocks();
        info!(
            "Computing {} covariance blocks of {}",
            pairs.len(),
            paths.field
        );
        let mut blocks = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            debug!("Covariance of {a} with {b}");
            let spectra = |deprojected| {
                [
                    guess(a.i, b.i, deprojected),
                    guess(a.i, b.j, deprojected),
                    guess(a.j, b.i, deprojected),
                    guess(a.j, b.j, deprojected),
                ]
            };
            let (covar, _) = gaussian_covariance(&cov_wsp, &wsp, &wsp, spectra(true))?;
            let (covar_no_deproj, _) = gaussian_covariance(&cov_wsp, &wsp, &wsp, spectra(false))?;
            blocks.push(CovarianceBlock {
                label_a: a.label(),
                label_b: b.label(),
                covar,
                covar_no_deproj,
            });
        }

        write_covariances(&paths.covariances, &blocks)?;
        info!("Covariances of {} complete", paths.field);
        Ok(())
    }
}
