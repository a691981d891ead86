// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Power spectra of a single field.

use std::{
    collections::{BTreeMap, HashSet},
    fs::create_dir_all,
    sync::Arc,
};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressIterator, ProgressStyle};
use log::{debug, info, warn};
use ndarray::prelude::*;

use super::{stellar_correction, CellsError, FieldSet, Pairing};
use crate::{
    bandpowers::Bandpowers,
    cache::{
        check_deprojection_state, workspace_cache_key, write_alphas, write_deprojection_state,
        DeprojectionState,
    },
    config::{FieldPaths, PipelineConfig},
    harmonic::{deprojection_bias, gaussian_covariance, CouplingWorkspace, CovarianceWorkspace},
    maps::{count_tomographic_maps, load_map, load_tomographic_maps, MaskData, MaskSummary},
    results::{find_theory_link, PowerSpectrumResult},
    PROGRESS_BARS,
};

/// Everything needed to compute the power spectra of one field. Creating this
/// only inspects the field's files; nothing is computed or written until
/// [`PowerSpectraParams::run`].
#[derive(Debug)]
pub struct PowerSpectraParams {
    pub paths: FieldPaths,
    pub nside: u32,
    pub bandpowers: Bandpowers,
    pub weight_thresh: f64,

    /// The file names of the templates to deproject.
    pub template_ids: Vec<String>,

    pub lite: bool,

    /// The factor applied to spectra for stellar contamination, if any.
    pub stellar_factor: Option<f64>,

    /// Ignore anything cached.
    pub recompute: bool,

    pub num_bins: usize,

    /// The pairings to compute, and whether their cached state is usable.
    pub pairings: Vec<(Pairing, DeprojectionState)>,
}

impl PowerSpectraParams {
    /// Prepare the power spectra of `field`; every pairing of its tomographic
    /// bins, or only `pairing`.
    pub fn new(
        config: &PipelineConfig,
        field: &str,
        pairing: Option<Pairing>,
    ) -> Result<PowerSpectraParams, CellsError> {
        let ps = &config.power_spectra;
        let nside = config.global.nside_hi;
        let paths = config.field_paths(field);
        let bandpowers = Bandpowers::new(&ps.bandpowers, nside)?;
        let template_ids = config.systematics(&paths)?;

        let num_bins = count_tomographic_maps(&paths.deltag)?;
        let pairings = match pairing {
            Some(p) if p.j >= num_bins => {
                return Err(CellsError::PairingOutOfRange {
                    pairing: p.label(),
                    num_bins,
                })
            }
            Some(p) => vec![p],
            None => Pairing::all(num_bins),
        };
        let mut states = Vec::with_capacity(pairings.len());
        for p in pairings {
            let record = paths.deprojection_state(p.i, p.j);
            states.push((p, check_deprojection_state(&record, &template_ids, ps.lite)?));
        }

        Ok(PowerSpectraParams {
            paths,
            nside,
            bandpowers,
            weight_thresh: ps.weight_thresh,
            template_ids,
            lite: ps.lite,
            stellar_factor: ps
                .correct_for_stars
                .then(|| stellar_correction(ps.fs_fiducial)),
            recompute: ps.recompute,
            num_bins,
            pairings: states,
        })
    }

    /// Whether cached workspaces and deprojection biases must be ignored.
    pub fn must_recompute(&self) -> bool {
        self.recompute
            || self
                .pairings
                .iter()
                .any(|(_, state)| *state == DeprojectionState::Stale)
    }

    /// The tomographic bins that the pairings use, in ascending order.
    pub fn bins(&self) -> Vec<usize> {
        let mut bins: Vec<usize> = self
            .pairings
            .iter()
            .flat_map(|(p, _)| [p.i, p.j])
            .collect();
        bins.sort_unstable();
        bins.dedup();
        bins
    }

    /// Read every input and build the fields of the bins that the pairings
    /// use. Nothing is written.
    pub(super) fn load_inputs(&self) -> Result<Inputs, CellsError> {
        let paths = &self.paths;
        info!("Reading maps of {}", paths.field);
        let num_ngal = count_tomographic_maps(&paths.ngal)?;
        if num_ngal != self.num_bins {
            return Err(CellsError::BinCountMismatch {
                deltag: paths.deltag.clone(),
                num_deltag: self.num_bins,
                ngal: paths.ngal.clone(),
                num_ngal,
            });
        }

        let mask = MaskData::read(&paths.mask, self.nside, self.weight_thresh)?;
        let bins = self.bins();
        // Only expand the maps of the bins in use.
        let indices = (bins.len() < self.num_bins).then(|| bins.as_slice());
        let maps = load_tomographic_maps(&paths.deltag, false, Some(&mask), indices)?;
        let mean_counts: BTreeMap<usize, f64> = {
            let ngal = load_tomographic_maps(&paths.ngal, false, Some(&mask), indices)?;
            bins.iter()
                .copied()
                .zip(ngal.iter().map(|n| mask.mean_count(n.view())))
                .collect()
        };
        for &(pairing, _) in &self.pairings {
            if pairing.is_auto() && mean_counts[&pairing.i] <= 0.0 {
                return Err(CellsError::NoGalaxies {
                    file: paths.ngal.clone(),
                    bin: pairing.i,
                });
            }
        }
        let templates = self
            .template_ids
            .iter()
            .map(|name| load_map(paths.systmap(name), false, true, Some(&mask)))
            .collect::<Result<Vec<_>, _>>()?;

        let cache_key =
            workspace_cache_key(mask.weights.view(), self.nside, self.bandpowers.edges());
        // Only the summary of the mask is needed once the fields exist.
        let MaskData {
            weights, summary, ..
        } = mask;
        let weights = Arc::new(weights);
        let fields = FieldSet::build(
            weights.clone(),
            bins.into_iter().zip(maps).collect(),
            templates,
            self.nside,
            self.lite,
        )?;

        Ok(Inputs {
            weights,
            summary,
            cache_key,
            fields,
            mean_counts,
        })
    }

    pub fn run(&self) -> Result<(), CellsError> {
        let paths = &self.paths;

        // Load every input before anything is written.
        let Inputs {
            weights,
            summary,
            cache_key,
            fields,
            mean_counts,
        } = self.load_inputs()?;

        create_dir_all(&paths.cache_dir).map_err(|err| CellsError::CreateDir {
            dir: paths.cache_dir.clone(),
            err,
        })?;
        let force = self.must_recompute();
        let (workspace, cov_workspace, computed) = self.workspaces(&weights, &cache_key, force)?;
        drop(weights);
        // A new workspace means the mask or bandpowers changed, so any cached
        // bias is no good either.
        let calc = force || computed;

        let engine = PairingEngine {
            fields: &fields,
            summary,
            workspace: &workspace,
            cov_workspace: &cov_workspace,
            stellar_factor: self.stellar_factor,
            lite: self.lite,
        };

        let pb = ProgressBar::with_draw_target(
            Some(self.pairings.len() as _),
            if PROGRESS_BARS.load() {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:16}: [{wide_bar:.blue}] {pos:2}/{len:2} pairings ({elapsed_precise}<{eta_precise})")
                .unwrap()
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message("Power spectra");

        let mut alphas_written = HashSet::new();
        for &(pairing, state) in self.pairings.iter().progress_with(pb) {
            let (i, j) = (pairing.i, pairing.j);
            debug!("Pairing {pairing} ({state})");
            let cached_bias = if calc || state == DeprojectionState::Stale {
                None
            } else {
                self.cached_bias(pairing, workspace.num_ells())
            };
            let mut result = engine.compute(pairing, mean_counts[&i], cached_bias)?;
            if let Some(theory) = &paths.theory {
                result.theory = find_theory_link(theory, &pairing.label())?;
            }
            result.write(paths.result(i, j))?;

            if fields.has_templates() {
                for bin in [i, j] {
                    if alphas_written.insert(bin) {
                        write_alphas(
                            &paths.alphas(bin),
                            &self.template_ids,
                            fields.deprojected(bin).alphas(),
                        )?;
                    }
                }
            }
            write_deprojection_state(
                &paths.deprojection_state(i, j),
                &self.template_ids,
                self.lite,
            )?;
        }

        info!("Power spectra of {} complete", paths.field);
        Ok(())
    }

    /// Load the workspaces from the cache, or compute (and cache) them. The
    /// returned bool is true if they were computed.
    fn workspaces(
        &self,
        weights: &Array1<f64>,
        cache_key: &str,
        force: bool,
    ) -> Result<(CouplingWorkspace, CovarianceWorkspace, bool), CellsError> {
        if !force {
            if let Some((wsp, cov_wsp)) = load_cached_workspaces(&self.paths, cache_key) {
                info!("Using the cached mode-coupling matrix and coupling coefficients");
                return Ok((wsp, cov_wsp, false));
            }
        }

        info!("Computing the mode-coupling matrix");
        let wsp = CouplingWorkspace::compute(weights.view(), self.nside, &self.bandpowers)?;
        info!("Computing the covariance coupling coefficients");
        let cov_wsp = CovarianceWorkspace::compute(weights.view(), self.nside)?;
        wsp.write(&self.paths.workspace, cache_key)?;
        cov_wsp.write(&self.paths.cov_workspace, cache_key)?;
        Ok((wsp, cov_wsp, true))
    }

    /// The deprojection bias in the previous result of `pairing`, if there is
    /// a usable one.
    fn cached_bias(&self, pairing: Pairing, num_ells: usize) -> Option<Array1<f64>> {
        let file = self.paths.result(pairing.i, pairing.j);
        if !file.exists() {
            return None;
        }
        match PowerSpectrumResult::read(&file) {
            Ok(previous) if previous.cl_bias.len() == num_ells => {
                debug!("Using the deprojection bias cached in {}", file.display());
                Some(previous.cl_bias)
            }
            Ok(_) => {
                warn!(
                    "The deprojection bias in {} has the wrong length; recomputing",
                    file.display()
                );
                None
            }
            Err(e) => {
                warn!("Couldn't read the previous result {}: {e}", file.display());
                None
            }
        }
    }
}

/// The inputs of a run, read and turned into fields.
pub(super) struct Inputs {
    pub(super) weights: Arc<Array1<f64>>,
    pub(super) summary: MaskSummary,
    pub(super) cache_key: String,
    pub(super) fields: FieldSet,

    /// The mean galaxy count of every bin in `fields`.
    pub(super) mean_counts: BTreeMap<usize, f64>,
}

/// Read a field's cached workspaces, as long as they were made with the
/// current mask and bandpowers.
pub(super) fn load_cached_workspaces(
    paths: &FieldPaths,
    cache_key: &str,
) -> Option<(CouplingWorkspace, CovarianceWorkspace)> {
    if !paths.workspace.exists() || !paths.cov_workspace.exists() {
        debug!("No cached workspaces in {}", paths.cache_dir.display());
        return None;
    }
    let wsp = match CouplingWorkspace::read(&paths.workspace) {
        Ok((wsp, key)) if key == cache_key => wsp,
        Ok(_) => {
            warn!(
                "Cached workspace {} was made with a different mask or bandpowers; recomputing",
                paths.workspace.display()
            );
            return None;
        }
        Err(e) => {
            warn!("Couldn't read cached workspace: {e}");
            return None;
        }
    };
    let cov_wsp = match CovarianceWorkspace::read(&paths.cov_workspace) {
        Ok((cov_wsp, key)) if key == cache_key => cov_wsp,
        Ok(_) => {
            warn!(
                "Cached workspace {} was made with a different mask; recomputing",
                paths.cov_workspace.display()
            );
            return None;
        }
        Err(e) => {
            warn!("Couldn't read cached workspace: {e}");
            return None;
        }
    };
    Some((wsp, cov_wsp))
}

/// Turns fields into power-spectrum results.
pub(super) struct PairingEngine<'a> {
    pub(super) fields: &'a FieldSet,
    pub(super) summary: MaskSummary,
    pub(super) workspace: &'a CouplingWorkspace,
    pub(super) cov_workspace: &'a CovarianceWorkspace,
    pub(super) stellar_factor: Option<f64>,
    pub(super) lite: bool,
}

impl PairingEngine<'_> {
    /// The coupled spectrum of bins `a` and `b` normalised by the mean square
    /// mask weight; a guess of the true spectrum. Not corrected for stars.
    fn raw_guess(&self, a: usize, b: usize, deprojected: bool) -> (Array1<f64>, Array1<f64>) {
        let cl_coupled = if deprojected {
            self.fields
                .deprojected(a)
                .coupled_cl(self.fields.deprojected(b))
        } else {
            self.fields.plain(a).coupled_cl(self.fields.plain(b))
        };
        let cl_guess = &cl_coupled / self.summary.meansq;
        (cl_coupled, cl_guess)
    }

    fn correct_for_stars(&self, cl: &mut Array1<f64>) {
        if let Some(factor) = self.stellar_factor {
            *cl *= factor;
        }
    }

    /// The Gaussian covariance of the pairing `(i, j)` with itself.
    fn covariance(
        &self,
        i: usize,
        j: usize,
        deprojected: bool,
    ) -> Result<(Array2<f64>, Array1<f64>), CellsError> {
        let guess = |a, b| {
            let (_, mut g) = self.raw_guess(a, b, deprojected);
            self.correct_for_stars(&mut g);
            g
        };
        let (ii, ij, jj) = (guess(i, i), guess(i, j), guess(j, j));
        Ok(gaussian_covariance(
            self.cov_workspace,
            self.workspace,
            self.workspace,
            [ii.view(), ij.view(), ij.view(), jj.view()],
        )?)
    }

    /// Everything for one pairing. `mean_count` is the mean galaxy count of
    /// bin `i`; only used for auto-correlations.
    pub(super) fn compute(
        &self,
        pairing: Pairing,
        mean_count: f64,
        cached_bias: Option<Array1<f64>>,
    ) -> Result<PowerSpectrumResult, CellsError> {
        let (i, j) = (pairing.i, pairing.j);
        let wsp = self.workspace;
        let num_ells = wsp.num_ells();
        let num_bins = wsp.bandpowers().num_bins();

        let (mut cl_coupled, mut cl_guess) = self.raw_guess(i, j, true);
        let (mut cl_coupled_no_deproj, mut cl_guess_no_deproj) = self.raw_guess(i, j, false);

        let cl_bias = if self.fields.has_templates() && !self.lite {
            match cached_bias {
                Some(bias) => bias,
                None => {
                    debug!("Computing the deprojection bias of {pairing}");
                    deprojection_bias(
                        self.fields.deprojected(i),
                        self.fields.deprojected(j),
                        cl_guess.view(),
                    )?
                }
            }
        } else {
            Array1::zeros(num_ells)
        };

        for cl in [
            &mut cl_coupled,
            &mut cl_guess,
            &mut cl_coupled_no_deproj,
            &mut cl_guess_no_deproj,
        ] {
            self.correct_for_stars(cl);
        }

        let cl_decoupled = wsp.decouple(cl_coupled.view())?;
        let cl_decoupled_debiased = wsp.decouple((&cl_coupled - &cl_bias).view())?;
        let cl_bias_decoupled = wsp.decouple(cl_bias.view())?;
        let cl_decoupled_no_deproj = wsp.decouple(cl_coupled_no_deproj.view())?;

        let (n_ell_coupled, n_ell_decoupled) = if pairing.is_auto() {
            let noise = self.summary.pixel_area() * self.summary.mean / mean_count;
            let coupled = Array1::from_elem(num_ells, noise);
            let decoupled = wsp.decouple(coupled.view())?;
            (coupled, decoupled)
        } else {
            (Array1::zeros(num_ells), Array1::zeros(num_bins))
        };

        let (covar, err_cell) = self.covariance(i, j, true)?;
        let (covar_no_deproj, err_cell_no_deproj) = self.covariance(i, j, false)?;

        Ok(PowerSpectrumResult {
            ell_effs: wsp.bandpowers().ell_effs(),
            cl_coupled,
            cl_decoupled,
            cl_guess,
            cl_coupled_no_deproj,
            cl_decoupled_no_deproj,
            cl_guess_no_deproj,
            n_ell_coupled,
            n_ell_decoupled,
            covar,
            err_cell,
            covar_no_deproj,
            err_cell_no_deproj,
            cl_bias,
            cl_bias_decoupled,
            cl_decoupled_debiased,
            theory: None,
        })
    }
}
