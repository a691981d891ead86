// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Masked fields, optionally cleaned of contaminant templates.

use std::sync::Arc;

use log::trace;
use ndarray::prelude::*;

use super::{from_dmatrix, map2alm, pseudo_cl, to_dmatrix, Alm, HarmonicError};
use crate::{
    constants::{NEGLIGIBLE_TEMPLATE_NORM, TEMPLATE_SVD_EPSILON},
    healpix::nside2pixarea,
};

/// A masked map, ready to have its pseudo-power spectrum taken.
///
/// If templates were given, their best-fit contribution has been projected
/// out of the masked map.
#[derive(Debug, Clone)]
pub struct Field {
    nside: u32,

    /// Shared between every field built on the same survey mask.
    mask: Arc<Array1<f64>>,

    /// The harmonic coefficients of the masked (and cleaned) map.
    alm: Alm,

    /// The best-fit coefficient of each template.
    alphas: Vec<f64>,

    num_templates: usize,

    /// Only present if there are templates and the field wasn't built in lite
    /// mode.
    deprojection: Option<DeprojectionData>,
}

/// What's needed to compute the bias that template deprojection introduces
/// into a pseudo-power spectrum.
#[derive(Debug, Clone)]
pub struct DeprojectionData {
    /// The masked templates.
    pub(super) templates: Vec<Array1<f64>>,

    /// The harmonic coefficients of the masked templates.
    pub(super) template_alms: Vec<Alm>,

    /// The pseudo-inverse of the Gram matrix of the masked templates.
    pub(super) gram_inverse: Array2<f64>,
}

impl Field {
    /// Build a field from `map` and `mask` (neither masked already), cleaning
    /// it of `templates` (also not masked). In lite mode, the masked templates
    /// are discarded once the template coefficients are known.
    pub fn new(
        mask: Arc<Array1<f64>>,
        map: ArrayView1<f64>,
        templates: &[Array1<f64>],
        nside: u32,
        lite: bool,
    ) -> Result<Field, HarmonicError> {
        if mask.len() != map.len() {
            return Err(HarmonicError::SizeMismatch {
                thing: "a map",
                expected: mask.len(),
                got: map.len(),
            });
        }
        if let Some(t) = templates.iter().find(|t| t.len() != mask.len()) {
            return Err(HarmonicError::SizeMismatch {
                thing: "a template",
                expected: mask.len(),
                got: t.len(),
            });
        }

        let masked_map = &map * &*mask;
        let mut alm = map2alm(masked_map.view(), nside)?;
        if templates.is_empty() {
            return Ok(Field {
                nside,
                mask,
                alm,
                alphas: vec![],
                num_templates: 0,
                deprojection: None,
            });
        }

        let map_norm = masked_map.dot(&masked_map);
        let masked_templates: Vec<Array1<f64>> = templates
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut masked = t * &*mask;
                if masked.dot(&masked) <= NEGLIGIBLE_TEMPLATE_NORM * map_norm {
                    trace!("Template {i} is zero up to rounding");
                    masked.fill(0.0);
                }
                masked
            })
            .collect();
        let template_alms = masked_templates
            .iter()
            .map(|s| map2alm(s.view(), nside))
            .collect::<Result<Vec<_>, _>>()?;

        let omega = nside2pixarea(nside);
        let n = masked_templates.len();
        let gram = Array2::from_shape_fn((n, n), |(i, j)| {
            omega * masked_templates[i].dot(&masked_templates[j])
        });
        let gram_inverse = pseudo_inverse(gram.view())?;
        let projections: Array1<f64> = masked_templates
            .iter()
            .map(|s| omega * s.dot(&masked_map))
            .collect();
        let alphas = gram_inverse.dot(&projections).to_vec();
        trace!("Template coefficients: {alphas:?}");

        // The transform is linear, so subtracting in harmonic space is the
        // same as cleaning the map first.
        alm.sub_scaled(&alphas, &template_alms);

        let deprojection = if lite {
            None
        } else {
            Some(DeprojectionData {
                templates: masked_templates,
                template_alms,
                gram_inverse,
            })
        };
        Ok(Field {
            nside,
            mask,
            alm,
            alphas,
            num_templates: n,
            deprojection,
        })
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn mask(&self) -> &Array1<f64> {
        &self.mask
    }

    pub fn alm(&self) -> &Alm {
        &self.alm
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn num_templates(&self) -> usize {
        self.num_templates
    }

    pub fn deprojection(&self) -> Option<&DeprojectionData> {
        self.deprojection.as_ref()
    }

    /// The coupled pseudo-power spectrum of this field with `other`.
    pub fn coupled_cl(&self, other: &Field) -> Array1<f64> {
        pseudo_cl(&self.alm, &other.alm)
    }
}

/// The SVD pseudo-inverse of a symmetric matrix. Singular values below
/// [`TEMPLATE_SVD_EPSILON`] times the largest are treated as zero, so a matrix
/// of zeros (e.g. from empty templates) gives zeros.
fn pseudo_inverse(gram: ArrayView2<f64>) -> Result<Array2<f64>, HarmonicError> {
    if gram.iter().all(|&g| g == 0.0) {
        return Ok(Array2::zeros(gram.raw_dim()));
    }
    let svd = to_dmatrix(gram).svd(true, true);
    let eps = TEMPLATE_SVD_EPSILON * svd.singular_values.max();
    let inverse = svd.pseudo_inverse(eps).map_err(HarmonicError::PseudoInverse)?;
    Ok(from_dmatrix(&inverse))
}
