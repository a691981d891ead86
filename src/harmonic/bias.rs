// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The bias that template deprojection introduces into coupled pseudo-power
//! spectra.
//!
//! Deprojecting templates `s_i` (already masked) from a masked map `m`
//! removes `Σ_ij s_i G⁺_ij <s_j, m>`, where `G` is the Gram matrix of the
//! templates. Averaged over realisations of a signal with power spectrum
//! `C_l`, the cross-spectrum of two cleaned fields `a` and `b` is offset from
//! that of the uncleaned fields by `-A - B + C`, where
//!
//! - `A = Σ_ij G⁺a_ij C̃(s^a_i, w_b F[w_a s^a_j])`,
//! - `B = Σ_kl G⁺b_kl C̃(w_a F[w_b s^b_l], s^b_k)`,
//! - `C = Σ_ijkl G⁺a_ij G⁺b_kl <w_b s^b_l, F[w_a s^a_j]> C̃(s^a_i, s^b_k)`,
//!
//! `F[f]` filters a map with `C_l` and `<f, g>` integrates over the sphere.

use ndarray::prelude::*;

use super::{alm2map, map2alm, pseudo_cl, DeprojectionData, Field, HarmonicError};
use crate::healpix::{lmax_for_nside, nside2pixarea};

/// The deprojection bias of the coupled pseudo-power spectrum of `field_a`
/// and `field_b`, given a guess of the true spectrum. Fields without templates
/// contribute nothing; if neither has templates, the bias is zero.
pub fn deprojection_bias(
    field_a: &Field,
    field_b: &Field,
    cl_guess: ArrayView1<f64>,
) -> Result<Array1<f64>, HarmonicError> {
    let nside = field_a.nside();
    let num_ells = lmax_for_nside(nside) + 1;
    if field_b.nside() != nside {
        return Err(HarmonicError::SizeMismatch {
            thing: "the HEALPix resolution of a field",
            expected: nside as usize,
            got: field_b.nside() as usize,
        });
    }
    if cl_guess.len() != num_ells {
        return Err(HarmonicError::SizeMismatch {
            thing: "a guess power spectrum",
            expected: num_ells,
            got: cl_guess.len(),
        });
    }

    let depr_a = deprojection_of(field_a)?;
    let depr_b = deprojection_of(field_b)?;
    let mut bias = Array1::zeros(num_ells);
    if depr_a.is_none() && depr_b.is_none() {
        return Ok(bias);
    }
    let omega = nside2pixarea(nside);
    let (w_a, w_b) = (field_a.mask(), field_b.mask());

    // F[w_a s^a_j] for each template of a, likewise for b.
    let filtered_a = match depr_a {
        Some(d) => filter_templates(d, w_a, cl_guess, nside)?,
        None => vec![],
    };
    let filtered_b = match depr_b {
        Some(d) => filter_templates(d, w_b, cl_guess, nside)?,
        None => vec![],
    };

    if let Some(d) = depr_a {
        for (j, filtered) in filtered_a.iter().enumerate() {
            let v = map2alm((filtered * w_b).view(), nside)?;
            for (i, s_alm) in d.template_alms.iter().enumerate() {
                bias.scaled_add(-d.gram_inverse[(i, j)], &pseudo_cl(s_alm, &v));
            }
        }
    }

    if let Some(d) = depr_b {
        for (l, filtered) in filtered_b.iter().enumerate() {
            let v = map2alm((filtered * w_a).view(), nside)?;
            for (k, s_alm) in d.template_alms.iter().enumerate() {
                bias.scaled_add(-d.gram_inverse[(k, l)], &pseudo_cl(&v, s_alm));
            }
        }
    }

    if let (Some(da), Some(db)) = (depr_a, depr_b) {
        // <w_b s^b_l, F[w_a s^a_j]>
        let overlaps = Array2::from_shape_fn((filtered_a.len(), db.templates.len()), |(j, l)| {
            omega * (&db.templates[l] * w_b).dot(&filtered_a[j])
        });
        // Σ_jl G⁺a_ij <..>_jl G⁺b_kl
        let coefficients = da.gram_inverse.dot(&overlaps).dot(&db.gram_inverse.t());
        for (i, s_a) in da.template_alms.iter().enumerate() {
            for (k, s_b) in db.template_alms.iter().enumerate() {
                bias.scaled_add(coefficients[(i, k)], &pseudo_cl(s_a, s_b));
            }
        }
    }

    Ok(bias)
}

fn deprojection_of(field: &Field) -> Result<Option<&DeprojectionData>, HarmonicError> {
    match (field.num_templates(), field.deprojection()) {
        (0, _) => Ok(None),
        (_, Some(d)) => Ok(Some(d)),
        (_, None) => Err(HarmonicError::LiteField),
    }
}

/// `F[w s_j]` for every masked template `s_j` of a field with mask `w`.
fn filter_templates(
    depr: &DeprojectionData,
    mask: &Array1<f64>,
    cl: ArrayView1<f64>,
    nside: u32,
) -> Result<Vec<Array1<f64>>, HarmonicError> {
    depr.templates
        .iter()
        .map(|s| {
            let mut alm = map2alm((s * mask).view(), nside)?;
            alm.scale_by_ell(cl);
            Ok(alm2map(&alm, nside))
        })
        .collect()
}
