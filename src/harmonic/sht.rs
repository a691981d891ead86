// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Spin-0 spherical-harmonic transforms on RING-ordered HEALPix maps.
//!
//! Analysis uses a FFT along each ring followed by a sum over rings of
//! normalised associated-Legendre functions, with the pixel area as the
//! quadrature weight. Rings are processed in fixed-size chunks on the rayon
//! pool; partial results are combined in ring order so the output does not
//! depend on the number of threads.

use ndarray::prelude::*;
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::FftPlanner;

use super::HarmonicError;
use crate::{
    constants::{PI, SHT_RING_CHUNK},
    healpix::{lmax_for_nside, nside2npix, nside2pixarea, rings, Ring},
};

/// Harmonic coefficients `a_lm` of a real field, for `0 <= m <= l <= lmax`.
///
/// Coefficients are stored m-major: all `l` for `m = 0`, then all `l >= 1` for
/// `m = 1`, and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct Alm {
    lmax: usize,
    data: Vec<Complex64>,
}

impl Alm {
    pub fn zeros(lmax: usize) -> Alm {
        Alm {
            lmax,
            data: vec![Complex64::new(0.0, 0.0); num_alms(lmax)],
        }
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn get(&self, l: usize, m: usize) -> Complex64 {
        self.data[alm_index(self.lmax, l, m)]
    }

    pub fn set(&mut self, l: usize, m: usize, value: Complex64) {
        self.data[alm_index(self.lmax, l, m)] = value;
    }

    /// Multiply every `a_lm` by `factor[l]`.
    pub fn scale_by_ell(&mut self, factor: ArrayView1<f64>) {
        for m in 0..=self.lmax {
            let base = alm_index(self.lmax, m, m);
            for (a, &f) in self.data[base..=base + self.lmax - m]
                .iter_mut()
                .zip(factor.slice(s![m..=self.lmax]))
            {
                *a *= f;
            }
        }
    }

    /// `self - Σ coeffs[i] others[i]`.
    pub(crate) fn sub_scaled(&mut self, coeffs: &[f64], others: &[Alm]) {
        for (&c, other) in coeffs.iter().zip(others) {
            for (a, b) in self.data.iter_mut().zip(&other.data) {
                *a -= *b * c;
            }
        }
    }
}

fn num_alms(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 2) / 2
}

fn alm_index(lmax: usize, l: usize, m: usize) -> usize {
    m * (2 * lmax + 1 - m) / 2 + l
}

/// Fill `out[l - m]` with the normalised associated-Legendre function
/// `λ_lm(x)` for `l` from `m` to `lmax`, given `λ_mm`.
fn legendre_column(x: f64, m: usize, lambda_mm: f64, lmax: usize, out: &mut [f64]) {
    out[0] = lambda_mm;
    if m == lmax {
        return;
    }
    let mf = m as f64;
    out[1] = x * (2.0 * mf + 3.0).sqrt() * lambda_mm;
    for l in m + 2..=lmax {
        let lf = l as f64;
        let lm1 = lf - 1.0;
        let a = ((4.0 * lf * lf - 1.0) / (lf * lf - mf * mf)).sqrt();
        let b = ((lm1 * lm1 - mf * mf) / (4.0 * lm1 * lm1 - 1.0)).sqrt();
        out[l - m] = a * (x * out[l - m - 1] - b * out[l - m - 2]);
    }
}

/// `λ_mm` from `λ_(m-1)(m-1)`.
fn next_lambda_mm(lambda: f64, m: usize, sin_theta: f64) -> f64 {
    let mf = m as f64;
    -((2.0 * mf + 1.0) / (2.0 * mf)).sqrt() * sin_theta * lambda
}

fn check_map_size(map: ArrayView1<f64>, nside: u32) -> Result<(), HarmonicError> {
    let npix = nside2npix(nside);
    if map.len() != npix {
        return Err(HarmonicError::SizeMismatch {
            thing: "a map",
            expected: npix,
            got: map.len(),
        });
    }
    Ok(())
}

/// Spherical-harmonic analysis of a real map, up to `lmax = 3 nside - 1`.
pub fn map2alm(map: ArrayView1<f64>, nside: u32) -> Result<Alm, HarmonicError> {
    check_map_size(map, nside)?;
    let lmax = lmax_for_nside(nside);
    let omega = nside2pixarea(nside);
    let rings = rings(nside);

    let partials: Vec<Vec<Complex64>> = rings
        .par_chunks(SHT_RING_CHUNK)
        .map(|chunk| {
            let mut planner = FftPlanner::new();
            let mut acc = vec![Complex64::new(0.0, 0.0); num_alms(lmax)];
            let mut lambdas = vec![0.0; lmax + 1];
            for ring in chunk {
                analyse_ring(map, ring, lmax, omega, &mut planner, &mut lambdas, &mut acc);
            }
            acc
        })
        .collect();

    let mut alm = Alm::zeros(lmax);
    for partial in partials {
        for (a, p) in alm.data.iter_mut().zip(partial) {
            *a += p;
        }
    }
    Ok(alm)
}

fn analyse_ring(
    map: ArrayView1<f64>,
    ring: &Ring,
    lmax: usize,
    omega: f64,
    planner: &mut FftPlanner<f64>,
    lambdas: &mut [f64],
    acc: &mut [Complex64],
) {
    let n = ring.num_pixels;
    let mut buffer: Vec<Complex64> = map
        .slice(s![ring.start..ring.start + n])
        .iter()
        .map(|&v| Complex64::new(v, 0.0))
        .collect();
    planner.plan_fft_forward(n).process(&mut buffer);

    let (x, sin_theta) = (ring.theta.cos(), ring.theta.sin());
    let mut lambda_mm = 1.0 / (4.0 * PI).sqrt();
    for m in 0..=lmax {
        if m > 0 {
            lambda_mm = next_lambda_mm(lambda_mm, m, sin_theta);
        }
        // Frequencies above the ring's Nyquist limit alias onto lower ones.
        let f_m = buffer[m % n] * Complex64::from_polar(omega, -(m as f64) * ring.phi0);
        legendre_column(x, m, lambda_mm, lmax, lambdas);
        let base = alm_index(lmax, m, m);
        for (a, &lambda) in acc[base..=base + lmax - m].iter_mut().zip(lambdas.iter()) {
            *a += f_m * lambda;
        }
    }
}

/// Spherical-harmonic synthesis of a real map at resolution `nside` from
/// `alm`. Multipoles above `3 nside - 1` are ignored.
pub fn alm2map(alm: &Alm, nside: u32) -> Array1<f64> {
    let lmax = alm.lmax.min(lmax_for_nside(nside));
    let rings = rings(nside);

    let chunks: Vec<Vec<f64>> = rings
        .par_chunks(SHT_RING_CHUNK)
        .map(|chunk| {
            let mut planner = FftPlanner::new();
            let mut lambdas = vec![0.0; lmax + 1];
            let mut pixels = Vec::with_capacity(chunk.iter().map(|r| r.num_pixels).sum());
            for ring in chunk {
                synthesise_ring(alm, ring, lmax, &mut planner, &mut lambdas, &mut pixels);
            }
            pixels
        })
        .collect();

    chunks.into_iter().flatten().collect()
}

fn synthesise_ring(
    alm: &Alm,
    ring: &Ring,
    lmax: usize,
    planner: &mut FftPlanner<f64>,
    lambdas: &mut [f64],
    pixels: &mut Vec<f64>,
) {
    let n = ring.num_pixels;
    let mut buffer = vec![Complex64::new(0.0, 0.0); n];

    let (x, sin_theta) = (ring.theta.cos(), ring.theta.sin());
    let mut lambda_mm = 1.0 / (4.0 * PI).sqrt();
    for m in 0..=lmax {
        if m > 0 {
            lambda_mm = next_lambda_mm(lambda_mm, m, sin_theta);
        }
        legendre_column(x, m, lambda_mm, lmax, lambdas);
        let base = alm_index(alm.lmax, m, m);
        let g: Complex64 = alm.data[base..=base + lmax - m]
            .iter()
            .zip(lambdas.iter())
            .map(|(&a, &lambda)| a * lambda)
            .sum();
        // Negative m are the conjugates of positive m for a real field.
        let weight = if m == 0 { 1.0 } else { 2.0 };
        buffer[m % n] += g * Complex64::from_polar(weight, m as f64 * ring.phi0);
    }
    planner.plan_fft_inverse(n).process(&mut buffer);
    pixels.extend(buffer.iter().map(|c| c.re));
}

/// The pseudo-power spectrum `C_l = Σ_m Re(a_lm b*_lm) / (2l + 1)`, summed
/// over `-l <= m <= l`.
pub fn pseudo_cl(a: &Alm, b: &Alm) -> Array1<f64> {
    let lmax = a.lmax.min(b.lmax);
    let mut cl = Array1::zeros(lmax + 1);
    for m in 0..=lmax {
        let weight = if m == 0 { 1.0 } else { 2.0 };
        for l in m..=lmax {
            let (x, y) = (a.get(l, m), b.get(l, m));
            cl[l] += weight * (x * y.conj()).re;
        }
    }
    for (l, c) in cl.iter_mut().enumerate() {
        *c /= (2 * l + 1) as f64;
    }
    cl
}
