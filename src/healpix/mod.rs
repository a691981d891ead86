// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! HEALPix pixel geometry.
//!
//! Only what the rest of `gcells` needs is here: the number and area of
//! pixels, the layout of iso-latitude rings in the RING scheme (used by the
//! spherical-harmonic transforms) and conversion from the NEST scheme (used by
//! sparse map files) to RING.
//!
//! See Górski et al. (2005), ApJ 622, 759, for the definitions.

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::constants::PI;

/// `jrll` and `jpll` of the HEALPix reference implementation: the ring and
/// longitude indices of the southernmost corner of each base face, in units of
/// nside.
const FACE_RING: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const FACE_PHI: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HealpixError {
    #[error("nside {0} is not a positive power of 2")]
    InvalidNside(u32),

    #[error("Pixel {pixel} is out of range for nside {nside} (npix = {npix})")]
    PixelOutOfRange { pixel: usize, nside: u32, npix: usize },
}

/// Check that `nside` is a legal HEALPix resolution.
pub fn check_nside(nside: u32) -> Result<(), HealpixError> {
    if nside == 0 || !nside.is_power_of_two() {
        return Err(HealpixError::InvalidNside(nside));
    }
    Ok(())
}

/// The number of pixels covering the full sky at this resolution.
pub fn nside2npix(nside: u32) -> usize {
    12 * nside as usize * nside as usize
}

/// The solid angle of a single pixel [steradians].
pub fn nside2pixarea(nside: u32) -> f64 {
    4.0 * PI / nside2npix(nside) as f64
}

/// Recover nside from a full-sky pixel count, if the count is valid.
pub fn npix2nside(npix: usize) -> Option<u32> {
    if npix % 12 != 0 {
        return None;
    }
    let nside = ((npix / 12) as f64).sqrt().round() as u32;
    if nside2npix(nside) == npix && check_nside(nside).is_ok() {
        Some(nside)
    } else {
        None
    }
}

/// The largest multipole supported by a map at this resolution (`3 nside -
/// 1`).
pub fn lmax_for_nside(nside: u32) -> usize {
    3 * nside as usize - 1
}

/// An iso-latitude ring of RING-ordered pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    /// The index of the first pixel of this ring.
    pub start: usize,

    /// The number of pixels in this ring.
    pub num_pixels: usize,

    /// Colatitude of the ring [radians].
    pub theta: f64,

    /// Longitude of the first pixel of the ring [radians]. Subsequent pixels
    /// are spaced by `2π / num_pixels`.
    pub phi0: f64,
}

/// All `4 nside - 1` rings of a RING-ordered map, north to south.
pub fn rings(nside: u32) -> Vec<Ring> {
    let n = nside as usize;
    let nf = nside as f64;
    let npix = nside2npix(nside);
    let num_rings = 4 * n - 1;

    (1..=num_rings)
        .map(|i| {
            if i < n {
                // North polar cap.
                let i_f = i as f64;
                Ring {
                    start: 2 * i * (i - 1),
                    num_pixels: 4 * i,
                    theta: (1.0 - i_f * i_f / (3.0 * nf * nf)).acos(),
                    phi0: PI / (4.0 * i_f),
                }
            } else if i <= 3 * n {
                // Equatorial belt. Every other ring is shifted by half a pixel.
                let shifted = (i - n + 1) % 2 == 1;
                Ring {
                    start: 2 * n * (n - 1) + (i - n) * 4 * n,
                    num_pixels: 4 * n,
                    theta: (4.0 / 3.0 - 2.0 * i as f64 / (3.0 * nf)).acos(),
                    phi0: if shifted { PI / (4.0 * nf) } else { 0.0 },
                }
            } else {
                // South polar cap, mirrored from the north.
                let ii = 4 * n - i;
                let ii_f = ii as f64;
                Ring {
                    start: npix - 2 * ii * (ii + 1),
                    num_pixels: 4 * ii,
                    theta: (-(1.0 - ii_f * ii_f / (3.0 * nf * nf))).acos(),
                    phi0: PI / (4.0 * ii_f),
                }
            }
        })
        .collect()
}

/// Split the bits of a NEST in-face index into its x and y coordinates.
fn compress_bits(mut v: u64) -> u64 {
    let mut out = 0;
    let mut bit = 0;
    while v != 0 {
        out |= (v & 1) << bit;
        v >>= 2;
        bit += 1;
    }
    out
}

/// Convert a NEST-ordered pixel index into a RING-ordered one.
pub fn nest2ring(nside: u32, pixel: usize) -> Result<usize, HealpixError> {
    let npix = nside2npix(nside);
    if pixel >= npix {
        return Err(HealpixError::PixelOutOfRange {
            pixel,
            nside,
            npix,
        });
    }

    let n = nside as i64;
    let face_pixels = (n * n) as usize;
    let face = pixel / face_pixels;
    let in_face = (pixel % face_pixels) as u64;
    let ix = compress_bits(in_face) as i64;
    let iy = compress_bits(in_face >> 1) as i64;

    let nl4 = 4 * n;
    let ncap = 2 * n * (n - 1);
    let jr = FACE_RING[face] * n - ix - iy - 1;

    let (nr, n_before, kshift) = if jr < n {
        (jr, 2 * jr * (jr - 1), 0)
    } else if jr > 3 * n {
        let nr = nl4 - jr;
        (nr, npix as i64 - 2 * (nr + 1) * nr, 0)
    } else {
        (n, ncap + (jr - n) * nl4, (jr - n) & 1)
    };

    let mut jp = (FACE_PHI[face] * nr + ix - iy + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    } else if jp < 1 {
        jp += nl4;
    }

    Ok((n_before + jp - 1) as usize)
}

/// A lookup table from NEST to RING indices for a whole map.
pub fn nest2ring_table(nside: u32) -> Result<Vec<usize>, HealpixError> {
    check_nside(nside)?;
    (0..nside2npix(nside))
        .map(|p| nest2ring(nside, p))
        .collect()
}
