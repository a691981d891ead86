// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;
use crate::constants::FRAC_PI_2;

#[test]
fn test_npix_and_area() {
    assert_eq!(nside2npix(1), 12);
    assert_eq!(nside2npix(4), 192);
    assert_eq!(nside2npix(2048), 50_331_648);

    let total: f64 = nside2pixarea(8) * nside2npix(8) as f64;
    assert_abs_diff_eq!(total, 4.0 * PI, epsilon = 1e-12);

    assert_eq!(npix2nside(192), Some(4));
    assert_eq!(npix2nside(191), None);
    // 12 * 3^2 is a valid pixel count for HEALPix in general, but we only
    // accept powers of 2.
    assert_eq!(npix2nside(108), None);
}

#[test]
fn test_check_nside() {
    assert!(check_nside(1).is_ok());
    assert!(check_nside(1024).is_ok());
    assert_eq!(check_nside(0), Err(HealpixError::InvalidNside(0)));
    assert_eq!(check_nside(6), Err(HealpixError::InvalidNside(6)));
}

#[test]
fn test_rings_cover_the_sphere() {
    for nside in [1, 2, 4, 16] {
        let rings = rings(nside);
        assert_eq!(rings.len(), 4 * nside as usize - 1);

        // Rings are contiguous and cover every pixel exactly once.
        let mut next = 0;
        for ring in &rings {
            assert_eq!(ring.start, next, "nside {nside}");
            next += ring.num_pixels;
        }
        assert_eq!(next, nside2npix(nside));

        // Colatitudes increase north to south and are symmetric about the
        // equator.
        for w in rings.windows(2) {
            assert!(w[0].theta < w[1].theta);
        }
        let n = rings.len();
        for (north, south) in rings.iter().zip(rings.iter().rev()).take(n / 2) {
            assert_abs_diff_eq!(north.theta, PI - south.theta, epsilon = 1e-12);
            assert_eq!(north.num_pixels, south.num_pixels);
        }
    }
}

#[test]
fn test_ring_values_nside_2() {
    let rings = rings(2);
    // First ring: 4 pixels at z = 1 - 1/12.
    assert_eq!(rings[0].num_pixels, 4);
    assert_abs_diff_eq!(rings[0].theta.cos(), 11.0 / 12.0, epsilon = 1e-14);
    assert_abs_diff_eq!(rings[0].phi0, PI / 4.0, epsilon = 1e-14);
    // The equator is the fourth ring (index 3) for nside 2.
    assert_abs_diff_eq!(rings[3].theta, FRAC_PI_2, epsilon = 1e-14);
    assert_eq!(rings[3].start, 20);
    assert_eq!(rings[3].num_pixels, 8);
    // Equatorial rings alternate between a half-pixel shift and none.
    assert_abs_diff_eq!(rings[1].phi0, PI / 8.0, epsilon = 1e-14);
    assert_abs_diff_eq!(rings[2].phi0, 0.0, epsilon = 1e-14);
    assert_abs_diff_eq!(rings[3].phi0, PI / 8.0, epsilon = 1e-14);
}

#[test]
fn test_nest2ring_known_values() {
    // nside 1: NEST and RING agree.
    for p in 0..12 {
        assert_eq!(nest2ring(1, p).unwrap(), p);
    }

    // Values from the HEALPix reference implementation.
    assert_eq!(nest2ring(2, 0).unwrap(), 13);
    assert_eq!(nest2ring(2, 3).unwrap(), 0);
    assert_eq!(nest2ring(2, 44).unwrap(), 47);
    assert_eq!(nest2ring(2, 47).unwrap(), 35);
}

#[test]
fn test_nest2ring_is_a_permutation() {
    for nside in [2, 4, 8, 32] {
        let table = nest2ring_table(nside).unwrap();
        let mut seen = vec![false; table.len()];
        for &r in &table {
            assert!(!seen[r], "RING pixel {r} reached twice for nside {nside}");
            seen[r] = true;
        }
        assert!(seen.into_iter().all(|s| s));
    }
}

#[test]
fn test_nest2ring_out_of_range() {
    let result = nest2ring(2, 48);
    assert!(matches!(
        result,
        Err(HealpixError::PixelOutOfRange { pixel: 48, .. })
    ));
}

#[test]
fn test_lmax() {
    assert_eq!(lmax_for_nside(1), 2);
    assert_eq!(lmax_for_nside(64), 191);
}
