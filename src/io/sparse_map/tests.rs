// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use tempfile::tempdir;

use super::*;
use crate::healpix::nest2ring;

/// A map where only the first quarter of the sky has data.
fn partial_map(nside: u32, scale: f64) -> Array1<f64> {
    let npix = nside2npix(nside);
    Array1::from_shape_fn(npix, |p| {
        if p < npix / 4 {
            scale * (p as f64 + 1.0)
        } else {
            UNSEEN
        }
    })
}

#[test]
fn test_single_band_round_trip() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("map.hsp");
    let nside = 8;
    let dense = partial_map(nside, 0.5);

    let map = SparseMap::from_dense_ring(nside, 2, &[dense.view()], &[]).unwrap();
    let result = map.write(&file);
    assert!(result.is_ok(), "{:?}", result.err());

    let result = SparseMap::read(&file);
    assert!(result.is_ok(), "{:?}", result.err());
    let read = result.unwrap();
    assert_eq!(read.nside(), nside);
    assert_eq!(read.nside_coverage(), 2);
    assert_eq!(read.num_bands(), 1);
    assert_eq!(SparseMap::count_bands(&file).unwrap(), 1);
    assert!(read.band_names().is_empty());

    let with_unseen = read.to_dense_ring(0, UNSEEN).unwrap();
    assert_abs_diff_eq!(with_unseen, dense);

    let with_zeros = read.to_dense_ring(0, 0.0).unwrap();
    for (&got, &expected) in with_zeros.iter().zip(dense.iter()) {
        if expected == UNSEEN {
            assert_eq!(got, 0.0);
        } else {
            assert_eq!(got, expected);
        }
    }
}

#[test]
fn test_multi_band_round_trip() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("maps.hsp");
    let nside = 4;
    let bands = [partial_map(nside, 1.0), partial_map(nside, -2.0)];
    let names = ["bin0".to_string(), "bin1".to_string()];

    let map = SparseMap::from_dense_ring(
        nside,
        32,
        &[bands[0].view(), bands[1].view()],
        &names,
    )
    .unwrap();
    // The coverage resolution can't be finer than the map.
    assert_eq!(map.nside_coverage(), nside);
    map.write(&file).unwrap();

    let read = SparseMap::read(&file).unwrap();
    assert_eq!(read.num_bands(), 2);
    assert_eq!(SparseMap::count_bands(&file).unwrap(), 2);
    assert_eq!(read.band_names(), &names);
    for (i, band) in bands.iter().enumerate() {
        assert_abs_diff_eq!(read.to_dense_ring(i, UNSEEN).unwrap(), *band);
    }
    assert!(matches!(
        read.to_dense_ring(2, 0.0),
        Err(SparseMapError::BandOutOfRange {
            band: 2,
            num_bands: 2
        })
    ));
}

#[test]
fn test_sentinel_block_layout() {
    let nside = 4;
    let npix = nside2npix(nside);
    // Only NEST pixel 0 has data; it's in coverage pixel 0 with nside_cov 2.
    let mut dense = Array1::from_elem(npix, UNSEEN);
    dense[nest2ring(nside, 0).unwrap()] = 3.0;

    let map = SparseMap::from_dense_ring(nside, 2, &[dense.view()], &[]).unwrap();
    let n_fine = 4;
    // Sentinel block plus one covered block.
    assert_eq!(map.sparse[0].len(), 2 * n_fine);
    assert!(map.sparse[0][..n_fine].iter().all(|&v| v == UNSEEN));
    assert_eq!(map.sparse[0][n_fine], 3.0);
    assert_eq!(map.cov_index[0], n_fine as i64);
    // Uncovered coverage pixels point at the sentinel block.
    for (c, &offset) in map.cov_index.iter().enumerate().skip(1) {
        assert_eq!(offset + (c * n_fine) as i64, 0);
    }
}

#[test]
fn test_missing_file() {
    let result = SparseMap::read("/does/not/exist.hsp");
    assert!(matches!(result, Err(SparseMapError::DoesNotExist(_))));
}

#[test]
fn test_bad_dense_size() {
    let dense = Array1::zeros(10);
    let result = SparseMap::from_dense_ring(4, 2, &[dense.view()], &[]);
    assert!(matches!(result, Err(SparseMapError::DenseSize { .. })));

    let dense = Array1::zeros(nside2npix(4));
    let result = SparseMap::from_dense_ring(4, 2, &[dense.view(), dense.view()], &[]);
    assert!(matches!(result, Err(SparseMapError::NoBands)));
}

#[test]
fn test_count_bands_of_missing_file() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        SparseMap::count_bands(dir.path().join("nothing.hsp")),
        Err(SparseMapError::DoesNotExist(_))
    ));
}
