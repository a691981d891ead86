// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use tempfile::{tempdir, TempDir};

use super::*;
use crate::{constants::UNSEEN, healpix::nside2npix};

const NSIDE: u32 = 4;

/// 60% of the valid pixels with weight 1, 40% with weight 0.5, so the mean
/// weight is 0.8 and the mean square weight is 0.7. The first `npix % 5`
/// pixels are left out of the mask to make the split exact.
fn two_level_weights() -> Array1<f64> {
    let npix = nside2npix(NSIDE);
    let skip = npix % 5;
    Array1::from_shape_fn(npix, |p| match p {
        p if p < skip => 0.0,
        p if (p - skip) % 5 < 3 => 1.0,
        _ => 0.5,
    })
}

fn write_single(dir: &TempDir, name: &str, map: &Array1<f64>) -> PathBuf {
    let file = dir.path().join(name);
    SparseMap::from_dense_ring(NSIDE, 2, &[map.view()], &[])
        .unwrap()
        .write(&file)
        .unwrap();
    file
}

#[test]
fn test_mask_statistics() {
    let dir = tempdir().unwrap();
    let file = write_single(&dir, "mask.hsp", &two_level_weights());

    let result = MaskData::read(&file, NSIDE, 0.0);
    assert!(result.is_ok(), "{:?}", result.err());
    let mask = result.unwrap();
    assert_eq!(mask.summary.num_valid, 190);
    assert_eq!(mask.valid_pixels[0], 2);
    assert_abs_diff_eq!(mask.summary.mean, 0.8, epsilon = 1e-12);
    assert_abs_diff_eq!(mask.summary.meansq, 0.7, epsilon = 1e-12);
    assert_abs_diff_eq!(mask.summary.sum, 152.0, epsilon = 1e-9);

    // With a threshold of 0.5, only the weight-1 pixels count.
    let mask = MaskData::read(&file, NSIDE, 0.5).unwrap();
    assert_eq!(mask.summary.num_valid, 114);
    assert_abs_diff_eq!(mask.summary.mean, 1.0);
    assert_abs_diff_eq!(mask.summary.meansq, 1.0);
}

#[test]
fn test_unseen_mask_pixels_become_zero() {
    let dir = tempdir().unwrap();
    let mut weights = two_level_weights();
    weights.slice_mut(s![..48]).fill(UNSEEN);
    let file = write_single(&dir, "mask.hsp", &weights);

    let mask = MaskData::read(&file, NSIDE, 0.0).unwrap();
    assert!(mask.weights.slice(s![..48]).iter().all(|&w| w == 0.0));
    assert_eq!(mask.summary.num_valid, nside2npix(NSIDE) - 48);
    assert!(mask.valid_pixels.iter().all(|&p| p >= 48));
}

#[test]
fn test_bad_masks() {
    let dir = tempdir().unwrap();
    let file = write_single(&dir, "mask.hsp", &two_level_weights());
    let result = MaskData::read(&file, 8, 0.0);
    assert!(matches!(
        result,
        Err(MapError::NsideMismatch {
            expected: 8,
            got: 4,
            ..
        })
    ));

    let mut weights = two_level_weights();
    weights[7] = 1.5;
    let file = write_single(&dir, "bad.hsp", &weights);
    let result = MaskData::read(&file, NSIDE, 0.0);
    assert!(matches!(
        result,
        Err(MapError::WeightOutOfRange { pixel: 7, .. })
    ));

    let result = MaskData::read(dir.path().join("missing.hsp"), NSIDE, 0.0);
    assert!(matches!(result, Err(MapError::SparseMap(_))));

    let file = write_single(&dir, "empty.hsp", &Array1::zeros(nside2npix(NSIDE)));
    let result = MaskData::read(&file, NSIDE, 0.0);
    assert!(matches!(result, Err(MapError::NoValidPixels { .. })));
}

#[test]
fn test_load_systematics_map() {
    let dir = tempdir().unwrap();
    let mask_file = write_single(&dir, "mask.hsp", &two_level_weights());
    let mask = MaskData::read(&mask_file, NSIDE, 0.0).unwrap();

    let syst = Array1::from_shape_fn(nside2npix(NSIDE), |p| 2.0 + (p % 7) as f64);
    let syst_file = write_single(&dir, "syst.hsp", &syst);

    let map = load_map(&syst_file, false, true, Some(&mask)).unwrap();
    // The mask-weighted mean over valid pixels is now zero.
    assert_abs_diff_eq!(mask.weighted_mean(map.view()), 0.0, epsilon = 1e-12);

    // Without a mask, nothing happens.
    let map = load_map(&syst_file, true, true, None).unwrap();
    assert_abs_diff_eq!(map, syst);

    // Masking multiplies by the weights.
    let map = load_map(&syst_file, true, false, Some(&mask)).unwrap();
    assert_abs_diff_eq!(map, &syst * &mask.weights);
}

#[test]
fn test_constant_systematics_map_becomes_zero() {
    let dir = tempdir().unwrap();
    let mask_file = write_single(&dir, "mask.hsp", &two_level_weights());
    let mask = MaskData::read(&mask_file, NSIDE, 0.0).unwrap();

    let syst = Array1::from_elem(nside2npix(NSIDE), 0.25);
    let syst_file = write_single(&dir, "syst.hsp", &syst);
    let map = load_map(&syst_file, false, true, Some(&mask)).unwrap();
    assert!(mask.valid_pixels.iter().all(|&p| map[p].abs() < 1e-15));
    // Pixels outside the mask are untouched.
    assert_eq!(map[0], 0.25);
}

#[test]
fn test_load_tomographic_maps() {
    let dir = tempdir().unwrap();
    let npix = nside2npix(NSIDE);
    let bands: Vec<Array1<f64>> = (0..3)
        .map(|b| Array1::from_shape_fn(npix, |p| (b * 1000 + p) as f64))
        .collect();
    let views: Vec<_> = bands.iter().map(|b| b.view()).collect();
    let names: Vec<String> = (0..3).map(|b| format!("delta_{b}")).collect();
    let file = dir.path().join("deltag.hsp");
    SparseMap::from_dense_ring(NSIDE, 2, &views, &names)
        .unwrap()
        .write(&file)
        .unwrap();

    assert_eq!(count_tomographic_maps(&file).unwrap(), 3);

    let maps = load_tomographic_maps(&file, false, None, None).unwrap();
    assert_eq!(maps.len(), 3);
    for (map, band) in maps.iter().zip(&bands) {
        assert_abs_diff_eq!(map, band);
    }

    let maps = load_tomographic_maps(&file, false, None, Some(&[2, 0])).unwrap();
    assert_eq!(maps.len(), 2);
    assert_abs_diff_eq!(maps[0], bands[2]);
    assert_abs_diff_eq!(maps[1], bands[0]);

    let result = load_tomographic_maps(&file, false, None, Some(&[3]));
    assert!(matches!(
        result,
        Err(MapError::BadIndex {
            index: 3,
            num_maps: 3,
            ..
        })
    ));
}
