// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::Array1;
use tempfile::tempdir;

use super::*;

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_missing_record() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("deprojected_0_0.txt");
    assert_eq!(
        check_deprojection_state(&file, &[], false).unwrap(),
        DeprojectionState::Valid
    );
    assert_eq!(
        check_deprojection_state(&file, &ids(&["dust_1024.hsp"]), false).unwrap(),
        DeprojectionState::Stale
    );
}

#[test]
fn test_record_is_compared_as_a_set() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("deprojected_0_1.txt");
    let a = ids(&["dust_1024.hsp", "seeing_1024.hsp", "stars_1024.hsp"]);
    write_deprojection_state(&file, &a, false).unwrap();

    let reordered = ids(&["stars_1024.hsp", "dust_1024.hsp", "seeing_1024.hsp"]);
    assert_eq!(
        check_deprojection_state(&file, &reordered, false).unwrap(),
        DeprojectionState::Valid
    );

    let fewer = ids(&["dust_1024.hsp", "seeing_1024.hsp"]);
    assert_eq!(
        check_deprojection_state(&file, &fewer, false).unwrap(),
        DeprojectionState::Stale
    );
    assert_eq!(
        check_deprojection_state(&file, &[], false).unwrap(),
        DeprojectionState::Stale
    );

    // Changing lite mode invalidates the record.
    assert_eq!(
        check_deprojection_state(&file, &a, true).unwrap(),
        DeprojectionState::Stale
    );
}

#[test]
fn test_empty_record() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("deprojected_1_1.txt");
    write_deprojection_state(&file, &[], true).unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "lite=true\n");
    assert_eq!(
        check_deprojection_state(&file, &[], true).unwrap(),
        DeprojectionState::Valid
    );
}

#[test]
fn test_cache_key() {
    let weights = Array1::from_shape_fn(48, |p| (p % 4) as f64 / 4.0);
    let key = workspace_cache_key(weights.view(), 2, &[2, 4, 6]);
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(key, workspace_cache_key(weights.view(), 2, &[2, 4, 6]));

    assert_ne!(key, workspace_cache_key(weights.view(), 2, &[2, 4, 5]));
    assert_ne!(key, workspace_cache_key(weights.view(), 4, &[2, 4, 6]));
    let mut changed = weights.clone();
    changed[17] = 0.5;
    assert_ne!(key, workspace_cache_key(changed.view(), 2, &[2, 4, 6]));
}

#[test]
fn test_alphas_round_trip() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("alphas_bin0.txt");
    let names = ids(&["dust_1024.hsp", "seeing_1024.hsp"]);
    let alphas = [0.1 + 0.2, -3.5e-7];
    write_alphas(&file, &names, &alphas).unwrap();

    let read = read_alphas(&file).unwrap();
    assert_eq!(
        read,
        vec![
            ("dust_1024.hsp".to_string(), 0.1 + 0.2),
            ("seeing_1024.hsp".to_string(), -3.5e-7)
        ]
    );

    assert!(matches!(
        write_alphas(&file, &names, &[1.0]),
        Err(CacheError::AlphaCountMismatch {
            num_names: 2,
            num_alphas: 1
        })
    ));

    std::fs::write(&file, "dust_1024.hsp 0.5\nseeing_1024.hsp\n").unwrap();
    assert!(matches!(
        read_alphas(&file),
        Err(CacheError::BadAlphaLine { line_num: 2, .. })
    ));
}
