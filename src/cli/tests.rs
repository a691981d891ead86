// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use super::*;
use crate::{cells::CellsError, config::ConfigError};

#[test]
fn test_parse_power_spectra() {
    let gcells = Gcells::try_parse_from([
        "gcells",
        "power-spectra",
        "config.yml",
        "(0,1)",
        "-vv",
        "--dry-run",
    ])
    .unwrap();
    assert_eq!(gcells.global_opts.verbosity, 2);
    assert!(gcells.global_opts.dry_run);
    assert!(!gcells.global_opts.no_progress_bars);
    match gcells.command {
        Command::PowerSpectra(args) => {
            assert_eq!(args.config, PathBuf::from("config.yml"));
            assert_eq!(args.pairing.as_deref(), Some("(0,1)"));
        }
        c => panic!("Unexpected subcommand {c:?}"),
    }
}

#[test]
fn test_parse_covariances() {
    let gcells =
        Gcells::try_parse_from(["gcells", "--no-progress-bars", "covariances", "c.toml"]).unwrap();
    assert!(gcells.global_opts.no_progress_bars);
    assert_eq!(gcells.command.name(), "covariances");
    assert_eq!(gcells.command.config(), &PathBuf::from("c.toml"));

    // Covariances take no pairing.
    assert!(Gcells::try_parse_from(["gcells", "covariances", "c.toml", "(0,0)"]).is_err());
}

#[test]
fn test_aliases_and_inference() {
    for sub in ["cells", "power", "power-spectra"] {
        let gcells = Gcells::try_parse_from(["gcells", sub, "c.yml"]).unwrap();
        assert_eq!(gcells.command.name(), "power-spectra", "{sub}");
    }
}

#[test]
fn test_config_is_required() {
    assert!(Gcells::try_parse_from(["gcells"]).is_err());
    assert!(Gcells::try_parse_from(["gcells", "power-spectra"]).is_err());
}

#[test]
fn test_bad_pairing_is_a_power_spectra_error() {
    let args = power_spectra::PowerSpectraArgs {
        config: PathBuf::from("unused.yml"),
        pairing: Some("(0;1)".to_string()),
    };
    let config: PipelineConfig = serde_yaml::from_str(
        "global: {paths: {out: /nonexistent}, fields: [a], nside_hi: 8}",
    )
    .unwrap();
    let err = args.run(&config, true).unwrap_err();
    assert!(matches!(err, GcellsError::PowerSpectra(_)), "{err:?}");
    assert!(err.to_string().contains("(0;1)"));
}

#[test]
fn test_error_conversion() {
    let e = GcellsError::from(CellsError::Config(ConfigError::NoFields));
    assert!(matches!(e, GcellsError::Config(_)));
    assert!(e.to_string().contains("Configuration"));

    let e = GcellsError::from(CellsError::MissingResult(PathBuf::from("x.fits")));
    assert!(matches!(e, GcellsError::Covariances(_)));
    assert!(e.to_string().starts_with("Result x.fits doesn't exist"));
}
