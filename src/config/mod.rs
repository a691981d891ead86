// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pipeline configuration.
//!
//! A configuration file has a `global` block, shared by every stage of the
//! pipeline, and a `power_spectra` block for this stage. Unknown keys are
//! rejected. YAML, TOML and JSON files are accepted; the format is chosen by
//! file extension.

mod error;

pub use error::ConfigError;

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    bandpowers::BandpowerSettings,
    constants::{DEFAULT_FS_FIDUCIAL, DEFAULT_WEIGHT_THRESHOLD},
    healpix::check_nside,
    io::get_sorted_matches_in_dir,
};

lazy_static::lazy_static! {
    pub(crate) static ref CONFIG_FILE_TYPES_COMMA_SEPARATED: String = ConfigFileType::iter().join(", ");
}

#[derive(Debug, Display, EnumIter, EnumString)]
enum ConfigFileType {
    #[strum(to_string = "yaml", serialize = "yml")]
    Yaml,
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

/// Everything a run needs to know. Built once and then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub global: GlobalSettings,

    #[serde(default)]
    pub power_spectra: PowerSpectraSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    pub paths: Paths,

    /// Fields to process. The names "spring" and "autumn" stand for groups of
    /// HSC subfields.
    pub fields: Vec<String>,

    /// The HEALPix resolution of every map.
    pub nside_hi: u32,

    /// Appended to every file name (after the resolution tag).
    #[serde(default)]
    pub suffix: String,

    #[serde(default)]
    pub maps: MapFiles,

    #[serde(default)]
    pub cell_files: CellFiles,

    #[serde(default)]
    pub cache_files: CacheFiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Paths {
    /// Every field has a directory of this name inside `out`.
    pub out: PathBuf,
}

/// Base names of the input maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MapFiles {
    pub survey_mask: String,
    pub deltag_maps: String,
    pub ngal_maps: String,
}

impl Default for MapFiles {
    fn default() -> Self {
        MapFiles {
            survey_mask: "survey_mask".to_string(),
            deltag_maps: "deltag_maps".to_string(),
            ngal_maps: "ngal_maps".to_string(),
        }
    }
}

/// Base names of power-spectrum files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CellFiles {
    pub main: String,

    /// Theory predictions, produced elsewhere. If the file exists, results
    /// link to it.
    pub theory: Option<String>,

    pub covariances: String,
}

impl Default for CellFiles {
    fn default() -> Self {
        CellFiles {
            main: "power_spectra_info".to_string(),
            theory: Some("theory_cells".to_string()),
            covariances: "covariance_matrices".to_string(),
        }
    }
}

/// Base names of cache files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheFiles {
    pub workspaces: WorkspaceFiles,
    pub deproj: DeprojectionFiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WorkspaceFiles {
    pub wsp: String,
    pub covwsp: String,
}

impl Default for WorkspaceFiles {
    fn default() -> Self {
        WorkspaceFiles {
            wsp: "workspace".to_string(),
            covwsp: "covworkspace".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeprojectionFiles {
    pub deprojected: String,
    pub alphas: String,
}

impl Default for DeprojectionFiles {
    fn default() -> Self {
        DeprojectionFiles {
            deprojected: "deprojected".to_string(),
            alphas: "deprojection_alphas".to_string(),
        }
    }
}

/// Settings for the power-spectra and covariances stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerSpectraSettings {
    /// Systematics templates to deproject; file names inside each field's
    /// `systmaps` directory, or "all".
    #[serde(default)]
    pub systematics: Systematics,

    /// If set, only this many templates are deprojected.
    #[serde(default)]
    pub nsyst_max: Option<usize>,

    /// Build fields without what's needed for the deprojection bias.
    #[serde(default)]
    pub lite: bool,

    #[serde(default)]
    pub bandpowers: BandpowerSettings,

    /// Pixels with a mask weight at or below this are ignored.
    #[serde(default = "default_weight_thresh")]
    pub weight_thresh: f64,

    /// Scale spectra to account for stars misclassified as galaxies.
    #[serde(default = "default_true")]
    pub correct_for_stars: bool,

    /// The assumed stellar fraction of the galaxy sample.
    #[serde(default = "default_fs")]
    pub fs_fiducial: f64,

    /// Ignore every cached workspace and deprojection bias.
    #[serde(default)]
    pub recompute: bool,
}

impl Default for PowerSpectraSettings {
    fn default() -> Self {
        PowerSpectraSettings {
            systematics: Systematics::default(),
            nsyst_max: None,
            lite: false,
            bandpowers: BandpowerSettings::default(),
            weight_thresh: default_weight_thresh(),
            correct_for_stars: true,
            fs_fiducial: default_fs(),
            recompute: false,
        }
    }
}

/// Either a single name (typically "all") or a list of names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Systematics {
    One(String),
    Many(Vec<String>),
}

impl Default for Systematics {
    fn default() -> Self {
        Systematics::Many(vec![])
    }
}

impl Systematics {
    fn names(&self) -> &[String] {
        match self {
            Systematics::One(s) => std::slice::from_ref(s),
            Systematics::Many(v) => v,
        }
    }

    /// Whether every template in the directory was asked for.
    pub fn is_all(&self) -> bool {
        self.names().iter().any(|s| s.eq_ignore_ascii_case("all"))
    }
}

fn default_weight_thresh() -> f64 {
    DEFAULT_WEIGHT_THRESHOLD
}

fn default_true() -> bool {
    true
}

fn default_fs() -> f64 {
    DEFAULT_FS_FIDUCIAL
}

/// Where everything belonging to one field lives.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPaths {
    pub field: String,
    pub dir: PathBuf,
    pub mask: PathBuf,
    pub deltag: PathBuf,
    pub ngal: PathBuf,
    pub systmaps_dir: PathBuf,
    pub theory: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub workspace: PathBuf,
    pub cov_workspace: PathBuf,
    pub covariances: PathBuf,

    tag: String,
    main: String,
    deprojected: String,
    alphas: String,
}

impl FieldPaths {
    /// The result file of the bin pairing `(i, j)`.
    pub fn result(&self, i: usize, j: usize) -> PathBuf {
        self.dir.join(format!("{}{}_{i}_{j}.fits", self.main, self.tag))
    }

    /// The deprojection-state record of the bin pairing `(i, j)`.
    pub fn deprojection_state(&self, i: usize, j: usize) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}_{i}_{j}.txt", self.deprojected, self.tag))
    }

    /// The template coefficients of tomographic bin `bin`.
    pub fn alphas(&self, bin: usize) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}_bin{bin}.txt", self.alphas, self.tag))
    }

    pub fn systmap(&self, name: &str) -> PathBuf {
        self.systmaps_dir.join(name)
    }
}

impl PipelineConfig {
    /// Read and validate a configuration file.
    pub fn read<P: AsRef<Path>>(file: P) -> Result<PipelineConfig, ConfigError> {
        let file = file.as_ref();
        if !file.exists() {
            return Err(ConfigError::DoesNotExist(file.to_path_buf()));
        }
        debug!("Attempting to parse config file {}", file.display());

        let file_type = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ConfigFileType::from_str(&e).ok());
        let parse_err = |format, message: String| ConfigError::Parse {
            file: file.to_path_buf(),
            format,
            message,
        };
        let config: PipelineConfig = match file_type {
            Some(ConfigFileType::Yaml) => {
                trace!("Parsing yaml file...");
                serde_yaml::from_str(&read_to_string(file)?)
                    .map_err(|e| parse_err("yaml", e.to_string()))?
            }
            Some(ConfigFileType::Toml) => {
                trace!("Parsing toml file...");
                toml::from_str(&read_to_string(file)?)
                    .map_err(|e| parse_err("toml", e.to_string()))?
            }
            Some(ConfigFileType::Json) => {
                trace!("Parsing json file...");
                serde_json::from_str(&read_to_string(file)?)
                    .map_err(|e| parse_err("json", e.to_string()))?
            }
            None => {
                return Err(ConfigError::UnrecognisedExtension {
                    file: file.to_path_buf(),
                    valid: CONFIG_FILE_TYPES_COMMA_SEPARATED.clone(),
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.global.fields.is_empty() {
            return Err(ConfigError::NoFields);
        }
        check_nside(self.global.nside_hi).map_err(|_| ConfigError::BadNside {
            nside: self.global.nside_hi,
        })?;
        let ps = &self.power_spectra;
        if !(0.0..1.0).contains(&ps.fs_fiducial) {
            return Err(ConfigError::BadStellarFraction(ps.fs_fiducial));
        }
        if !(0.0..1.0).contains(&ps.weight_thresh) {
            return Err(ConfigError::BadWeightThreshold(ps.weight_thresh));
        }
        Ok(())
    }

    /// The tag identifying resolution-dependent files, e.g. `_nside1024_v2`.
    pub fn tag(&self) -> String {
        format!("_nside{}{}", self.global.nside_hi, self.global.suffix)
    }

    /// The fields to process, with group names expanded into their subfields.
    pub fn subfields(&self) -> Vec<String> {
        let mut subfields = vec![];
        for field in &self.global.fields {
            match field.to_lowercase().as_str() {
                "spring" => subfields.extend(
                    [21, 22, 23, 0, 1, 2]
                        .into_iter()
                        .map(|i| format!("equator{i:02}")),
                ),
                "autumn" => subfields.extend((8..=15).map(|i| format!("equator{i:02}"))),
                _ => subfields.push(field.clone()),
            }
        }
        subfields.into_iter().unique().collect()
    }

    pub fn field_paths(&self, field: &str) -> FieldPaths {
        let tag = self.tag();
        let g = &self.global;
        let dir = g.paths.out.join(field);
        let cache_dir = dir.join("cache");
        FieldPaths {
            field: field.to_string(),
            mask: dir.join(format!("{}{tag}.hsp", g.maps.survey_mask)),
            deltag: dir.join(format!("{}{tag}.hsp", g.maps.deltag_maps)),
            ngal: dir.join(format!("{}{tag}.hsp", g.maps.ngal_maps)),
            systmaps_dir: dir.join("systmaps"),
            theory: g
                .cell_files
                .theory
                .as_ref()
                .map(|t| dir.join(format!("{t}{tag}.fits"))),
            workspace: cache_dir.join(format!("{}{tag}.fits", g.cache_files.workspaces.wsp)),
            cov_workspace: cache_dir
                .join(format!("{}{tag}.fits", g.cache_files.workspaces.covwsp)),
            covariances: dir.join(format!("{}{tag}.fits", g.cell_files.covariances)),
            main: g.cell_files.main.clone(),
            deprojected: g.cache_files.deproj.deprojected.clone(),
            alphas: g.cache_files.deproj.alphas.clone(),
            dir,
            cache_dir,
            tag,
        }
    }

    /// The systematics templates to deproject for a field, as file names
    /// inside its `systmaps` directory.
    pub fn systematics(&self, paths: &FieldPaths) -> Result<Vec<String>, ConfigError> {
        let ps = &self.power_spectra;
        let mut names: Vec<String> = if ps.systematics.is_all() {
            let nside = self.global.nside_hi;
            let patterns = [format!("*_{nside}.hsp"), format!("*_{nside}_*.hsp")];
            let found = get_sorted_matches_in_dir(&paths.systmaps_dir, &patterns)?;
            if found.is_empty() {
                warn!(
                    "No systematics maps found in {}",
                    paths.systmaps_dir.display()
                );
            }
            found
                .into_iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .collect()
        } else {
            ps.systematics.names().to_vec()
        };
        if let Some(max) = ps.nsyst_max {
            names.truncate(max);
        }
        debug!("{} systematics template(s) for {}", names.len(), paths.field);
        Ok(names)
    }
}
