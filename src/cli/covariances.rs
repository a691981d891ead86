// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::info;

use super::{display_warnings, GcellsError, InfoPrinter, Warn};
use crate::{cells::CovariancesParams, config::PipelineConfig};

#[derive(Parser, Debug)]
pub(super) struct CovariancesArgs {
    /// The pipeline configuration file (yaml, toml or json). It must be the
    /// same as that given to power-spectra.
    #[clap(name = "CONFIG", parse(from_os_str))]
    pub(super) config: PathBuf,
}

impl CovariancesArgs {
    pub(super) fn run(self, config: &PipelineConfig, dry_run: bool) -> Result<(), GcellsError> {
        for field in config.subfields() {
            let params = CovariancesParams::new(config, &field)?;

            let mut printer = InfoPrinter::new(format!("Covariances of {field}").into());
            printer.push_block(vec![
                format!("{} tomographic bins", params.num_bins).into(),
                format!("{} covariance blocks", params.blocks().len()).into(),
            ]);
            printer.push_line(format!("Output: {}", params.paths.covariances.display()).into());
            printer.display();
            if !params.paths.workspace.exists() {
                format!(
                    "No cached workspace for {field} yet; power-spectra must be run first"
                )
                .warn();
            }
            display_warnings();

            if dry_run {
                info!("Dry run -- not computing the covariances of {field}");
                continue;
            }
            params.run()?;
        }
        Ok(())
    }
}
