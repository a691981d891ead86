// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{borrow::Cow, path::PathBuf};

use clap::Parser;
use itertools::Itertools;
use log::info;

use super::{display_warnings, GcellsError, InfoPrinter, Warn};
use crate::{
    cache::DeprojectionState,
    cells::{Pairing, PowerSpectraParams},
    config::PipelineConfig,
};

#[derive(Parser, Debug)]
pub(super) struct PowerSpectraArgs {
    /// The pipeline configuration file (yaml, toml or json).
    #[clap(name = "CONFIG", parse(from_os_str))]
    pub(super) config: PathBuf,

    /// Only compute the power spectrum of this pairing of tomographic bins,
    /// e.g. "(0,1)". By default, every pairing is computed.
    #[clap(name = "PAIRING")]
    pub(super) pairing: Option<String>,
}

impl PowerSpectraArgs {
    pub(super) fn run(self, config: &PipelineConfig, dry_run: bool) -> Result<(), GcellsError> {
        let pairing = self
            .pairing
            .as_deref()
            .map(str::parse::<Pairing>)
            .transpose()?;
        for field in config.subfields() {
            let params = PowerSpectraParams::new(config, &field, pairing)?;
            display_params(&params);
            display_warnings();

            if dry_run {
                info!("Dry run -- not computing the power spectra of {field}");
                continue;
            }
            params.run()?;
        }
        Ok(())
    }
}

fn display_params(params: &PowerSpectraParams) {
    let mut printer = InfoPrinter::new(format!("Power spectra of {}", params.paths.field).into());
    printer.push_block(vec![
        format!("Mask: {}", params.paths.mask.display()).into(),
        format!("Density maps: {}", params.paths.deltag.display()).into(),
        format!("Galaxy counts: {}", params.paths.ngal.display()).into(),
        format!("{} tomographic bins", params.num_bins).into(),
    ]);
    printer.push_line(
        format!(
            "Bandpower edges: [{}]",
            params.bandpowers.edges().iter().join(", ")
        )
        .into(),
    );

    if params.template_ids.is_empty() {
        format!("No templates to deproject for {}", params.paths.field).warn();
    } else {
        let mut block: Vec<Cow<'static, str>> = vec![format!(
            "Deprojecting {} template(s) from {}",
            params.template_ids.len(),
            params.paths.systmaps_dir.display()
        )
        .into()];
        block.extend(
            params
                .template_ids
                .iter()
                .map(|id| format!("  {id}").into()),
        );
        printer.push_block(block);
        if params.lite {
            "Lite mode: the deprojection bias will not be computed".warn();
        }
    }
    match params.stellar_factor {
        Some(f) => printer.push_line(format!("Correcting for stars by a factor of {f:.6}").into()),
        None => printer.push_line("Not correcting for stars".into()),
    }

    let stale = params
        .pairings
        .iter()
        .filter(|(_, state)| *state == DeprojectionState::Stale)
        .map(|(p, _)| p.label())
        .collect::<Vec<_>>();
    printer.push_line(
        format!(
            "Pairings: {}",
            params.pairings.iter().map(|(p, _)| p.label()).join(" ")
        )
        .into(),
    );
    if params.recompute {
        "Ignoring anything cached, as requested".warn();
    } else if !stale.is_empty() {
        format!(
            "Deprojected templates changed since the last run of {}; recomputing everything",
            stale.join(" ")
        )
        .warn();
    }
    printer.display();
}
