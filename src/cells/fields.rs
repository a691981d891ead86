// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{collections::BTreeMap, sync::Arc};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use ndarray::prelude::*;

use super::CellsError;
use crate::{harmonic::Field, PROGRESS_BARS};

/// The fields of some tomographic bins, with and without template
/// deprojection, keyed by bin.
#[derive(Debug)]
pub struct FieldSet {
    plain: BTreeMap<usize, Field>,

    /// Only built if there are templates; otherwise the plain fields serve as
    /// the deprojected fields.
    deprojected: Option<BTreeMap<usize, Field>>,
}

impl FieldSet {
    /// Build the fields from the (unmasked) density maps of some bins and the
    /// templates. The maps and templates are consumed and freed once every
    /// field exists.
    pub fn build(
        mask: Arc<Array1<f64>>,
        maps: Vec<(usize, Array1<f64>)>,
        templates: Vec<Array1<f64>>,
        nside: u32,
        lite: bool,
    ) -> Result<FieldSet, CellsError> {
        let num_fields = if templates.is_empty() {
            maps.len()
        } else {
            2 * maps.len()
        };
        info!(
            "Creating {num_fields} fields ({} template(s), lite: {lite})",
            templates.len()
        );
        let pb = ProgressBar::with_draw_target(
            Some(num_fields as _),
            if PROGRESS_BARS.load() {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:16}: [{wide_bar:.blue}] {pos:2}/{len:2} fields ({elapsed_precise}<{eta_precise})")
                .unwrap()
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message("Building fields");

        let mut plain = BTreeMap::new();
        let mut deprojected = BTreeMap::new();
        for (bin, map) in &maps {
            debug!("Building the field of bin {bin}");
            plain.insert(*bin, Field::new(mask.clone(), map.view(), &[], nside, lite)?);
            pb.inc(1);
            if !templates.is_empty() {
                deprojected.insert(
                    *bin,
                    Field::new(mask.clone(), map.view(), &templates, nside, lite)?,
                );
                pb.inc(1);
            }
        }
        pb.finish();
        drop(maps);
        drop(templates);

        Ok(FieldSet {
            plain,
            deprojected: if deprojected.is_empty() {
                None
            } else {
                Some(deprojected)
            },
        })
    }

    /// The bins with fields, in ascending order.
    pub fn bins(&self) -> Vec<usize> {
        self.plain.keys().copied().collect()
    }

    pub fn has_templates(&self) -> bool {
        self.deprojected.is_some()
    }

    /// The field of `bin` without any deprojection. Panics if `bin` wasn't
    /// built.
    pub fn plain(&self, bin: usize) -> &Field {
        &self.plain[&bin]
    }

    /// The field of `bin` with templates deprojected, if there are any.
    pub fn deprojected(&self, bin: usize) -> &Field {
        match &self.deprojected {
            Some(fields) => &fields[&bin],
            None => &self.plain[&bin],
        }
    }
}
