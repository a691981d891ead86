// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! File stuff (FITS helpers, sparse maps, globs).

pub mod fits;
mod glob;
pub mod sparse_map;

pub(crate) use self::glob::{get_sorted_matches_in_dir, GlobError};
