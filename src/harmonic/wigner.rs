// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Wigner 3j symbols with all `m = 0`.

/// Squared Wigner 3j symbols `(l1 l2 l3; 0 0 0)^2`, evaluated from a table of
/// log-factorials.
pub(crate) struct Wigner3j0 {
    ln_factorial: Vec<f64>,
}

impl Wigner3j0 {
    /// Prepare for symbols with `l1 + l2 + l3 <= max_l_sum`.
    pub(crate) fn new(max_l_sum: usize) -> Wigner3j0 {
        let mut ln_factorial = Vec::with_capacity(max_l_sum + 2);
        ln_factorial.push(0.0);
        for n in 1..=max_l_sum + 1 {
            let prev = ln_factorial[n - 1];
            ln_factorial.push(prev + (n as f64).ln());
        }
        Wigner3j0 { ln_factorial }
    }

    pub(crate) fn squared(&self, l1: usize, l2: usize, l3: usize) -> f64 {
        let big_l = l1 + l2 + l3;
        // Odd sums vanish, as does anything violating the triangle rule.
        if big_l % 2 == 1 || l3 > l1 + l2 || l3 < l1.abs_diff(l2) {
            return 0.0;
        }
        debug_assert!(
            big_l + 1 < self.ln_factorial.len(),
            "l1 + l2 + l3 = {big_l} is beyond this table"
        );
        let half = big_l / 2;
        let f = &self.ln_factorial;
        let ln_sq = f[big_l - 2 * l1] + f[big_l - 2 * l2] + f[big_l - 2 * l3] - f[big_l + 1]
            + 2.0 * (f[half] - f[half - l1] - f[half - l2] - f[half - l3]);
        ln_sq.exp()
    }
}
