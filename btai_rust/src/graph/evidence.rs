//! Loading observations from `<name> <index>` evidence files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use super::node::VarKind;
use super::FactorGraph;
use crate::distributions::Categorical;
use crate::error::{BtaiError, Result};
use crate::math::one_hot;

impl FactorGraph {
    /// Clamps every observed variable named in `reader` to a one-hot vector
    /// of length `n_obs`.
    ///
    /// Blank lines are skipped and names matching no variable are ignored.
    /// Returns the number of variables updated.
    pub fn load_evidence<R: BufRead>(&mut self, n_obs: usize, reader: R) -> Result<usize> {
        let mut updated = 0;
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let format_error = || BtaiError::EvidenceFormat {
                line: number + 1,
                content: line.clone(),
            };
            let (name, index) = trimmed.split_once(' ').ok_or_else(format_error)?;
            let index: usize = index.trim().parse().map_err(|_| format_error())?;
            let evidence = one_hot(n_obs, index)?;

            for id in self.var_ids() {
                let node = self.var_mut(id)?;
                if node.kind != VarKind::Observed || node.name.as_deref() != Some(name) {
                    continue;
                }
                if node.n_states() != n_obs {
                    return Err(BtaiError::ShapeMismatch {
                        expected: vec![node.n_states()],
                        found: vec![n_obs],
                    });
                }
                node.posterior = Categorical::new(evidence.clone()).into();
                updated += 1;
            }
        }
        debug!(updated, "evidence loaded");
        Ok(updated)
    }

    /// Same as [`FactorGraph::load_evidence`], reading from a file.
    pub fn load_evidence_file(&mut self, n_obs: usize, path: impl AsRef<Path>) -> Result<usize> {
        let file = File::open(path)?;
        self.load_evidence(n_obs, BufReader::new(file))
    }
}
