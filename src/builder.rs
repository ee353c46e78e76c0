//! Batch pipeline: many sequences in, encoded super-k-mers out, in parallel.
//!
//! One shared model drives a rayon pool; each sequence is scanned with the
//! canonical minimizer model, partitioned into runs, and the runs are packed
//! (long runs are split at the packing capacity first). Output order follows
//! input order.

use rayon::prelude::*;
use thiserror::Error;

use crate::encode::Seq;
use crate::minimizer::MinimizerModel;
use crate::model::{CanonicalModel, KmerModel, ModelError};
use crate::superkmer::{
    EncodedSuperKmer, SuperKmerError, encode_superkmer, max_run_len, split_superkmers,
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    SuperKmer(#[from] SuperKmerError),
}

/// Build-time configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    minimizer_size: usize,
    threads: Option<usize>,
    min_seq_len: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            minimizer_size: 8,
            threads: None,
            min_seq_len: 0,
        }
    }
}

impl BuildConfig {
    /// Set the minimizer size (default 8; must stay below k).
    pub fn minimizer_size(mut self, m: usize) -> Self {
        self.minimizer_size = m;
        self
    }

    /// Fix the number of rayon threads.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    /// Minimum sequence length to consider (shorter sequences are skipped).
    pub fn min_seq_len(mut self, n: usize) -> Self {
        self.min_seq_len = n;
        self
    }
}

/// Scan ASCII sequences into encoded super-k-mers, in input order.
pub fn build_superkmers_sync<const W: usize>(
    seqs: &[&[u8]],
    k: usize,
    cfg: &BuildConfig,
) -> Result<Vec<EncodedSuperKmer<W>>, BuildError> {
    let model = MinimizerModel::<W, CanonicalModel<W>>::new(k, cfg.minimizer_size)?;

    if let Some(n) = cfg.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
    }

    let per_seq: Vec<Vec<EncodedSuperKmer<W>>> = seqs
        .par_iter()
        .map(|seq| {
            if seq.len() < cfg.min_seq_len || seq.len() < k {
                return Ok(Vec::new());
            }
            let mut kmers = Vec::new();
            model.build(&Seq::ascii(seq), &mut kmers);

            let mut out = Vec::new();
            for run in split_superkmers(&kmers) {
                let mut start = run.start;
                while start < run.end {
                    let end = (start + max_run_len::<W>()).min(run.end);
                    out.push(encode_superkmer(&kmers[start..end])?);
                    start = end;
                }
            }
            Ok(out)
        })
        .collect::<Result<_, SuperKmerError>>()?;

    Ok(per_seq.into_iter().flatten().collect())
}
