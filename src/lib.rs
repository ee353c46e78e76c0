//! K-mer models for genome assembly pipelines (edition 2024).
//!
//! This crate is the model layer a counting/graph toolkit sits on:
//! - Sliding forward ([`DirectModel`]) and strand-folded
//!   ([`CanonicalModel`]) k-mer extraction in one linear pass
//! - Minimizer tracking over the validity-filtered m-mer space
//!   ([`MinimizerModel`]), with a precomputed fold table for small m
//! - Super-k-mer packing of minimizer-sharing runs into two wide integers,
//!   plus the `.skm` on-disk container (streamed and mmap readers)
//! - Integer width selected per k via `const` generics: `Wide<1>` through
//!   `Wide<4>` cover k up to 31, 63, 95 and 127
//!
//! Models are immutable after construction and freely shared across
//! threads; `build_superkmers_sync` does exactly that over a rayon pool.
//!
//! Base codes follow A=0, C=1, T=2, G=3, so a complement is `code ^ 2`.

mod builder;
pub mod encode;
mod io;
mod minimizer;
mod model;
mod superkmer;
mod wide;

pub use crate::builder::{BuildConfig, BuildError, build_superkmers_sync};
pub use crate::encode::{Encoding, Seq, complement, revcomp};
pub use crate::io::{FileHeader, SkmError, SuperKmerFile, SuperKmerWriter, read_superkmers};
pub use crate::minimizer::{
    LexMinimizer, MinimizerKmer, MinimizerModel, MinimizerOrd, is_allowed,
};
pub use crate::model::{
    CanonicalKmer, CanonicalModel, Count, DirectKmer, DirectModel, InnerModel, KmerModel,
    KmerRecord, ModelError,
};
pub use crate::superkmer::{
    EncodedSuperKmer, Sink, SuperKmerError, decode_superkmer, encode_superkmer, max_run_len,
    split_superkmers,
};
pub use crate::wide::{Wide, Wide64, Wide128, Wide192, Wide256};

/// Number of limbs needed for k-mers of size `k` (one span unit per 32
/// bases). Widths 1 through 4 are the supported range.
pub const fn limbs_for_kmer_size(k: usize) -> usize {
    k / 32 + 1
}
