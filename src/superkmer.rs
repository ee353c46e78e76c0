//! Super-k-mer packing: a run of consecutive canonical k-mers sharing one
//! minimizer, stored as two wide integers.
//!
//! Layout of the `(compacted, seed)` pair, for a run of `L` k-mers:
//! - `seed` is the forward strand of the first k-mer.
//! - `compacted` holds the last forward base of k-mers `1..L` as 2-bit
//!   digits, earliest k-mer in the most significant digit, in its low bits;
//!   the top 8 bits of the integer hold `L`.
//!
//! Decoding replays the run with the sliding two-strand recurrence, so
//! `decode(encode(run))` reproduces the records exactly.

use std::ops::Range;

use thiserror::Error;

use crate::model::{CanonicalKmer, KmerRecord};
use crate::encode::revcomp;
use crate::minimizer::MinimizerKmer;
use crate::wide::Wide;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SuperKmerError {
    /// The length byte and the 2-bit tail share one integer; past this the
    /// run must be split by the caller.
    #[error("run of {len} kmers exceeds the packing capacity of {max}")]
    RunTooLong { len: usize, max: usize },
    #[error("cannot encode an empty run")]
    EmptyRun,
}

/// Longest run one `(compacted, seed)` pair can hold at width `W`: the
/// 8-bit length field caps it at 255, and the tail digits must fit below
/// the length byte.
pub const fn max_run_len<const W: usize>() -> usize {
    let capacity = (64 * W - 8) / 2 + 1;
    if capacity < 255 { capacity } else { 255 }
}

/// One packed super-k-mer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedSuperKmer<const W: usize> {
    /// Tail bases of the run plus the run length in the top byte.
    pub compacted: Wide<W>,
    /// Forward strand of the first k-mer.
    pub seed: Wide<W>,
}

/// Append-only receiver for packed values; the persistence boundary of
/// this crate.
pub trait Sink<const W: usize> {
    fn insert(&mut self, value: Wide<W>);
}

impl<const W: usize> Sink<W> for Vec<Wide<W>> {
    #[inline]
    fn insert(&mut self, value: Wide<W>) {
        self.push(value);
    }
}

impl<const W: usize> EncodedSuperKmer<W> {
    /// Push the pair into a sink, compacted tail first.
    pub fn save<S: Sink<W>>(&self, sink: &mut S) {
        sink.insert(self.compacted);
        sink.insert(self.seed);
    }

    /// Pull one pair back from a stream of values written by [`save`].
    /// Returns `None` on a clean end of stream.
    ///
    /// [`save`]: EncodedSuperKmer::save
    pub fn load<I: Iterator<Item = Wide<W>>>(values: &mut I) -> Option<Self> {
        let compacted = values.next()?;
        let seed = values.next()?;
        Some(Self { compacted, seed })
    }
}

/// Pack a run of records sharing a minimizer. The records only need a
/// forward strand, so both plain canonical and minimizer-enriched records
/// encode directly.
pub fn encode_superkmer<const W: usize, K: KmerRecord<W>>(
    kmers: &[K],
) -> Result<EncodedSuperKmer<W>, SuperKmerError> {
    let len = kmers.len();
    if len == 0 {
        return Err(SuperKmerError::EmptyRun);
    }
    let max = max_run_len::<W>();
    if len > max {
        return Err(SuperKmerError::RunTooLong { len, max });
    }
    let nt_mask = Wide::from_u64(3);
    let mut compacted = Wide::ZERO;
    for kmer in &kmers[1..] {
        compacted = (compacted << 2) | (kmer.forward() & nt_mask);
    }
    compacted = compacted | (Wide::from_u64(len as u64) << (64 * W - 8));
    Ok(EncodedSuperKmer {
        compacted,
        seed: kmers[0].forward(),
    })
}

/// Unpack a super-k-mer into its canonical k-mer records, appending to
/// `out`. Returns the run length.
pub fn decode_superkmer<const W: usize>(
    record: &EncodedSuperKmer<W>,
    kmer_size: usize,
    out: &mut Vec<CanonicalKmer<W>>,
) -> usize {
    let len = ((record.compacted >> (64 * W - 8)).value() & 0xFF) as usize;
    if len == 0 {
        return 0;
    }
    let kmer_mask = Wide::mask(2 * kmer_size);
    let left_shift = 2 * (kmer_size - 1);

    let mut forward = record.seed;
    let mut reverse = revcomp(forward, kmer_size);
    out.push(CanonicalKmer::from_strands(forward, reverse));

    for i in 1..len {
        let nt = (record.compacted >> (2 * (len - 1 - i))).value() & 3;
        forward = ((forward << 2) + nt) & kmer_mask;
        reverse = ((reverse >> 2) | (Wide::from_u64(nt ^ 2) << left_shift)) & kmer_mask;
        out.push(CanonicalKmer::from_strands(forward, reverse));
    }
    len
}

/// Partition one sequence's minimizer-model output into maximal runs of
/// valid records sharing a minimizer value. Invalid records and windows
/// with no allowed minimizer break runs and belong to none.
pub fn split_superkmers<const W: usize, K: KmerRecord<W>>(
    kmers: &[MinimizerKmer<W, K>],
) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut open: Option<(usize, Wide<W>)> = None;
    for (i, kmer) in kmers.iter().enumerate() {
        let eligible = kmer.is_valid() && kmer.position() >= 0;
        open = match open {
            Some((start, mini)) if eligible && kmer.minimizer().value() == mini => {
                Some((start, mini))
            }
            Some((start, _)) => {
                runs.push(start..i);
                if eligible {
                    Some((i, kmer.minimizer().value()))
                } else {
                    None
                }
            }
            None if eligible => Some((i, kmer.minimizer().value())),
            None => None,
        };
    }
    if let Some((start, _)) = open {
        runs.push(start..kmers.len());
    }
    runs
}
