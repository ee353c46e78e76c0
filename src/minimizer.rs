//! Minimizer layer: the smallest allowed m-mer inside each k-mer window.
//!
//! [`MinimizerModel`] wraps an inner sliding model (direct or canonical) and
//! enriches every emission with the current minimizer, its window position
//! and a change flag. Ranking goes through a per-m-mer fold (strand folding
//! for canonical inner models, then the low-complexity filter) that is
//! precomputed into a lookup table for small m.
//!
//! The sliding update is O(1) per k-mer: the freshly entered m-mer either
//! takes over, or the previous minimizer is still in the window, or a full
//! right-to-left rescan of the window runs.

use crate::encode::Decode;
use crate::model::{InnerModel, KmerModel, KmerRecord, ModelError};
use crate::wide::Wide;

/// Largest m for which the fold table is materialized (`4^m` entries);
/// larger m-mers are folded inline per extraction.
const MMER_LUT_MAX_M: usize = 12;

/// Minimizer sizes must fit the `u64` ranking word used by the
/// low-complexity filter and the table index.
const MMER_MAX_M: usize = 31;

/// Low-complexity filter: rejects m-mers holding an "AA" dinucleotide at
/// any interior position, which prunes the most frequent minimizers.
///
/// The bit trick folds each 2-bit digit with its right neighbor; a digit
/// pair that is all zeroes after `~(x | x >> 2)` marks two consecutive A's.
#[inline]
pub fn is_allowed(mmer: u64, m: usize) -> bool {
    if m < 2 {
        return true;
    }
    let pair_mask = 0x5555_5555_5555_5555u64 & ((1u64 << (2 * (m - 2))) - 1);
    let folded = !(mmer | (mmer >> 2));
    (folded >> 1) & folded & pair_mask == 0
}

/// Ranking order for minimizers. `init` yields the value every real
/// minimizer must beat, which doubles as the "no minimizer" default; the
/// m-mer mask sentinel must compare greater than every allowed m-mer.
pub trait MinimizerOrd<const W: usize> {
    fn init(&self, mmer_max: Wide<W>) -> Wide<W> {
        mmer_max
    }

    /// Strict weak ordering; true when `current` outranks `best`.
    fn less(&self, current: &Wide<W>, best: &Wide<W>) -> bool;
}

/// Default ranking: plain unsigned comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexMinimizer;

impl<const W: usize> MinimizerOrd<W> for LexMinimizer {
    #[inline]
    fn less(&self, current: &Wide<W>, best: &Wide<W>) -> bool {
        current < best
    }
}

/// A base-model record enriched with its minimizer.
///
/// `position` is the minimizer's window index counted from the left, in
/// `[-1, k-m]`; -1 means no allowed m-mer exists in the window. `changed`
/// is true on emissions where the minimizer differs from the previous
/// emission (and on the first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimizerKmer<const W: usize, K> {
    base: K,
    minimizer: K,
    position: i16,
    changed: bool,
}

impl<const W: usize, K: KmerRecord<W>> MinimizerKmer<W, K> {
    #[inline]
    pub fn base(&self) -> &K {
        &self.base
    }

    /// The minimizer as an m-mer record of the inner model's kind.
    #[inline]
    pub fn minimizer(&self) -> &K {
        &self.minimizer
    }

    #[inline]
    pub fn position(&self) -> i16 {
        self.position
    }

    #[inline]
    pub fn has_changed(&self) -> bool {
        self.changed
    }
}

impl<const W: usize, K: KmerRecord<W>> KmerRecord<W> for MinimizerKmer<W, K> {
    #[inline]
    fn value(&self) -> Wide<W> {
        self.base.value()
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.base.is_valid()
    }

    #[inline]
    fn forward(&self) -> Wide<W> {
        self.base.forward()
    }

    fn from_value(v: Wide<W>) -> Self {
        Self {
            base: K::from_value(v),
            minimizer: K::from_value(v),
            position: -1,
            changed: false,
        }
    }

    #[inline]
    fn shift_right(&mut self) {
        self.base.shift_right();
    }
}

enum MmerFold<const W: usize> {
    /// Folded value per m-mer index, `4^m` entries.
    Table(Vec<Wide<W>>),
    /// Fold recomputed per extraction (large m).
    Inline,
}

/// Sliding model tracking the minimizer of each k-mer window.
///
/// Owns the fold table exclusively; dropping the model releases it. The
/// model is not `Clone` so the table is never duplicated by accident.
pub struct MinimizerModel<const W: usize, M: InnerModel<W>, C: MinimizerOrd<W> = LexMinimizer> {
    kmer_model: M,
    mmer_model: M,
    cmp: C,
    /// Number of m-mers inside one k-mer window: `k - m + 1`.
    nb_mmers: usize,
    mmer_mask: Wide<W>,
    fold: MmerFold<W>,
    minimizer_default: Wide<W>,
}

impl<const W: usize, M: InnerModel<W>, C: MinimizerOrd<W>> MinimizerModel<W, M, C> {
    pub fn new(k: usize, m: usize) -> Result<Self, ModelError>
    where
        C: Default,
    {
        Self::with_comparator(k, m, C::default())
    }

    pub fn with_comparator(k: usize, m: usize, cmp: C) -> Result<Self, ModelError> {
        if k <= m || m > MMER_MAX_M {
            return Err(ModelError::BadSizes { k, m });
        }
        let kmer_model = M::with_kmer_size(k)?;
        let mmer_model = M::with_kmer_size(m)?;
        let mmer_mask = Wide::mask(2 * m);
        let minimizer_default = cmp.init(mmer_mask);
        let fold = if m <= MMER_LUT_MAX_M {
            let entries = 1usize << (2 * m);
            let mut table = Vec::with_capacity(entries);
            for i in 0..entries {
                table.push(mmer_model.fold_minimizer(Wide::from_u64(i as u64)));
            }
            MmerFold::Table(table)
        } else {
            MmerFold::Inline
        };
        Ok(Self {
            kmer_model,
            mmer_model,
            cmp,
            nb_mmers: k - m + 1,
            mmer_mask,
            fold,
            minimizer_default,
        })
    }

    /// The inner model handling m-mers.
    pub fn mmer_model(&self) -> &M {
        &self.mmer_model
    }

    pub fn minimizer_size(&self) -> usize {
        self.mmer_model.kmer_size()
    }

    /// Number of m-mer positions inside one k-mer window.
    pub fn window(&self) -> usize {
        self.nb_mmers
    }

    /// The value reported when a window holds no allowed m-mer.
    pub fn minimizer_default(&self) -> Wide<W> {
        self.minimizer_default
    }

    #[inline]
    fn fold_mmer(&self, raw: Wide<W>) -> Wide<W> {
        match &self.fold {
            MmerFold::Table(table) => table[raw.value() as usize],
            MmerFold::Inline => self.mmer_model.fold_minimizer(raw),
        }
    }

    /// Full scan of the window, right to left. Updates on strict ranking
    /// only, so among equal minima the rightmost one is kept.
    fn rescan(&self, kmer: &mut MinimizerKmer<W, M::Kmer>) {
        kmer.minimizer = M::Kmer::from_value(self.minimizer_default);
        kmer.position = -1;
        kmer.changed = true;
        let mut scratch = kmer.base;
        for idx in (0..self.nb_mmers).rev() {
            let mmer = self.fold_mmer(scratch.forward() & self.mmer_mask);
            if self.cmp.less(&mmer, &kmer.minimizer.value()) {
                kmer.minimizer = M::Kmer::from_value(mmer);
                kmer.position = idx as i16;
            }
            scratch.shift_right();
        }
    }

    /// Minimizer of a bare k-mer value, via a fresh window scan. Returns
    /// the default sentinel when no m-mer is allowed.
    pub fn minimizer_of(&self, value: Wide<W>) -> Wide<W> {
        let mut kmer: MinimizerKmer<W, M::Kmer> = KmerRecord::from_value(value);
        self.rescan(&mut kmer);
        kmer.minimizer.value()
    }
}

impl<const W: usize, M: InnerModel<W>, C: MinimizerOrd<W>> KmerModel<W>
    for MinimizerModel<W, M, C>
{
    type Kmer = MinimizerKmer<W, M::Kmer>;

    #[inline]
    fn kmer_size(&self) -> usize {
        self.kmer_model.kmer_size()
    }

    #[inline]
    fn kmer_mask(&self) -> Wide<W> {
        self.kmer_model.kmer_mask()
    }

    fn first_with<D: Decode>(&self, bytes: &[u8]) -> (Self::Kmer, i32) {
        let (base, bad_idx) = self.kmer_model.first_with::<D>(bytes);
        let mut kmer = MinimizerKmer {
            base,
            minimizer: M::Kmer::from_value(self.minimizer_default),
            position: -1,
            changed: false,
        };
        self.rescan(&mut kmer);
        (kmer, bad_idx)
    }

    fn next_with(&self, code: u8, kmer: &mut Self::Kmer, valid: bool) {
        self.kmer_model.next_with(code, &mut kmer.base, valid);

        let mmer = self.fold_mmer(kmer.base.forward() & self.mmer_mask);
        kmer.position -= 1;

        if self.cmp.less(&mmer, &kmer.minimizer.value()) {
            // The entering m-mer outranks everything still in the window.
            kmer.minimizer = M::Kmer::from_value(mmer);
            kmer.position = (self.nb_mmers - 1) as i16;
            kmer.changed = true;
        } else if kmer.position < 0 {
            // The previous minimizer slid out of the window.
            self.rescan(kmer);
        } else {
            kmer.changed = false;
        }
    }

    fn fold_minimizer(&self, raw: Wide<W>) -> Wide<W> {
        self.mmer_model.fold_minimizer(raw)
    }
}
