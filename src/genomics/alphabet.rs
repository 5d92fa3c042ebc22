//! Shared DNA alphabet and checkpointed rank index.
//!
//! A [`BaseCode`] is the 2-bit-plus-ambiguity code used everywhere in this
//! crate: 0=A, 1=C, 2=G, 3=T, 4=N. [`RankSelectIndex`] builds a checkpointed
//! prefix-count table over a [`CompressedDNA`](super::compressed_dna::CompressedDNA)
//! sequence so that rank queries cost `O(stride)` instead of `O(n)`.

use crate::genomics::compressed_dna::CompressedDNA;

/// Number of canonical DNA symbols tracked in rank/select (A, C, G, T, N).
pub const ALPHABET_SIZE: usize = 5;
/// Default number of bases between checkpoints.
pub const CHECKPOINT_STRIDE: usize = 256;

/// Enumeration representing base codes used for rank/select queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseCode {
    /// Adenine.
    A = 0,
    /// Cytosine.
    C = 1,
    /// Guanine.
    G = 2,
    /// Thymine/Uracil.
    T = 3,
    /// Ambiguous base (`N`).
    N = 4,
}

impl BaseCode {
    /// Attempt to parse an ASCII base into a [`BaseCode`].
    pub fn from_ascii(base: u8) -> Option<Self> {
        match base {
            b'A' | b'a' => Some(BaseCode::A),
            b'C' | b'c' => Some(BaseCode::C),
            b'G' | b'g' => Some(BaseCode::G),
            b'T' | b't' | b'U' | b'u' => Some(BaseCode::T),
            b'N' | b'n' => Some(BaseCode::N),
            _ => None,
        }
    }

    /// Convert the base code to an index into rank/select tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Uppercase ASCII representation.
    pub fn to_ascii(self) -> u8 {
        match self {
            BaseCode::A => b'A',
            BaseCode::C => b'C',
            BaseCode::G => b'G',
            BaseCode::T => b'T',
            BaseCode::N => b'N',
        }
    }

    /// Watson-Crick complement. `N` complements to itself.
    pub fn complement(self) -> Self {
        match self {
            BaseCode::A => BaseCode::T,
            BaseCode::C => BaseCode::G,
            BaseCode::G => BaseCode::C,
            BaseCode::T => BaseCode::A,
            BaseCode::N => BaseCode::N,
        }
    }

    /// All four canonical bases in lexicographic order, excluding `N`.
    pub fn canonical() -> [BaseCode; 4] {
        [BaseCode::A, BaseCode::C, BaseCode::G, BaseCode::T]
    }
}

/// Prefix-sum checkpoint for rank queries.
#[derive(Debug, Clone)]
struct RankSelectCheckpoint {
    counts: [u32; ALPHABET_SIZE],
}

/// Rank/select index built over a [`CompressedDNA`] sequence.
#[derive(Debug, Clone)]
pub struct RankSelectIndex {
    stride: usize,
    checkpoints: Vec<RankSelectCheckpoint>,
    totals: [u32; ALPHABET_SIZE],
}

impl RankSelectIndex {
    /// Construct an index with the default stride.
    pub fn build(sequence: &CompressedDNA) -> Self {
        Self::build_with_stride(sequence, CHECKPOINT_STRIDE)
    }

    /// Construct an index with the provided stride.
    pub fn build_with_stride(sequence: &CompressedDNA, stride: usize) -> Self {
        assert!(stride > 0, "stride must be greater than zero");

        let mut checkpoints = Vec::new();
        let mut counts = [0u32; ALPHABET_SIZE];
        checkpoints.push(RankSelectCheckpoint { counts });

        for idx in 0..sequence.len() {
            if idx % stride == 0 && idx != 0 {
                checkpoints.push(RankSelectCheckpoint { counts });
            }
            let symbol = sequence.code_at(idx).unwrap_or(BaseCode::N);
            counts[symbol.index()] += 1;
        }

        checkpoints.push(RankSelectCheckpoint { counts });

        Self {
            stride,
            checkpoints,
            totals: counts,
        }
    }

    /// Number of bases between checkpoints.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Total cumulative counts for each symbol.
    pub fn totals(&self) -> [u32; ALPHABET_SIZE] {
        self.totals
    }

    /// Rank query: count of `base` in `sequence[..position)`.
    pub fn rank(&self, sequence: &CompressedDNA, base: BaseCode, position: usize) -> u32 {
        self.rank_all(sequence, position)[base.index()]
    }

    /// Rank query returning counts for all bases in one pass.
    pub fn rank_all(&self, sequence: &CompressedDNA, position: usize) -> [u32; ALPHABET_SIZE] {
        let bounded = position.min(sequence.len());
        let checkpoint_idx = bounded / self.stride;
        let remainder_start = checkpoint_idx * self.stride;

        let mut counts = self.checkpoints[checkpoint_idx].counts;
        for idx in remainder_start..bounded {
            let symbol = sequence.code_at(idx).unwrap_or(BaseCode::N);
            counts[symbol.index()] += 1;
        }
        counts
    }
}
