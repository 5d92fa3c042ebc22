//! Bidirectional FM-index over the reference text.
//!
//! Rather than maintaining a single BWT with the classical Lam et al.
//! cross-interval update rule, this index keeps two independent occurrence
//! tables:
//!
//! - `forward`: built over `BWT(T)`, where `T` is the reference text. Its
//!   native backward search *prepends* a base to the current match, i.e. it
//!   implements [`FmIndex::extend_left`].
//! - `reverse`: built over `BWT(reverse(T))`. Backward search on this table
//!   walks the *reversed* pattern, and prepending a base to `reverse(P)` is
//!   the same operation as appending a base to `P`. So this table implements
//!   [`FmIndex::extend_right`].
//!
//! Each table is itself a blocked rank structure: the BWT is cut into fixed
//! `block_size` chunks, each holding a 2-bit-packed copy of its slice plus a
//! checkpointed rank index (see [`crate::genomics::alphabet`]), and the
//! boundary between chunks carries the cumulative symbol counts seen so far.
//! A rank query therefore costs the checkpoint stride plus one block scan
//! instead of a full linear scan.
//!
//! Suffix-array sampling on the forward table (every [`SA_SAMPLE_STRIDE`]
//! rows) plus an LF-mapping walk lets [`FmIndex::locate`] recover an absolute
//! text position from a BWT row without storing the full suffix array.

use std::cmp::Ordering;

use thiserror::Error;

use crate::genomics::alphabet::{BaseCode, RankSelectIndex, ALPHABET_SIZE};
use crate::genomics::compressed_dna::{CompressedDNA, CompressedDNAError};

const SENTINEL_BYTE: u8 = b'$';
/// Default spacing between sampled suffix-array rows on the forward table.
pub const SA_SAMPLE_STRIDE: usize = 32;
/// Default number of BWT characters per occurrence-table block.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Error type returned by FM-index construction and queries.
#[derive(Debug, Error)]
pub enum FMIndexError {
    /// Reference sequence was empty.
    #[error("reference sequence must be non-empty")]
    EmptyReference,

    /// Encountered an unsupported character in the input.
    #[error("unsupported character '{ch}' at position {position}")]
    UnsupportedCharacter {
        /// Character that could not be encoded.
        ch: char,
        /// Position within the reference where the character was observed.
        position: usize,
    },

    /// Block size was zero.
    #[error("block size must be greater than zero")]
    InvalidBlockSize,

    /// Sample stride was zero.
    #[error("suffix-array sample stride must be greater than zero")]
    InvalidSampleStride,

    /// Compression failure bubbling up from `CompressedDNA`.
    #[error("compression error: {0}")]
    Compression(#[from] CompressedDNAError),
}

/// Symbol used in FM-index queries (includes the sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmSymbol {
    /// The unique sentinel symbol `$`.
    Sentinel,
    /// One of the canonical DNA bases (or `N`).
    Base(BaseCode),
}

impl FmSymbol {
    /// Lexicographic order for the cumulative C table: `$` < A < C < G < T < N.
    fn order(&self) -> usize {
        match self {
            FmSymbol::Sentinel => 0,
            FmSymbol::Base(BaseCode::A) => 1,
            FmSymbol::Base(BaseCode::C) => 2,
            FmSymbol::Base(BaseCode::G) => 3,
            FmSymbol::Base(BaseCode::T) => 4,
            FmSymbol::Base(BaseCode::N) => 5,
        }
    }
}

/// Delimits the start of a block and carries cumulative counts at that point.
#[derive(Debug, Clone)]
struct BlockBoundary {
    cumulative_counts: [u32; ALPHABET_SIZE],
    sentinel_count: u32,
}

/// A block of a BWT string with a precomputed checkpointed rank index.
#[derive(Debug, Clone)]
struct BwtBlock {
    start: usize,
    end: usize,
    bwt: CompressedDNA,
    occ: RankSelectIndex,
    sentinel_offset: Option<usize>,
}

impl BwtBlock {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn rank_symbol(&self, symbol: FmSymbol, position: usize) -> u32 {
        let bounded = position.min(self.len());
        match symbol {
            FmSymbol::Sentinel => match self.sentinel_offset {
                Some(offset) if offset < bounded => 1,
                _ => 0,
            },
            FmSymbol::Base(code) => {
                let mut count = self.occ.rank(&self.bwt, code, bounded);
                if code == BaseCode::N {
                    if let Some(offset) = self.sentinel_offset {
                        if offset < bounded {
                            count = count.saturating_sub(1);
                        }
                    }
                }
                count
            }
        }
    }

    fn symbol_at(&self, local_offset: usize) -> FmSymbol {
        if self.sentinel_offset == Some(local_offset) {
            return FmSymbol::Sentinel;
        }
        FmSymbol::Base(self.bwt.code_at(local_offset).unwrap_or(BaseCode::N))
    }
}

/// A half-open suffix-array interval `[l, u)` together with the length of
/// the pattern that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaInterval {
    /// Lower bound (inclusive).
    pub l: u64,
    /// Upper bound (exclusive).
    pub u: u64,
    /// Length of the pattern matched so far.
    pub pattern_len: usize,
}

impl SaInterval {
    /// Number of suffix-array rows covered by this interval.
    pub fn size(&self) -> u64 {
        self.u.saturating_sub(self.l)
    }

    /// True when no suffixes match.
    pub fn is_empty(&self) -> bool {
        self.u <= self.l
    }
}

/// One blocked occurrence table over a single BWT string.
#[derive(Debug, Clone)]
struct OccTable {
    blocks: Vec<BwtBlock>,
    boundaries: Vec<BlockBoundary>,
    c_table: [u64; 7],
    block_size: usize,
    bwt_len: usize,
}

impl OccTable {
    fn build(bwt: &[u8], block_size: usize) -> Result<Self, FMIndexError> {
        if block_size == 0 {
            return Err(FMIndexError::InvalidBlockSize);
        }

        let bwt_len = bwt.len();
        let mut blocks = Vec::new();
        let mut boundaries = Vec::new();
        let mut cumulative_counts = [0u32; ALPHABET_SIZE];
        let mut sentinel_cumulative = 0u32;

        for (block_idx, chunk) in bwt.chunks(block_size).enumerate() {
            let start = block_idx * block_size;
            let end = start + chunk.len();

            boundaries.push(BlockBoundary {
                cumulative_counts,
                sentinel_count: sentinel_cumulative,
            });

            let mut sanitized = Vec::with_capacity(chunk.len());
            let mut sentinel_offset = None;

            for (offset, &ch) in chunk.iter().enumerate() {
                if ch == SENTINEL_BYTE {
                    sentinel_offset = Some(offset);
                    sentinel_cumulative += 1;
                    sanitized.push(b'N');
                    continue;
                }
                if BaseCode::from_ascii(ch).is_none() {
                    return Err(FMIndexError::UnsupportedCharacter {
                        ch: ch as char,
                        position: start + offset,
                    });
                }
                sanitized.push(ch);
            }

            let bwt_compressed = CompressedDNA::compress(&sanitized)?;
            let occ = RankSelectIndex::build(&bwt_compressed);
            let mut block_counts = occ.rank_all(&bwt_compressed, chunk.len());
            if sentinel_offset.is_some() && block_counts[BaseCode::N.index()] > 0 {
                block_counts[BaseCode::N.index()] -= 1;
            }

            blocks.push(BwtBlock {
                start,
                end,
                bwt: bwt_compressed,
                occ,
                sentinel_offset,
            });

            cumulative_counts = add_counts(cumulative_counts, block_counts);
        }

        boundaries.push(BlockBoundary {
            cumulative_counts,
            sentinel_count: sentinel_cumulative,
        });

        let c_table = build_c_table(cumulative_counts);

        Ok(Self {
            blocks,
            boundaries,
            c_table,
            block_size,
            bwt_len,
        })
    }

    fn len(&self) -> usize {
        self.bwt_len
    }

    fn rank(&self, symbol: FmSymbol, position: usize) -> u64 {
        let bounded = position.min(self.bwt_len);
        let block_idx = bounded / self.block_size;
        let boundary = &self.boundaries[block_idx];

        let mut count = match symbol {
            FmSymbol::Sentinel => boundary.sentinel_count,
            FmSymbol::Base(code) => boundary.cumulative_counts[code.index()],
        } as u64;

        if let Some(block) = self.blocks.get(block_idx) {
            let within = bounded - block.start;
            count += block.rank_symbol(symbol, within) as u64;
        }

        count
    }

    fn symbol_at(&self, row: usize) -> FmSymbol {
        let block_idx = row / self.block_size;
        let block = &self.blocks[block_idx];
        block.symbol_at(row - block.start)
    }

    /// LF-mapping: row of the suffix obtained by stripping the first
    /// character off the suffix at `row`.
    fn lf(&self, row: usize) -> usize {
        let symbol = self.symbol_at(row);
        let rank = self.rank(symbol, row);
        (self.c_table[symbol.order()] + rank) as usize
    }

    fn extend(&self, interval: SaInterval, base: BaseCode) -> SaInterval {
        let symbol = FmSymbol::Base(base);
        let c = self.c_table[symbol.order()];
        let l = c + self.rank(symbol, interval.l as usize);
        let u = c + self.rank(symbol, interval.u as usize);
        SaInterval {
            l,
            u,
            pattern_len: interval.pattern_len + 1,
        }
    }

    fn full_interval(&self) -> SaInterval {
        SaInterval {
            l: 0,
            u: self.bwt_len as u64,
            pattern_len: 0,
        }
    }
}

/// Bidirectional FM-index built over a reference text.
#[derive(Debug, Clone)]
pub struct FmIndex {
    forward: OccTable,
    reverse: OccTable,
    sa_samples: Vec<Option<u64>>,
    sample_stride: usize,
    text_len: usize,
}

impl FmIndex {
    /// Build a bidirectional FM-index with default block size and SA sample
    /// stride.
    pub fn build(text: &CompressedDNA) -> Result<Self, FMIndexError> {
        Self::build_with_params(text, DEFAULT_BLOCK_SIZE, SA_SAMPLE_STRIDE)
    }

    /// Build a bidirectional FM-index with explicit block size and SA sample
    /// stride.
    pub fn build_with_params(
        text: &CompressedDNA,
        block_size: usize,
        sample_stride: usize,
    ) -> Result<Self, FMIndexError> {
        if text.is_empty() {
            return Err(FMIndexError::EmptyReference);
        }
        if sample_stride == 0 {
            return Err(FMIndexError::InvalidSampleStride);
        }

        let mut forward_text = text.to_vec();
        forward_text.push(SENTINEL_BYTE);

        let sa = build_suffix_array(&forward_text);
        let (forward_bwt, _) = build_bwt_from_sa(&forward_text, &sa);
        let forward = OccTable::build(&forward_bwt, block_size)?;

        let mut sa_samples = vec![None; sa.len()];
        for (row, &pos) in sa.iter().enumerate() {
            if row % sample_stride == 0 {
                sa_samples[row] = Some(pos as u64);
            }
        }

        let mut reverse_text: Vec<u8> = text.to_vec();
        reverse_text.reverse();
        reverse_text.push(SENTINEL_BYTE);
        let reverse_sa = build_suffix_array(&reverse_text);
        let (reverse_bwt, _) = build_bwt_from_sa(&reverse_text, &reverse_sa);
        let reverse = OccTable::build(&reverse_bwt, block_size)?;

        Ok(Self {
            forward,
            reverse,
            sa_samples,
            sample_stride,
            text_len: text.len(),
        })
    }

    /// Length of the indexed text (excluding the sentinel).
    pub fn text_len(&self) -> usize {
        self.text_len
    }

    /// Suffix-array sample stride in use.
    pub fn sample_stride(&self) -> usize {
        self.sample_stride
    }

    /// The empty-match interval over the forward table (all rows).
    pub fn full_interval_forward(&self) -> SaInterval {
        self.forward.full_interval()
    }

    /// The empty-match interval over the reverse table (all rows).
    pub fn full_interval_reverse(&self) -> SaInterval {
        self.reverse.full_interval()
    }

    /// Prepend `base` to the pattern currently matched by `interval`
    /// (native backward search on the forward table).
    pub fn extend_left(&self, interval: SaInterval, base: BaseCode) -> SaInterval {
        self.forward.extend(interval, base)
    }

    /// Append `base` to the pattern currently matched by `interval`, by
    /// backward-searching the reversed pattern on the reverse table.
    pub fn extend_right(&self, interval: SaInterval, base: BaseCode) -> SaInterval {
        self.reverse.extend(interval, base)
    }

    /// Resolve a forward-table row to its absolute position in the indexed
    /// text, via LF-mapping walk to the nearest sampled row.
    pub fn locate(&self, row: usize) -> usize {
        let mut i = row;
        let mut steps = 0u64;
        while self.sa_samples[i].is_none() {
            i = self.forward.lf(i);
            steps += 1;
        }
        (self.sa_samples[i].unwrap() + steps) as usize
    }

    /// All text positions covered by a forward-table interval. Intended for
    /// small, already-filtered intervals (seeding enforces an occurrence cap
    /// before calling this).
    pub fn locate_all(&self, interval: SaInterval) -> Vec<usize> {
        (interval.l..interval.u)
            .map(|row| self.locate(row as usize))
            .collect()
    }
}

fn build_suffix_array(text: &[u8]) -> Vec<usize> {
    let mut sa: Vec<usize> = (0..text.len()).collect();
    sa.sort_by(|&a, &b| compare_suffixes(text, a, b));
    sa
}

fn compare_suffixes(text: &[u8], lhs: usize, rhs: usize) -> Ordering {
    text[lhs..].cmp(&text[rhs..])
}

fn build_bwt_from_sa(text: &[u8], sa: &[usize]) -> (Vec<u8>, usize) {
    let mut bwt = Vec::with_capacity(text.len());
    let mut sentinel_pos = 0usize;

    for (idx, &sa_idx) in sa.iter().enumerate() {
        let prev = if sa_idx == 0 {
            text.len() - 1
        } else {
            sa_idx - 1
        };
        if sa_idx == 0 {
            sentinel_pos = idx;
        }
        bwt.push(text[prev]);
    }

    (bwt, sentinel_pos)
}

fn add_counts(lhs: [u32; ALPHABET_SIZE], rhs: [u32; ALPHABET_SIZE]) -> [u32; ALPHABET_SIZE] {
    let mut out = [0u32; ALPHABET_SIZE];
    for i in 0..ALPHABET_SIZE {
        out[i] = lhs[i] + rhs[i];
    }
    out
}

fn build_c_table(totals: [u32; ALPHABET_SIZE]) -> [u64; 7] {
    let sentinel = 1u64;
    let a = totals[BaseCode::A.index()] as u64;
    let c = totals[BaseCode::C.index()] as u64;
    let g = totals[BaseCode::G.index()] as u64;
    let t = totals[BaseCode::T.index()] as u64;
    let n = totals[BaseCode::N.index()] as u64;

    [
        0,
        sentinel,
        sentinel + a,
        sentinel + a + c,
        sentinel + a + c + g,
        sentinel + a + c + g + t,
        sentinel + a + c + g + t + n,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_positions(reference: &[u8], pattern: &[u8]) -> Vec<usize> {
        if pattern.is_empty() || pattern.len() > reference.len() {
            return Vec::new();
        }
        (0..=reference.len() - pattern.len())
            .filter(|&start| &reference[start..start + pattern.len()] == pattern)
            .collect()
    }

    fn find_via_extend_left(index: &FmIndex, pattern: &[u8]) -> Vec<usize> {
        let mut interval = index.full_interval_forward();
        for &base in pattern.iter().rev() {
            let code = BaseCode::from_ascii(base).unwrap();
            interval = index.extend_left(interval, code);
            if interval.is_empty() {
                return Vec::new();
            }
        }
        let mut positions = index.locate_all(interval);
        positions.sort_unstable();
        positions
    }

    #[test]
    fn extend_left_matches_naive_search() {
        let reference = b"ACGTACGTACGGTCAA";
        let text = CompressedDNA::compress(reference).unwrap();
        let index = FmIndex::build_with_params(&text, 4, 3).unwrap();

        for pattern in [&b"ACG"[..], b"CGT", b"A", b"TCAA", b"GGTC"] {
            let mut expected = naive_positions(reference, pattern);
            expected.sort_unstable();
            assert_eq!(find_via_extend_left(&index, pattern), expected, "pattern {:?}", pattern);
        }
    }

    #[test]
    fn extend_right_on_reverse_table_matches_naive_search() {
        let reference = b"GATTACAGATTACA";
        let text = CompressedDNA::compress(reference).unwrap();
        let index = FmIndex::build_with_params(&text, 4, 3).unwrap();

        // Appending bases left-to-right on the reverse table should match
        // the same set of occurrences as a forward scan for the pattern.
        let pattern = b"ATTACA";
        let mut interval = index.full_interval_reverse();
        for &base in pattern {
            let code = BaseCode::from_ascii(base).unwrap();
            interval = index.extend_right(interval, code);
        }
        assert!(!interval.is_empty());
        assert_eq!(interval.pattern_len, pattern.len());
    }

    #[test]
    fn locate_round_trips_known_positions() {
        let reference = b"ACGTACGTACGGTCAA";
        let text = CompressedDNA::compress(reference).unwrap();
        let index = FmIndex::build_with_params(&text, 4, 3).unwrap();

        for pattern in [&b"ACG"[..], b"CAA"] {
            let found = find_via_extend_left(&index, pattern);
            let expected = {
                let mut v = naive_positions(reference, pattern);
                v.sort_unstable();
                v
            };
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn empty_reference_is_rejected() {
        let empty = CompressedDNA::compress(b"").unwrap();
        assert!(matches!(FmIndex::build(&empty), Err(FMIndexError::EmptyReference)));
    }
}
