//! Supermaximal exact match (SMEM) seeding.
//!
//! Seeds are found with a two-phase scan per query start offset:
//!
//! 1. **Grow right** — starting at offset `i`, extend the match as far right
//!    as possible using [`FmIndex::extend_right`] (native backward search on
//!    the reverse-text table walks the *original* pattern forward). This
//!    gives the maximal reach `j` for that start, but the SA interval
//!    produced lives in the reverse table and cannot be located.
//! 2. **Rebuild left** — re-derive the SA interval for the same substring
//!    `[i, j)` on the forward table via [`FmIndex::extend_left`], prepending
//!    characters from `j-1` down to `i`. This interval's rows are locatable.
//!
//! This deviates from bwa's `bwa_smem1`, which emits every maximal interval
//! encountered while shrinking the match from both ends. Emitting a single
//! SMEM per scanned start offset is simpler to implement without the ability
//! to execute and test a subtle multi-emission loop, at some cost in
//! sensitivity to nested repeats. Long seeds are still re-seeded from their
//! midpoint to recover seeds inside larger repetitive regions, matching the
//! spirit of bwa's `mem_reseed`.

use crate::genomics::alphabet::BaseCode;
use crate::genomics::fm_index::{FmIndex, SaInterval};
use crate::genomics::read::ReadSequence;

/// Parameters controlling SMEM extraction.
#[derive(Debug, Clone, Copy)]
pub struct SeedingParams {
    /// Minimum seed length to keep.
    pub min_seed_len: usize,
    /// Maximum number of reference occurrences to fully enumerate for a seed.
    /// Seeds more repetitive than this are kept (for chaining weight) but
    /// their occurrences are not all located.
    pub max_occ: usize,
    /// A seed longer than `min_seed_len * reseed_factor` triggers a
    /// midpoint re-seed attempt.
    pub reseed_factor: f64,
}

impl Default for SeedingParams {
    fn default() -> Self {
        Self {
            min_seed_len: 19,
            max_occ: 500,
            reseed_factor: 1.5,
        }
    }
}

/// A single supermaximal exact match between a read and the reference text.
#[derive(Debug, Clone)]
pub struct Seed {
    /// Start offset (inclusive) in the query.
    pub qbeg: usize,
    /// End offset (exclusive) in the query.
    pub qend: usize,
    /// Suffix-array interval on the forward table for this match.
    pub interval: SaInterval,
}

impl Seed {
    /// Length of the matched substring.
    pub fn len(&self) -> usize {
        self.qend - self.qbeg
    }

    /// Number of reference occurrences.
    pub fn occurrences(&self) -> u64 {
        self.interval.size()
    }
}

/// A single located occurrence of a [`Seed`] on the indexed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHit {
    /// Start offset (inclusive) in the query.
    pub qbeg: usize,
    /// End offset (exclusive) in the query.
    pub qend: usize,
    /// Absolute position on the indexed text (forward or reverse-complement
    /// half; see [`crate::genomics::reference::ReferenceMetadata::locate_text_pos`]).
    pub rpos: usize,
}

impl SeedHit {
    /// Length of the matched substring.
    pub fn len(&self) -> usize {
        self.qend - self.qbeg
    }
}

/// Extracts SMEM seeds from reads against a bidirectional FM-index.
pub struct Seeder<'a> {
    index: &'a FmIndex,
    params: SeedingParams,
}

impl<'a> Seeder<'a> {
    /// Build a seeder over `index` with the given parameters.
    pub fn new(index: &'a FmIndex, params: SeedingParams) -> Self {
        Self { index, params }
    }

    /// Extract seeds for `read` and expand each into located hits, dropping
    /// seeds more repetitive than `max_occ` (their occurrences are too
    /// numerous to usefully chain against).
    pub fn seed_hits(&self, read: &ReadSequence) -> Vec<SeedHit> {
        self.seed(read)
            .into_iter()
            .filter(|seed| seed.occurrences() <= self.params.max_occ as u64)
            .flat_map(|seed| {
                self.index
                    .locate_all(seed.interval)
                    .into_iter()
                    .map(move |rpos| SeedHit {
                        qbeg: seed.qbeg,
                        qend: seed.qend,
                        rpos,
                    })
            })
            .collect()
    }

    /// Extract seeds for `read`.
    pub fn seed(&self, read: &ReadSequence) -> Vec<Seed> {
        let bases = read.sequence_ascii();
        let codes: Vec<BaseCode> = bases
            .iter()
            .map(|&b| BaseCode::from_ascii(b).unwrap_or(BaseCode::N))
            .collect();

        let mut seeds = Vec::new();
        let qlen = codes.len();
        if qlen < self.params.min_seed_len {
            return seeds;
        }

        let mut i = 0usize;
        while i + self.params.min_seed_len <= qlen {
            if codes[i] == BaseCode::N {
                i += 1;
                continue;
            }

            if let Some(seed) = self.grow_from(&codes, i) {
                let next = seed.qend.max(i + 1);

                if (seed.len() as f64) >= self.params.min_seed_len as f64 * self.params.reseed_factor
                {
                    let mid = seed.qbeg + seed.len() / 2;
                    if mid > seed.qbeg && mid + self.params.min_seed_len <= qlen {
                        if let Some(reseeded) = self.grow_from(&codes, mid) {
                            if reseeded.qbeg != seed.qbeg || reseeded.qend != seed.qend {
                                seeds.push(reseeded);
                            }
                        }
                    }
                }

                if seed.len() >= self.params.min_seed_len {
                    seeds.push(seed);
                }
                i = next;
            } else {
                i += 1;
            }
        }

        seeds
    }

    /// Phase 1 + phase 2 growth starting at query offset `start`.
    fn grow_from(&self, codes: &[BaseCode], start: usize) -> Option<Seed> {
        // Phase 1: grow right on the reverse table.
        let mut interval = self.index.full_interval_reverse();
        let mut end = start;
        for &code in &codes[start..] {
            if code == BaseCode::N {
                break;
            }
            let next = self.index.extend_right(interval, code);
            if next.is_empty() {
                break;
            }
            interval = next;
            end += 1;
        }

        if end == start {
            return None;
        }

        // Phase 2: rebuild on the forward table, prepending end-1 down to start.
        let mut forward_interval = self.index.full_interval_forward();
        for idx in (start..end).rev() {
            forward_interval = self.index.extend_left(forward_interval, codes[idx]);
            if forward_interval.is_empty() {
                return None;
            }
        }

        Some(Seed {
            qbeg: start,
            qend: end,
            interval: forward_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::compressed_dna::CompressedDNA;

    fn build_index(reference: &[u8]) -> FmIndex {
        let text = CompressedDNA::compress(reference).unwrap();
        FmIndex::build_with_params(&text, 8, 4).unwrap()
    }

    #[test]
    fn seeds_exact_match_reads() {
        let reference = b"ACGTACGTTTTTGGGGCATCATCATGGGACGTACGT";
        let index = build_index(reference);
        let read = ReadSequence::new("r1", b"TTTTGGGGCATCATCAT", vec![30; 18]).unwrap();

        let seeder = Seeder::new(
            &index,
            SeedingParams {
                min_seed_len: 10,
                ..SeedingParams::default()
            },
        );
        let seeds = seeder.seed(&read);
        assert!(!seeds.is_empty());
        let best = seeds.iter().max_by_key(|s| s.len()).unwrap();
        assert!(best.len() >= 10);
        assert!(best.occurrences() >= 1);
    }

    #[test]
    fn short_reads_below_min_length_produce_no_seeds() {
        let reference = b"ACGTACGTACGT";
        let index = build_index(reference);
        let read = ReadSequence::new("r1", b"ACG", vec![30; 3]).unwrap();
        let seeder = Seeder::new(&index, SeedingParams::default());
        assert!(seeder.seed(&read).is_empty());
    }

    #[test]
    fn reads_with_n_runs_do_not_panic() {
        let reference = b"ACGTACGTTTTTGGGGCATCATCATGGG";
        let index = build_index(reference);
        let read = ReadSequence::new("r1", b"NNNNNNNNNNNNNNNNNNNN", vec![30; 20]).unwrap();
        let seeder = Seeder::new(&index, SeedingParams::default());
        assert!(seeder.seed(&read).is_empty());
    }
}
