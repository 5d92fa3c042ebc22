//! Property tests for the bidirectional FM-index: every substring that
//! occurs in a random reference must be findable via both extension
//! directions, and the resulting positions must match a naive scan.

use proptest::prelude::*;

use bwamem2_rs::genomics::{BaseCode, CompressedDNA, FmIndex};

fn naive_positions(reference: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || pattern.len() > reference.len() {
        return Vec::new();
    }
    (0..=reference.len() - pattern.len())
        .filter(|&start| &reference[start..start + pattern.len()] == pattern)
        .collect()
}

fn locate_via_extend_left(index: &FmIndex, pattern: &[u8]) -> Vec<usize> {
    let mut interval = index.full_interval_forward();
    for &base in pattern.iter().rev() {
        let code = BaseCode::from_ascii(base).expect("pattern restricted to ACGT");
        interval = index.extend_left(interval, code);
        if interval.is_empty() {
            return Vec::new();
        }
    }
    let mut positions = index.locate_all(interval);
    positions.sort_unstable();
    positions
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn extend_left_locates_every_true_occurrence(
        reference in proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 20..200),
        pattern_start in 0usize..180,
        pattern_len in 3usize..15,
    ) {
        prop_assume!(pattern_start + pattern_len <= reference.len());
        let pattern = reference[pattern_start..pattern_start + pattern_len].to_vec();

        let text = CompressedDNA::compress(&reference).unwrap();
        let index = FmIndex::build_with_params(&text, 16, 8).unwrap();

        let mut expected = naive_positions(&reference, &pattern);
        expected.sort_unstable();
        let found = locate_via_extend_left(&index, &pattern);
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn extend_right_finds_a_nonempty_interval_for_true_occurrences(
        reference in proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 20..200),
        pattern_start in 0usize..180,
        pattern_len in 3usize..15,
    ) {
        prop_assume!(pattern_start + pattern_len <= reference.len());
        let pattern = reference[pattern_start..pattern_start + pattern_len].to_vec();

        let text = CompressedDNA::compress(&reference).unwrap();
        let index = FmIndex::build_with_params(&text, 16, 8).unwrap();

        let mut interval = index.full_interval_reverse();
        for &base in &pattern {
            let code = BaseCode::from_ascii(base).unwrap();
            interval = index.extend_right(interval, code);
        }
        prop_assert!(!interval.is_empty());
        prop_assert_eq!(interval.pattern_len, pattern.len());
    }

    #[test]
    fn locate_never_exceeds_text_length(
        reference in proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 10..100),
    ) {
        let text = CompressedDNA::compress(&reference).unwrap();
        let index = FmIndex::build_with_params(&text, 8, 4).unwrap();
        for row in 0..reference.len() {
            let pos = index.locate(row);
            prop_assert!(pos < index.text_len());
        }
    }
}
