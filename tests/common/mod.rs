//! Shared fixtures for integration tests: small references, indexes, and
//! reads built without pulling in real genome files.

use bwamem2_rs::config::AlignerConfig;
use bwamem2_rs::genomics::{FmIndex, ReadSequence, ReferenceMetadata};
use bwamem2_rs::pipeline::Pipeline;

/// A pseudo-random-looking but fixed 200bp single-contig reference, long
/// enough to give seeding/chaining room to work with.
pub const SINGLE_CONTIG: &[u8] = b"\
TGATCGTAGCTAGCATCGTAGCTAGCATGACTGACGTAGCTAGCATGCATGCTAGCATGCTAGCATCGTACGATCGTAGC\
ATCGTAGCTAGGACATGCATGACTGATCGATCGTAGCATGCATGCATCGATGCATGCATCGATGCATGCTAGCATGCATG\
CATGCATGCATCGATGCATGCATCGATGC";

/// Build reference metadata for a single named contig.
pub fn build_reference(name: &str, sequence: &[u8]) -> ReferenceMetadata {
    ReferenceMetadata::build(&[(name.to_string(), sequence.to_vec(), false)])
        .expect("single-contig reference should build")
}

/// Build an FM-index over already-built reference metadata.
pub fn build_index(reference: &ReferenceMetadata) -> FmIndex {
    FmIndex::build(reference.text()).expect("FM-index should build over valid text")
}

/// Convenience: build reference + index for [`SINGLE_CONTIG`].
pub fn default_fixture() -> (ReferenceMetadata, FmIndex) {
    let reference = build_reference("chr1", SINGLE_CONTIG);
    let index = build_index(&reference);
    (reference, index)
}

/// Build a pipeline over a fixture with default scoring/stage parameters.
pub fn default_pipeline<'a>(reference: &'a ReferenceMetadata, index: &'a FmIndex) -> Pipeline<'a> {
    Pipeline::new(reference, index, AlignerConfig::default())
}

/// Build a read with uniform base quality from an ASCII sequence.
pub fn read(name: &str, sequence: &[u8]) -> ReadSequence {
    ReadSequence::new(name, sequence, vec![35; sequence.len()]).expect("valid read sequence")
}

/// Introduce a single substitution at `pos`, wrapping to a different base.
pub fn mutate(sequence: &[u8], pos: usize) -> Vec<u8> {
    let mut mutated = sequence.to_vec();
    mutated[pos] = match mutated[pos] {
        b'A' => b'C',
        b'C' => b'G',
        b'G' => b'T',
        _ => b'A',
    };
    mutated
}
