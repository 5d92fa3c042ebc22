//! Sequencing read representation.

use thiserror::Error;

use crate::genomics::compressed_dna::{CompressedDNA, CompressedDNAError};

/// Errors produced while constructing a [`ReadSequence`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// Sequence and quality strings had mismatched lengths.
    #[error("sequence length {seq_len} does not match quality length {qual_len}")]
    LengthMismatch { seq_len: usize, qual_len: usize },
    /// The sequence contained a character outside the supported alphabet.
    #[error("invalid base in read sequence: {0}")]
    InvalidBase(#[from] CompressedDNAError),
}

/// A single sequencing read (one mate of a pair, or an unpaired read).
#[derive(Debug, Clone)]
pub struct ReadSequence {
    /// Read name, shared between both mates of a pair.
    pub name: String,
    /// 2-bit packed bases, always stored in sequencing (5'->3') orientation.
    pub bases: CompressedDNA,
    /// Phred+33 quality scores, one per base, same orientation as `bases`.
    pub qualities: Vec<u8>,
    /// Free-text comment carried through from the input format, if any.
    pub comment: Option<String>,
}

impl ReadSequence {
    /// Construct a read from name, ASCII sequence, and raw Phred qualities.
    pub fn new(
        name: impl Into<String>,
        sequence: &[u8],
        qualities: Vec<u8>,
    ) -> Result<Self, ReadError> {
        if sequence.len() != qualities.len() {
            return Err(ReadError::LengthMismatch {
                seq_len: sequence.len(),
                qual_len: qualities.len(),
            });
        }
        let bases = CompressedDNA::compress(sequence)?;
        Ok(Self {
            name: name.into(),
            bases,
            qualities,
            comment: None,
        })
    }

    /// Number of bases in the read.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Returns `true` when the read has no bases.
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Decode the sequence back to ASCII bases.
    pub fn sequence_ascii(&self) -> Vec<u8> {
        self.bases.to_vec()
    }

    /// Reverse-complemented view of this read, with qualities reversed to
    /// match.
    pub fn reverse_complement(&self) -> Self {
        let mut qualities = self.qualities.clone();
        qualities.reverse();
        Self {
            name: self.name.clone(),
            bases: self.bases.reverse_complement(),
            qualities,
            comment: self.comment.clone(),
        }
    }
}

/// A pair of reads sequenced from the same fragment.
#[derive(Debug, Clone)]
pub struct ReadPair {
    /// First-in-pair (mate 1).
    pub mate1: ReadSequence,
    /// Second-in-pair (mate 2).
    pub mate2: ReadSequence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_read_requires_matching_lengths() {
        let err = ReadSequence::new("r1", b"ACGT", vec![30, 30, 30]).unwrap_err();
        assert!(matches!(err, ReadError::LengthMismatch { seq_len: 4, qual_len: 3 }));
    }

    #[test]
    fn reverse_complement_reverses_qualities() {
        let read = ReadSequence::new("r1", b"ACGTN", vec![10, 20, 30, 40, 2]).unwrap();
        let rc = read.reverse_complement();
        assert_eq!(rc.sequence_ascii(), b"NACGT");
        assert_eq!(rc.qualities, vec![2, 40, 30, 20, 10]);
    }
}
