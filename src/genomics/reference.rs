//! Reference metadata: contig layout and the bidirectional index text.
//!
//! The aligner indexes a single concatenated text `T = fwd + revcomp(fwd) + sentinel`
//! so that a hit anywhere in `T` can be mapped back to a `(contig, strand, offset)`
//! triple. This module owns that concatenation and the offset bookkeeping.

use thiserror::Error;

use crate::genomics::compressed_dna::CompressedDNA;

/// A single contig's placement within the forward half of the index text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    /// Contig name as it appears in the reference FASTA / BAM header.
    pub name: String,
    /// Length in bases.
    pub length: usize,
    /// Offset of the first base of this contig within the forward text.
    pub offset: usize,
    /// Whether this contig is an ALT/decoy sequence.
    pub is_alt: bool,
}

/// Errors produced while building or querying reference metadata.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// No contigs were supplied.
    #[error("reference must contain at least one contig")]
    Empty,
    /// A position fell outside the indexed text.
    #[error("position {0} is out of bounds for a reference of length {1}")]
    OutOfBounds(usize, usize),
}

/// Metadata describing the reference and the concatenated bidirectional text
/// built from it.
#[derive(Debug, Clone)]
pub struct ReferenceMetadata {
    contigs: Vec<Contig>,
    /// Total length of the forward half (sum of all contig lengths).
    forward_length: usize,
    /// The indexed text: forward strand, then reverse complement, then a sentinel.
    text: CompressedDNA,
}

impl ReferenceMetadata {
    /// Build reference metadata and the bidirectional index text from a list
    /// of `(name, sequence, is_alt)` contigs, concatenated in the given order.
    pub fn build(contigs: &[(String, Vec<u8>, bool)]) -> Result<Self, ReferenceError> {
        if contigs.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let mut forward_bases = Vec::new();
        let mut entries = Vec::with_capacity(contigs.len());
        let mut offset = 0usize;

        for (name, sequence, is_alt) in contigs {
            entries.push(Contig {
                name: name.clone(),
                length: sequence.len(),
                offset,
                is_alt: *is_alt,
            });
            forward_bases.extend_from_slice(sequence);
            offset += sequence.len();
        }

        let forward_length = forward_bases.len();
        let forward =
            CompressedDNA::compress(&forward_bases).map_err(|_| ReferenceError::Empty)?;
        let reverse_complement = forward.reverse_complement();
        let text = forward.concat(&reverse_complement);

        Ok(Self {
            contigs: entries,
            forward_length,
            text,
        })
    }

    /// All contigs in forward-text order.
    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    /// Length of the forward half of the reference (sum of contig lengths).
    pub fn forward_length(&self) -> usize {
        self.forward_length
    }

    /// Total length of the indexed text (forward + reverse complement).
    pub fn text_length(&self) -> usize {
        self.text.len()
    }

    /// The indexed text itself, shared by the FM-index builder.
    pub fn text(&self) -> &CompressedDNA {
        &self.text
    }

    /// Decode an ASCII slice of the indexed text, clamped to its bounds.
    pub fn slice(&self, start: usize, end: usize) -> Vec<u8> {
        let clamped_end = end.min(self.text.len());
        if start >= clamped_end {
            return Vec::new();
        }
        (start..clamped_end)
            .map(|idx| self.text.base_at(idx).unwrap_or(b'N'))
            .collect()
    }

    /// Whether `abs_pos` (an offset into the forward half) lies on the
    /// reverse-complement half of the text.
    pub fn is_reverse_half(&self, text_pos: usize) -> bool {
        text_pos >= self.forward_length
    }

    /// Map a forward-text offset to `(contig_index, local_offset)` via binary
    /// search over contig boundaries.
    pub fn locate(&self, forward_pos: usize) -> Result<(usize, usize), ReferenceError> {
        if forward_pos >= self.forward_length {
            return Err(ReferenceError::OutOfBounds(forward_pos, self.forward_length));
        }

        let idx = match self
            .contigs
            .binary_search_by(|contig| contig.offset.cmp(&forward_pos))
        {
            Ok(exact) => exact,
            Err(insert_at) => insert_at - 1,
        };

        let contig = &self.contigs[idx];
        Ok((idx, forward_pos - contig.offset))
    }

    /// Mirror a position on the reverse-complement half of the text back
    /// into the corresponding forward-half coordinate.
    ///
    /// # Panics
    /// Panics if `text_pos` is not on the reverse half.
    pub fn mirror_to_forward(&self, text_pos: usize) -> usize {
        assert!(self.is_reverse_half(text_pos), "position is not on the reverse half");
        let rc_offset = text_pos - self.forward_length;
        self.forward_length - 1 - rc_offset
    }

    /// Translate a hit position on the indexed text (which may land on the
    /// reverse-complement half) into `(contig_index, local_offset, is_reverse)`.
    pub fn locate_text_pos(&self, text_pos: usize) -> Result<(usize, usize, bool), ReferenceError> {
        if self.is_reverse_half(text_pos) {
            let rc_offset = text_pos - self.forward_length;
            // The reverse-complement half mirrors the forward half: position
            // `rc_offset` in the RC half corresponds to forward position
            // `forward_length - 1 - rc_offset` on the opposite strand, and the
            // hit spans backward from there in forward coordinates.
            let mirrored = self
                .forward_length
                .checked_sub(rc_offset + 1)
                .ok_or(ReferenceError::OutOfBounds(text_pos, self.text_length()))?;
            let (idx, local) = self.locate(mirrored)?;
            Ok((idx, local, true))
        } else {
            let (idx, local) = self.locate(text_pos)?;
            Ok((idx, local, false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReferenceMetadata {
        ReferenceMetadata::build(&[
            ("chr1".to_string(), b"ACGTACGTAC".to_vec(), false),
            ("chr2".to_string(), b"TTTTGGGG".to_vec(), false),
            ("chr1_alt".to_string(), b"ACGT".to_vec(), true),
        ])
        .unwrap()
    }

    #[test]
    fn locate_resolves_contig_and_local_offset() {
        let reference = sample();
        assert_eq!(reference.locate(0).unwrap(), (0, 0));
        assert_eq!(reference.locate(9).unwrap(), (0, 9));
        assert_eq!(reference.locate(10).unwrap(), (1, 0));
        assert_eq!(reference.locate(17).unwrap(), (1, 7));
        assert_eq!(reference.locate(18).unwrap(), (2, 0));
    }

    #[test]
    fn locate_out_of_bounds_errors() {
        let reference = sample();
        assert!(matches!(
            reference.locate(22),
            Err(ReferenceError::OutOfBounds(22, 22))
        ));
    }

    #[test]
    fn text_is_forward_plus_reverse_complement() {
        let reference = sample();
        assert_eq!(reference.forward_length(), 22);
        assert_eq!(reference.text_length(), 44);
        assert!(!reference.is_reverse_half(21));
        assert!(reference.is_reverse_half(22));
    }

    #[test]
    fn empty_reference_is_rejected() {
        assert!(matches!(ReferenceMetadata::build(&[]), Err(ReferenceError::Empty)));
    }
}
