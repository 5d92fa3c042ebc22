//! External collaborator contract for supplying reads to the pipeline:
//! [`ReadSource`], a streaming FASTQ-backed implementation, and an
//! in-memory test double.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use thiserror::Error;

use crate::genomics::read::{ReadError, ReadSequence};

/// Errors produced while pulling the next read from a [`ReadSource`].
#[derive(Debug, Error)]
pub enum ReadSourceError {
    #[error("I/O error reading input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid read: {0}")]
    Read(#[from] ReadError),
    #[error("record {0} has malformed header")]
    MalformedHeader(usize),
    #[error("record {0} is missing its {1} line")]
    MissingLine(usize, &'static str),
}

/// External collaborator that hands the pipeline one read at a time,
/// independent of the concrete input format or whether it's materialized in
/// memory.
pub trait ReadSource {
    /// Advance to and return the next read, or `None` at end of input.
    fn next_read(&mut self) -> Result<Option<ReadSequence>, ReadSourceError>;
}

/// A [`ReadSource`] backed by an in-memory vector, for tests and for
/// callers that have already materialized their reads.
#[derive(Debug, Default)]
pub struct VecReadSource {
    reads: std::vec::IntoIter<ReadSequence>,
}

impl VecReadSource {
    /// Build a source that yields `reads` in order, then ends.
    pub fn new(reads: Vec<ReadSequence>) -> Self {
        Self { reads: reads.into_iter() }
    }
}

impl ReadSource for VecReadSource {
    fn next_read(&mut self) -> Result<Option<ReadSequence>, ReadSourceError> {
        Ok(self.reads.next())
    }
}

/// A [`ReadSource`] that streams a 4-line-per-record FASTQ file, converting
/// Phred+33 ASCII qualities back to raw scores as each record is pulled.
pub struct FastqReadSource {
    lines: Lines<BufReader<File>>,
    record_no: usize,
}

impl FastqReadSource {
    /// Open `path` for streaming.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReadSourceError> {
        let file = File::open(path.as_ref())?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            record_no: 0,
        })
    }
}

impl ReadSource for FastqReadSource {
    fn next_read(&mut self) -> Result<Option<ReadSequence>, ReadSourceError> {
        let header = loop {
            match self.lines.next() {
                Some(line) => {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    break line;
                }
                None => return Ok(None),
            }
        };

        self.record_no += 1;
        if !header.starts_with('@') {
            return Err(ReadSourceError::MalformedHeader(self.record_no));
        }
        let name = header[1..].split_whitespace().next().unwrap_or("").to_string();

        let sequence = self
            .lines
            .next()
            .ok_or(ReadSourceError::MissingLine(self.record_no, "sequence"))??;
        let _plus = self
            .lines
            .next()
            .ok_or(ReadSourceError::MissingLine(self.record_no, "separator"))??;
        let quality_line = self
            .lines
            .next()
            .ok_or(ReadSourceError::MissingLine(self.record_no, "quality"))??;

        let sequence = sequence.trim().as_bytes().to_ascii_uppercase();
        let qualities: Vec<u8> = quality_line.trim().bytes().map(|b| b.saturating_sub(33)).collect();

        Ok(Some(ReadSequence::new(name, &sequence, qualities)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(name: &str) -> ReadSequence {
        ReadSequence::new(name, b"ACGT", vec![30; 4]).unwrap()
    }

    #[test]
    fn vec_read_source_yields_reads_in_order_then_ends() {
        let mut source = VecReadSource::new(vec![read("r1"), read("r2")]);
        assert_eq!(source.next_read().unwrap().unwrap().name, "r1");
        assert_eq!(source.next_read().unwrap().unwrap().name, "r2");
        assert!(source.next_read().unwrap().is_none());
    }

    #[test]
    fn fastq_read_source_streams_records() {
        let mut file = tempfile_with(b"@r1\nACGT\n+\nIIII\n@r2\nTTTT\n+\nIIII\n");
        let mut source = FastqReadSource::open(file.path()).unwrap();
        let r1 = source.next_read().unwrap().unwrap();
        assert_eq!(r1.name, "r1");
        let r2 = source.next_read().unwrap().unwrap();
        assert_eq!(r2.name, "r2");
        assert!(source.next_read().unwrap().is_none());
        file.close();
    }

    #[test]
    fn fastq_read_source_rejects_malformed_header() {
        let mut file = tempfile_with(b"r1\nACGT\n+\nIIII\n");
        let mut source = FastqReadSource::open(file.path()).unwrap();
        assert!(matches!(source.next_read(), Err(ReadSourceError::MalformedHeader(1))));
        file.close();
    }

    /// Minimal scratch-file helper so these tests don't need an external
    /// tempfile dependency just to exercise the streaming reader.
    struct ScratchFile {
        path: std::path::PathBuf,
    }

    impl ScratchFile {
        fn path(&self) -> &std::path::Path {
            &self.path
        }

        fn close(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_with(contents: &[u8]) -> ScratchFile {
        let path = std::env::temp_dir().join(format!(
            "bwamem2-rs-read-source-test-{}-{}",
            std::process::id(),
            contents.len()
        ));
        std::fs::write(&path, contents).unwrap();
        ScratchFile { path }
    }
}
