//! External collaborator contract for loading a reference's FM-index:
//! [`IndexLoader`], a FASTA-backed implementation, and an in-memory test
//! double.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::genomics::fm_index::{FMIndexError, FmIndex};
use crate::genomics::reference::{ReferenceError, ReferenceMetadata};

/// Errors produced while loading an index through an [`IndexLoader`].
#[derive(Debug, Error)]
pub enum IndexLoadError {
    #[error("failed to read reference {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("reference {0} contained no sequences")]
    Empty(String),
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),
    #[error("FM-index error: {0}")]
    Index(#[from] FMIndexError),
}

/// External collaborator that produces a ready-to-query FM-index plus its
/// reference metadata, independent of where the underlying sequence data
/// lives.
pub trait IndexLoader {
    /// Load the index and its reference metadata.
    fn load(&self) -> Result<(FmIndex, ReferenceMetadata), IndexLoadError>;
}

/// An [`IndexLoader`] that parses a reference FASTA file and builds the
/// index from it. A contig is treated as ALT/decoy when its name ends in
/// `_alt` or `_decoy`, following the GRCh38 ALT-scaffold naming convention.
pub struct FastaIndexLoader {
    path: PathBuf,
}

impl FastaIndexLoader {
    /// Build a loader over the FASTA file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IndexLoader for FastaIndexLoader {
    fn load(&self) -> Result<(FmIndex, ReferenceMetadata), IndexLoadError> {
        let contigs = parse_fasta(&self.path)?;
        let reference = ReferenceMetadata::build(&contigs)?;
        let index = FmIndex::build(reference.text())?;
        Ok((index, reference))
    }
}

/// An [`IndexLoader`] backed by already-materialized `(name, sequence,
/// is_alt)` contigs, for tests that need an index without a file on disk.
pub struct InMemoryIndexLoader {
    contigs: Vec<(String, Vec<u8>, bool)>,
}

impl InMemoryIndexLoader {
    /// Build a loader over `contigs`.
    pub fn new(contigs: Vec<(String, Vec<u8>, bool)>) -> Self {
        Self { contigs }
    }
}

impl IndexLoader for InMemoryIndexLoader {
    fn load(&self) -> Result<(FmIndex, ReferenceMetadata), IndexLoadError> {
        let reference = ReferenceMetadata::build(&self.contigs)?;
        let index = FmIndex::build(reference.text())?;
        Ok((index, reference))
    }
}

fn parse_fasta(path: &Path) -> Result<Vec<(String, Vec<u8>, bool)>, IndexLoadError> {
    let io_err = |source: std::io::Error| IndexLoadError::Io {
        path: path.display().to_string(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let reader = BufReader::new(file);

    let mut contigs = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_seq = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        if let Some(name) = line.strip_prefix('>') {
            if let Some(finished_name) = current_name.take() {
                contigs.push(finish_contig(finished_name, std::mem::take(&mut current_seq)));
            }
            current_name = Some(name.split_whitespace().next().unwrap_or(name).to_string());
        } else {
            current_seq.extend(line.trim().as_bytes().iter().map(|b| b.to_ascii_uppercase()));
        }
    }
    if let Some(finished_name) = current_name {
        contigs.push(finish_contig(finished_name, current_seq));
    }

    if contigs.is_empty() {
        return Err(IndexLoadError::Empty(path.display().to_string()));
    }
    Ok(contigs)
}

fn finish_contig(name: String, seq: Vec<u8>) -> (String, Vec<u8>, bool) {
    let is_alt = name.ends_with("_alt") || name.ends_with("_decoy");
    (name, seq, is_alt)
}
