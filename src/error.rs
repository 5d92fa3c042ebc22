//! Top-level error aggregation.

use thiserror::Error;

use crate::config::ConfigError;
use crate::genomics::compressed_dna::CompressedDNAError;
use crate::genomics::fm_index::FMIndexError;
use crate::genomics::read::ReadError;
use crate::genomics::reference::ReferenceError;

/// Aggregate error type returned by the top-level pipeline API.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("FM-index error: {0}")]
    Index(#[from] FMIndexError),

    #[error("read error: {0}")]
    Read(#[from] ReadError),

    #[error("sequence compression error: {0}")]
    Compression(#[from] CompressedDNAError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("output sink error: {0}")]
    Sink(#[source] anyhow::Error),

    #[error("pipeline was cancelled")]
    Cancelled,
}
