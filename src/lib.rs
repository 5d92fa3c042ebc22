//! Core alignment pipeline for a BWA-MEM2-compatible short-read aligner.
//!
//! This crate implements the algorithmic core of short-read alignment
//! against a reference genome: a bidirectional FM-index over the reference
//! ([`genomics::fm_index`]), supermaximal exact match seeding
//! ([`genomics::seed`]), collinear chaining ([`genomics::chain`]), banded
//! affine-gap extension ([`genomics::extend`]), CIGAR/MD/NM reconstruction
//! ([`genomics::cigar`]), mapping-quality estimation ([`genomics::mapq`]),
//! two-pass region classification ([`genomics::classify`]), paired-end
//! resolution with mate rescue ([`genomics::pairing`]), and BAM record
//! emission ([`genomics::output`], [`genomics::io`]).
//!
//! [`pipeline::Pipeline`] wires these stages together into a batch-oriented
//! orchestrator; [`config::AlignerConfig`] loads scoring and stage
//! parameters from JSON.
//!
//! ## Usage Example
//!
//! ```ignore
//! use bwamem2_rs::config::AlignerConfig;
//! use bwamem2_rs::genomics::{FmIndex, ReferenceMetadata};
//! use bwamem2_rs::pipeline::Pipeline;
//!
//! let reference = ReferenceMetadata::build(&[("chr1".to_string(), genome_bytes, false)])?;
//! let index = FmIndex::build(reference.text())?;
//! let pipeline = Pipeline::new(&reference, &index, AlignerConfig::default());
//! let records = pipeline.align_one(&read);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod config;
pub mod error;
pub mod genomics;
pub mod pipeline;

pub use config::AlignerConfig;
pub use error::PipelineError;
pub use pipeline::{Pipeline, ReadRecord};
