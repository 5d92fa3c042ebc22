//! Core alignment data structures and algorithms.
//!
//! This module tree implements the alignment pipeline end to end: reference
//! indexing ([`fm_index`], [`reference`]), read ingestion ([`read`]),
//! seeding ([`seed`]), chaining ([`chain`]), extension ([`extend`],
//! [`sw_backend`]), CIGAR/MD construction ([`cigar`]), mapping quality
//! ([`mapq`]), region classification ([`classify`]), paired-end resolution
//! ([`pairing`]), and record emission ([`output`], [`io`]).

pub mod alphabet;
pub mod chain;
pub mod cigar;
pub mod classify;
pub mod compressed_dna;
pub mod extend;
pub mod fm_index;
pub mod index_loader;
pub mod io;
pub mod mapq;
pub mod output;
pub mod pairing;
pub mod read;
pub mod read_source;
pub mod reference;
pub mod seed;
pub mod sw_backend;

pub use alphabet::{BaseCode, RankSelectIndex, ALPHABET_SIZE, CHECKPOINT_STRIDE};
pub use chain::{Chain, Chainer, ChainingParams};
pub use cigar::{CigarOp, CigarOpKind, Traceback};
pub use classify::{classify_regions, ClassificationParams, ClassifiedRegion, RegionRole};
pub use compressed_dna::{AmbiguityMask, CompressedDNA, CompressedDNAError};
pub use extend::{banded_affine_sw, extend_from_anchor, Anchor, ExtendParams, MemAlnReg, Strand};
pub use fm_index::{FMIndexError, FmIndex, SaInterval};
pub use index_loader::{FastaIndexLoader, IndexLoadError, IndexLoader, InMemoryIndexLoader};
pub use io::BamRecordSink;
pub use mapq::{estimate_mapq, MapqInputs};
pub use output::{
    build_record, link_mates, InMemorySink, Record, RecordInputs, RecordSink,
};
pub use pairing::{InsertSizeDist, Orientation, PairingParams, PairingResolver};
pub use read::{ReadPair, ReadSequence};
pub use read_source::{FastqReadSource, ReadSource, ReadSourceError, VecReadSource};
pub use reference::{Contig, ReferenceError, ReferenceMetadata};
pub use seed::{Seed, SeedHit, Seeder, SeedingParams};
pub use sw_backend::{BatchSwBackend, CpuSwBackend};
