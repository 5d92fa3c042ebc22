//! Output record assembly: translating an extended, classified, mapq-scored
//! alignment into a SAM/BAM-shaped [`Record`], and the [`RecordSink`] trait
//! external collaborators implement to consume them.

use crate::genomics::cigar::Traceback;

/// Read paired.
pub const FLAG_PAIRED: u16 = 0x1;
/// Each segment properly aligned.
pub const FLAG_PROPER_PAIR: u16 = 0x2;
/// Segment unmapped.
pub const FLAG_UNMAPPED: u16 = 0x4;
/// Mate unmapped.
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
/// Segment reverse complemented.
pub const FLAG_REVERSE: u16 = 0x10;
/// Mate reverse complemented.
pub const FLAG_MATE_REVERSE: u16 = 0x20;
/// First segment in the template.
pub const FLAG_FIRST_IN_PAIR: u16 = 0x40;
/// Last segment in the template.
pub const FLAG_SECOND_IN_PAIR: u16 = 0x80;
/// Secondary alignment.
pub const FLAG_SECONDARY: u16 = 0x100;
/// Supplementary alignment.
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

/// One alignment record, shaped after the SAM fields so that a `RecordSink`
/// can render it into whichever concrete output format it owns.
#[derive(Debug, Clone)]
pub struct Record {
    pub qname: String,
    pub flag: u16,
    /// Reference contig name, `None` when unmapped.
    pub rname: Option<String>,
    /// 0-based leftmost mapping position.
    pub pos: i64,
    pub mapq: u8,
    pub cigar: String,
    /// Mate's reference contig name (`"="` when equal to `rname`, handled by
    /// the sink), `None` when the mate is unmapped or there is no mate.
    pub rnext: Option<String>,
    pub pnext: i64,
    pub tlen: i64,
    /// Sequence in the orientation it should appear in the output (i.e.
    /// already reverse-complemented for reverse-strand alignments).
    pub seq: String,
    /// Phred+33 quality string, same orientation as `seq`.
    pub qual: String,
    /// Auxiliary tags as `(tag, SAM-typed value string)`, e.g.
    /// `("NM", "i:2")`.
    pub tags: Vec<(String, String)>,
}

impl Record {
    /// Build an unmapped-record placeholder for a read with no alignment.
    pub fn unmapped(qname: impl Into<String>, seq: impl Into<String>, qual: impl Into<String>) -> Self {
        Self {
            qname: qname.into(),
            flag: FLAG_UNMAPPED,
            rname: None,
            pos: -1,
            mapq: 0,
            cigar: "*".to_string(),
            rnext: None,
            pnext: -1,
            tlen: 0,
            seq: seq.into(),
            qual: qual.into(),
            tags: Vec::new(),
        }
    }

    /// Add or replace a tag.
    pub fn set_tag(&mut self, tag: &str, value: String) {
        if let Some(existing) = self.tags.iter_mut().find(|(t, _)| t == tag) {
            existing.1 = value;
        } else {
            self.tags.push((tag.to_string(), value));
        }
    }
}

/// Inputs needed to assemble a mapped [`Record`].
pub struct RecordInputs<'a> {
    pub qname: &'a str,
    pub contig_name: &'a str,
    pub pos: i64,
    pub mapq: u8,
    pub traceback: &'a Traceback,
    pub seq: &'a str,
    pub qual: &'a str,
    pub is_reverse: bool,
    pub is_secondary: bool,
    pub is_supplementary: bool,
}

/// Assemble a mapped record (without mate fields; paired fields are filled
/// in by the caller once both mates are resolved).
pub fn build_record(inputs: &RecordInputs) -> Record {
    let mut flag = 0u16;
    if inputs.is_reverse {
        flag |= FLAG_REVERSE;
    }
    if inputs.is_secondary {
        flag |= FLAG_SECONDARY;
    }
    if inputs.is_supplementary {
        flag |= FLAG_SUPPLEMENTARY;
    }

    let mut record = Record {
        qname: inputs.qname.to_string(),
        flag,
        rname: Some(inputs.contig_name.to_string()),
        pos: inputs.pos,
        mapq: inputs.mapq,
        cigar: inputs.traceback.cigar_string(),
        rnext: None,
        pnext: -1,
        tlen: 0,
        seq: inputs.seq.to_string(),
        qual: inputs.qual.to_string(),
        tags: Vec::new(),
    };
    record.set_tag("NM", format!("i:{}", inputs.traceback.nm));
    record.set_tag("MD", format!("Z:{}", inputs.traceback.md));
    record
}

/// Fill in the pairing-dependent SAM fields (flags, `RNEXT`/`PNEXT`, `TLEN`)
/// on two already-built mate records.
pub fn link_mates(mate1: &mut Record, mate2: &mut Record, proper_pair: bool) {
    mate1.flag |= FLAG_PAIRED | FLAG_FIRST_IN_PAIR;
    mate2.flag |= FLAG_PAIRED | FLAG_SECOND_IN_PAIR;

    if proper_pair {
        mate1.flag |= FLAG_PROPER_PAIR;
        mate2.flag |= FLAG_PROPER_PAIR;
    }

    if mate1.rname.is_none() {
        mate2.flag |= FLAG_MATE_UNMAPPED;
    }
    if mate2.rname.is_none() {
        mate1.flag |= FLAG_MATE_UNMAPPED;
    }
    if mate1.flag & FLAG_REVERSE != 0 {
        mate2.flag |= FLAG_MATE_REVERSE;
    }
    if mate2.flag & FLAG_REVERSE != 0 {
        mate1.flag |= FLAG_MATE_REVERSE;
    }

    mate1.rnext = mate2.rname.clone();
    mate2.rnext = mate1.rname.clone();
    mate1.pnext = mate2.pos;
    mate2.pnext = mate1.pos;

    if mate1.rname.is_some() && mate1.rname == mate2.rname {
        let tlen = mate2.pos - mate1.pos;
        mate1.tlen = tlen;
        mate2.tlen = -tlen;
    }

    if mate2.rname.is_some() {
        mate1.set_tag("MC", format!("Z:{}", mate2.cigar));
        mate1.set_tag("MQ", format!("i:{}", mate2.mapq));
    }
    if mate1.rname.is_some() {
        mate2.set_tag("MC", format!("Z:{}", mate1.cigar));
        mate2.set_tag("MQ", format!("i:{}", mate1.mapq));
    }
}

/// External collaborator that persists finished [`Record`]s (e.g. to a BAM
/// file). Implementations are responsible for their own buffering/flushing.
pub trait RecordSink {
    /// Error type surfaced by this sink's I/O backend.
    type Error;

    /// Write one record.
    fn write_record(&mut self, record: &Record) -> Result<(), Self::Error>;

    /// Flush and finalize the output. Called once after all batches have
    /// been written.
    fn finish(&mut self) -> Result<(), Self::Error>;
}

/// In-memory sink used by tests and benchmarks.
#[derive(Debug, Default)]
pub struct InMemorySink {
    pub records: Vec<Record>,
}

impl RecordSink for InMemorySink {
    type Error = std::convert::Infallible;

    fn write_record(&mut self, record: &Record) -> Result<(), Self::Error> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::cigar::{build_traceback, Traceback};
    use crate::genomics::extend::TraceOp;

    fn sample_traceback() -> Traceback {
        build_traceback(&[(TraceOp::Match, 8)], b"ACGTACGT", b"ACGTACGT", 0, 0)
    }

    #[test]
    fn build_record_sets_nm_and_md_tags() {
        let tb = sample_traceback();
        let record = build_record(&RecordInputs {
            qname: "r1",
            contig_name: "chr1",
            pos: 100,
            mapq: 60,
            traceback: &tb,
            seq: "ACGTACGT",
            qual: "IIIIIIII",
            is_reverse: false,
            is_secondary: false,
            is_supplementary: false,
        });
        assert!(record.tags.iter().any(|(t, v)| t == "NM" && v == "i:0"));
        assert!(record.tags.iter().any(|(t, v)| t == "MD" && v == "Z:8"));
    }

    #[test]
    fn link_mates_sets_proper_pair_and_tlen() {
        let tb = sample_traceback();
        let mut mate1 = build_record(&RecordInputs {
            qname: "r1",
            contig_name: "chr1",
            pos: 100,
            mapq: 60,
            traceback: &tb,
            seq: "ACGTACGT",
            qual: "IIIIIIII",
            is_reverse: false,
            is_secondary: false,
            is_supplementary: false,
        });
        let mut mate2 = build_record(&RecordInputs {
            qname: "r1",
            contig_name: "chr1",
            pos: 300,
            mapq: 60,
            traceback: &tb,
            seq: "ACGTACGT",
            qual: "IIIIIIII",
            is_reverse: true,
            is_secondary: false,
            is_supplementary: false,
        });
        link_mates(&mut mate1, &mut mate2, true);
        assert_eq!(mate1.tlen, 200);
        assert_eq!(mate2.tlen, -200);
        assert_ne!(mate1.flag & FLAG_PROPER_PAIR, 0);
        assert_ne!(mate1.flag & FLAG_MATE_REVERSE, 0);
    }

    #[test]
    fn unmapped_mate_sets_mate_unmapped_flag() {
        let mut mate1 = Record::unmapped("r1", "ACGT", "IIII");
        let tb = sample_traceback();
        let mut mate2 = build_record(&RecordInputs {
            qname: "r1",
            contig_name: "chr1",
            pos: 300,
            mapq: 60,
            traceback: &tb,
            seq: "ACGTACGT",
            qual: "IIIIIIII",
            is_reverse: false,
            is_secondary: false,
            is_supplementary: false,
        });
        link_mates(&mut mate1, &mut mate2, false);
        assert_ne!(mate2.flag & FLAG_MATE_UNMAPPED, 0);
    }
}
