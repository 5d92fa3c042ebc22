//! BAM output sink.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rust_htslib::bam::{
    self,
    header::{Header, HeaderRecord},
    record::{Aux, Cigar, CigarString},
    Writer,
};

use crate::genomics::cigar::CigarOpKind;
use crate::genomics::output::{Record, RecordSink};
use crate::genomics::reference::ReferenceMetadata;

/// Build a BAM header with one `@SQ` line per contig in `reference`.
fn build_header(reference: &ReferenceMetadata, program: &str) -> Header {
    let mut header = Header::new();

    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", &"1.6");
    hd.push_tag(b"SO", &"unsorted");
    header.push_record(&hd);

    for contig in reference.contigs() {
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", &contig.name);
        sq.push_tag(b"LN", &(contig.length as i64));
        header.push_record(&sq);
    }

    let mut pg = HeaderRecord::new(b"PG");
    pg.push_tag(b"ID", &program);
    pg.push_tag(b"PN", &program);
    header.push_record(&pg);

    header
}

/// A [`RecordSink`] that writes alignment records to a BAM file via
/// `rust_htslib`.
pub struct BamRecordSink {
    writer: Writer,
    tid_by_name: HashMap<String, i32>,
}

impl BamRecordSink {
    /// Create a BAM writer at `output_path` with a header derived from
    /// `reference`.
    pub fn create<P: AsRef<Path>>(
        output_path: P,
        reference: &ReferenceMetadata,
        program: &str,
    ) -> Result<Self> {
        let header = build_header(reference, program);
        let writer = Writer::from_path(output_path, &header, bam::Format::Bam)
            .context("failed to create BAM writer")?;

        let tid_by_name = reference
            .contigs()
            .iter()
            .enumerate()
            .map(|(idx, contig)| (contig.name.clone(), idx as i32))
            .collect();

        Ok(Self { writer, tid_by_name })
    }

    fn tid_for(&self, name: &str) -> i32 {
        self.tid_by_name.get(name).copied().unwrap_or(-1)
    }

    fn to_htslib_cigar(cigar_string: &str) -> CigarString {
        let mut ops = Vec::new();
        let mut len_buf = String::new();
        for ch in cigar_string.chars() {
            if ch.is_ascii_digit() {
                len_buf.push(ch);
                continue;
            }
            let len: u32 = len_buf.parse().unwrap_or(0);
            len_buf.clear();
            let op = match ch {
                'M' => Cigar::Match(len),
                'I' => Cigar::Ins(len),
                'D' => Cigar::Del(len),
                'S' => Cigar::SoftClip(len),
                '=' => Cigar::Equal(len),
                'X' => Cigar::Diff(len),
                _ => continue,
            };
            ops.push(op);
        }
        CigarString(ops)
    }
}

impl RecordSink for BamRecordSink {
    type Error = anyhow::Error;

    fn write_record(&mut self, record: &Record) -> Result<(), Self::Error> {
        let mut bam_record = bam::Record::new();
        let cigar = Self::to_htslib_cigar(&record.cigar);
        bam_record.set(
            record.qname.as_bytes(),
            Some(&cigar),
            record.seq.as_bytes(),
            record.qual.as_bytes(),
        );
        bam_record.set_flags(record.flag);
        bam_record.set_mapq(record.mapq);

        if let Some(rname) = &record.rname {
            bam_record.set_tid(self.tid_for(rname));
            bam_record.set_pos(record.pos);
        } else {
            bam_record.set_tid(-1);
            bam_record.set_pos(-1);
        }

        if let Some(rnext) = &record.rnext {
            bam_record.set_mtid(self.tid_for(rnext));
            bam_record.set_mpos(record.pnext);
        } else {
            bam_record.set_mtid(-1);
            bam_record.set_mpos(-1);
        }
        bam_record.set_insert_size(record.tlen);

        for (tag, value) in &record.tags {
            push_tag(&mut bam_record, tag, value)?;
        }

        self.writer
            .write(&bam_record)
            .context("failed to write BAM record")
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn push_tag(bam_record: &mut bam::Record, tag: &str, value: &str) -> Result<()> {
    let tag_bytes = tag.as_bytes();
    let (kind, payload) = value.split_at(value.find(':').map(|_| 2).unwrap_or(0).min(value.len()));
    let payload = payload.trim_start_matches(':');
    match kind.chars().next() {
        Some('i') => {
            let parsed: i64 = payload.parse().unwrap_or(0);
            bam_record.push_aux(tag_bytes, Aux::I32(parsed as i32))?;
        }
        Some('Z') => {
            bam_record.push_aux(tag_bytes, Aux::String(payload))?;
        }
        Some('f') => {
            let parsed: f32 = payload.parse().unwrap_or(0.0);
            bam_record.push_aux(tag_bytes, Aux::Float(parsed))?;
        }
        _ => {
            bam_record.push_aux(tag_bytes, Aux::String(value))?;
        }
    }
    Ok(())
}

/// Translate a CIGAR-op kind to its SAM letter; re-exported for callers that
/// need to print a standalone CIGAR outside of a [`Record`].
pub fn cigar_letter(kind: CigarOpKind) -> char {
    kind.letter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cigar_string_into_htslib_ops() {
        let cigar = BamRecordSink::to_htslib_cigar("5S10M2D3M");
        assert_eq!(cigar.0.len(), 4);
    }
}
