//! End-to-end orchestration: seed, chain, extend, classify, score, and
//! record every read or read pair submitted to a [`Pipeline`].
//!
//! A batch is processed with a rayon order-preserving parallel map so the
//! output vector lines up positionally with the input slice regardless of
//! how work is scheduled across threads. Cancellation is a single shared
//! flag checked once per read: a read already being processed always runs
//! to completion, so a batch never emits a half-built record for a read it
//! started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::config::AlignerConfig;
use crate::genomics::chain::{Chain, Chainer};
use crate::genomics::cigar::build_traceback;
use crate::genomics::classify::{classify_regions, ClassifiedRegion, RegionRole};
use crate::genomics::extend::{extend_from_anchor, Anchor, ExtendParams, MemAlnReg, Strand, TraceOp};
use crate::genomics::fm_index::FmIndex;
use crate::genomics::mapq::{estimate_mapq, MapqInputs};
use crate::genomics::output::{build_record, link_mates, Record, RecordInputs, FLAG_REVERSE};
use crate::genomics::pairing::{Orientation, PairingResolver};
use crate::genomics::read::{ReadPair, ReadSequence};
use crate::genomics::reference::ReferenceMetadata;
use crate::genomics::seed::Seeder;

/// Padding added on each side of a chain's reference window beyond the
/// chaining bandwidth, giving the affine-gap DP room to place indels near
/// the chain's edges.
const WINDOW_SLACK: usize = 50;
/// How many of each mate's top-scoring candidates are checked against each
/// other when picking the jointly best-scoring pair.
const PAIR_CANDIDATE_FANOUT: usize = 3;

/// A unit of work submitted to the pipeline: an unpaired read or a mate pair.
pub enum ReadRecord {
    Single(ReadSequence),
    Pair(ReadPair),
}

/// One extended chain: the classification/reporting layer consumes
/// [`MemAlnReg`], but producing the final CIGAR/MD needs the raw trace ops
/// and the reference window they were computed against, so this keeps the
/// two together until the record is built.
struct Candidate {
    region: MemAlnReg,
    window_start: usize,
    window: Vec<u8>,
    ops: Vec<(TraceOp, u32)>,
}

/// Wires seeding, chaining, extension, classification, mapping-quality
/// estimation, and pairing into per-read and per-pair record sets over a
/// fixed reference and index.
pub struct Pipeline<'a> {
    reference: &'a ReferenceMetadata,
    index: &'a FmIndex,
    config: AlignerConfig,
    cancel: Arc<AtomicBool>,
    pairing: Mutex<PairingResolver>,
}

impl<'a> Pipeline<'a> {
    /// Build a pipeline over `reference`/`index` using `config`'s scoring
    /// and stage parameters.
    pub fn new(reference: &'a ReferenceMetadata, index: &'a FmIndex, config: AlignerConfig) -> Self {
        let pairing = PairingResolver::new(config.pairing.to_params(&config.scoring));
        Self {
            reference,
            index,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            pairing: Mutex::new(pairing),
        }
    }

    /// A shared flag that, once set, stops the pipeline from starting work
    /// on any further read. Reads already in flight when it is set still
    /// finish and are included in the batch's results.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Align a batch of reads/pairs, preserving input order in the result.
    pub fn align_batch(&self, reads: &[ReadRecord]) -> Vec<Vec<Record>> {
        self.prime_insert_size_estimate(reads);

        reads
            .par_iter()
            .map(|record| {
                if self.is_cancelled() {
                    return Vec::new();
                }
                match record {
                    ReadRecord::Single(read) => self.align_one(read),
                    ReadRecord::Pair(pair) => {
                        let (mut mate1, mut mate2) = self.align_pair(pair);
                        mate1.append(&mut mate2);
                        mate1
                    }
                }
            })
            .collect()
    }

    /// Opportunistically learn the insert-size distribution from this
    /// batch's confidently-placed pairs (mates landing on opposite strands)
    /// before the main parallel pass, so proper-pair tagging and mate rescue
    /// within the same batch can use it. A no-op once a distribution has
    /// already been estimated.
    fn prime_insert_size_estimate(&self, reads: &[ReadRecord]) {
        if self
            .pairing
            .lock()
            .expect("pairing lock poisoned")
            .distribution()
            .is_some()
        {
            return;
        }

        let inserts: Vec<(i64, Orientation)> = reads
            .par_iter()
            .filter_map(|record| match record {
                ReadRecord::Pair(pair) => {
                    let mate1 = self.extend_candidates(&pair.mate1);
                    let mate2 = self.extend_candidates(&pair.mate2);
                    match (mate1.first(), mate2.first()) {
                        (Some(a), Some(b)) if a.region.strand != b.region.strand => {
                            let insert = b.region.rbeg as i64 - a.region.rbeg as i64;
                            let orientation = Orientation::classify(
                                a.region.rbeg,
                                a.region.strand == Strand::Reverse,
                                b.region.rbeg,
                                b.region.strand == Strand::Reverse,
                            );
                            Some((insert, orientation))
                        }
                        _ => None,
                    }
                }
                ReadRecord::Single(_) => None,
            })
            .collect();

        self.pairing
            .lock()
            .expect("pairing lock poisoned")
            .estimate_from_batch(&inserts);
    }

    /// Seed, chain, extend, classify, and score `read`, returning one record
    /// per reported alignment (or a single unmapped record).
    pub fn align_one(&self, read: &ReadSequence) -> Vec<Record> {
        let candidates = self.extend_candidates(read);
        if candidates.is_empty() {
            return vec![Record::unmapped(
                read.name.clone(),
                bytes_to_string(&read.sequence_ascii()),
                phred_to_ascii(&read.qualities),
            )];
        }
        self.regions_to_records(read, candidates)
    }

    /// Align both mates independently, reconcile their placement with the
    /// jointly best-scoring combination, rescue a missing mate against its
    /// partner's neighborhood when possible, and link the resulting records.
    pub fn align_pair(&self, pair: &ReadPair) -> (Vec<Record>, Vec<Record>) {
        let mut mate1_candidates = self.extend_candidates(&pair.mate1);
        let mut mate2_candidates = self.extend_candidates(&pair.mate2);

        self.reorder_by_best_pair(&mut mate1_candidates, &mut mate2_candidates);

        if mate1_candidates.is_empty() {
            if let Some(rescued) = self.rescue_against(&pair.mate1, &mate2_candidates) {
                mate1_candidates.push(rescued);
            }
        }
        if mate2_candidates.is_empty() {
            if let Some(rescued) = self.rescue_against(&pair.mate2, &mate1_candidates) {
                mate2_candidates.push(rescued);
            }
        }

        let proper = match (mate1_candidates.first(), mate2_candidates.first()) {
            (Some(a), Some(b)) => {
                let insert = b.region.rbeg as i64 - a.region.rbeg as i64;
                let orientation = Orientation::classify(
                    a.region.rbeg,
                    a.region.strand == Strand::Reverse,
                    b.region.rbeg,
                    b.region.strand == Strand::Reverse,
                );
                self.pairing
                    .lock()
                    .expect("pairing lock poisoned")
                    .distribution()
                    .map(|d| d.is_proper(insert, orientation))
                    .unwrap_or(false)
            }
            _ => false,
        };

        let mut records1 = if mate1_candidates.is_empty() {
            vec![Record::unmapped(
                pair.mate1.name.clone(),
                bytes_to_string(&pair.mate1.sequence_ascii()),
                phred_to_ascii(&pair.mate1.qualities),
            )]
        } else {
            self.regions_to_records(&pair.mate1, mate1_candidates)
        };

        let mut records2 = if mate2_candidates.is_empty() {
            vec![Record::unmapped(
                pair.mate2.name.clone(),
                bytes_to_string(&pair.mate2.sequence_ascii()),
                phred_to_ascii(&pair.mate2.qualities),
            )]
        } else {
            self.regions_to_records(&pair.mate2, mate2_candidates)
        };

        link_mates(&mut records1[0], &mut records2[0], proper);
        (records1, records2)
    }

    /// Swap the jointly best-scoring candidate of each mate (by insert-size
    /// and alignment-score combined) into the first slot, so it becomes the
    /// primary once classification runs independently on each mate.
    fn reorder_by_best_pair(&self, mate1: &mut [Candidate], mate2: &mut [Candidate]) {
        if mate1.is_empty() || mate2.is_empty() {
            return;
        }

        let pairing = self.pairing.lock().expect("pairing lock poisoned");
        let mut best = (0usize, 0usize, f64::NEG_INFINITY);
        for (i, a) in mate1.iter().take(PAIR_CANDIDATE_FANOUT).enumerate() {
            for (j, b) in mate2.iter().take(PAIR_CANDIDATE_FANOUT).enumerate() {
                let score = pairing.score_pair(&a.region, &b.region);
                if score > best.2 {
                    best = (i, j, score);
                }
            }
        }
        drop(pairing);

        mate1.swap(0, best.0);
        mate2.swap(0, best.1);
    }

    /// Search for `mate` in the reference neighborhood of up to
    /// `max_mate_rescue` of `anchors`' best candidates, reusing the
    /// paired-end resolver's rescue window and the shared extension kernel,
    /// and keeping the best-scoring successful rescue.
    fn rescue_against(&self, mate: &ReadSequence, anchors: &[Candidate]) -> Option<Candidate> {
        let params = self.config.scoring.to_extend_params();
        let max_attempts = self.config.scoring.max_mate_rescue.max(1);

        let pairing = self.pairing.lock().expect("pairing lock poisoned");
        let half_window = pairing.rescue_window();

        let mut best: Option<Candidate> = None;
        for anchor in anchors.iter().take(max_attempts) {
            let window_start = anchor.region.rbeg.saturating_sub(half_window);
            let window_end = (anchor.region.rend + half_window).min(self.reference.text_length());
            if window_start >= window_end {
                continue;
            }
            let window = self.reference.slice(window_start, window_end);
            let result = pairing.rescue_mate(&mate.sequence_ascii(), &window, &params);
            if result.query_end <= result.query_start {
                continue;
            }

            let strand = if self.reference.is_reverse_half(window_start) {
                Strand::Reverse
            } else {
                Strand::Forward
            };

            let region = MemAlnReg {
                qbeg: result.query_start,
                qend: result.query_end,
                rbeg: window_start + result.ref_start,
                rend: window_start + result.ref_end,
                score: result.score,
                strand,
                sub_score: None,
                secondary: false,
            };

            if best.as_ref().map(|b| region.score > b.region.score).unwrap_or(true) {
                best = Some(Candidate {
                    region,
                    window_start,
                    window,
                    ops: result.ops,
                });
            }
        }

        best
    }

    /// Seed, chain, and extend every chain for `read`, returning candidates
    /// sorted by descending score.
    fn extend_candidates(&self, read: &ReadSequence) -> Vec<Candidate> {
        let seeder = Seeder::new(self.index, self.config.seeding.to_params());
        let hits = seeder.seed_hits(read);
        if hits.is_empty() {
            return Vec::new();
        }

        let chainer = Chainer::new(self.config.chaining.to_params());
        let chains = chainer.chain(&hits);
        let extend_params = self.config.scoring.to_extend_params();
        let query = read.sequence_ascii();

        let mut candidates: Vec<Candidate> = chains
            .iter()
            .filter_map(|chain| self.extend_chain(chain, &query, &extend_params))
            .collect();

        candidates.sort_by(|a, b| b.region.score.cmp(&a.region.score));
        candidates
    }

    /// Extend one chain against a reference window built around its span,
    /// padded by the chaining bandwidth plus [`WINDOW_SLACK`], anchoring the
    /// extension on the chain's longest seed hit and running independent
    /// left/right flank extensions around it.
    fn extend_chain(&self, chain: &Chain, query: &[u8], params: &ExtendParams) -> Option<Candidate> {
        let pad = self.config.chaining.bandwidth.max(0) as usize + WINDOW_SLACK;
        let window_start = chain.rpos_min().saturating_sub(pad);
        let window_end = (chain.rpos_max() + pad).min(self.reference.text_length());
        if window_start >= window_end {
            return None;
        }

        let window = self.reference.slice(window_start, window_end);
        let anchor_hit = chain.hits.iter().max_by_key(|h| h.len())?;
        let anchor = Anchor {
            qbeg: anchor_hit.qbeg,
            qend: anchor_hit.qend,
            rbeg: anchor_hit.rpos - window_start,
            rend: anchor_hit.rpos - window_start + anchor_hit.len(),
        };
        let result = extend_from_anchor(query, &window, anchor, params);
        if result.query_end <= result.query_start {
            return None;
        }

        let strand = if self.reference.is_reverse_half(chain.rpos_min()) {
            Strand::Reverse
        } else {
            Strand::Forward
        };

        let region = MemAlnReg {
            qbeg: result.query_start,
            qend: result.query_end,
            rbeg: window_start + result.ref_start,
            rend: window_start + result.ref_end,
            score: result.score,
            strand,
            sub_score: None,
            secondary: false,
        };

        Some(Candidate {
            region,
            window_start,
            window,
            ops: result.ops,
        })
    }

    /// Classify extended candidates and render each kept one into a
    /// [`Record`]: `Secondary` hits are folded into the primary's `XA:Z` tag
    /// rather than emitted as their own record, and the remaining
    /// primary/supplementary records get reciprocal `SA:Z` tags.
    fn regions_to_records(&self, read: &ReadSequence, candidates: Vec<Candidate>) -> Vec<Record> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let best_score = candidates[0].region.score;
        let sub_score = candidates.get(1).map(|c| c.region.score);
        let sub_count = candidates.len().saturating_sub(1) as u32;
        let match_score = self.config.scoring.match_score;

        let regions: Vec<MemAlnReg> = candidates.iter().map(|c| c.region.clone()).collect();
        let contig_is_alt = |region: &MemAlnReg| {
            self.reference
                .locate_text_pos(region.rbeg)
                .map(|(idx, _, _)| self.reference.contigs()[idx].is_alt)
                .unwrap_or(false)
        };
        let classified = classify_regions(regions, contig_is_alt, &self.config.classification.to_params());

        let primary_score = classified
            .iter()
            .find(|c| c.role == RegionRole::Primary)
            .map(|c| c.region.score)
            .unwrap_or(best_score);
        let best_alt_score = classified.iter().filter(|c| c.is_alt).map(|c| c.region.score).max();
        let pa = best_alt_score
            .filter(|_| primary_score > 0)
            .map(|alt| alt as f32 / primary_score as f32);

        let built: Vec<(RegionRole, Record)> = classified
            .iter()
            .map(|entry| {
                let candidate = candidates
                    .iter()
                    .find(|c| c.region.rbeg == entry.region.rbeg && c.region.qbeg == entry.region.qbeg)
                    .expect("classified region originates from a known candidate");
                let record =
                    self.build_record_for(read, candidate, entry, best_score, sub_score, sub_count, match_score, pa);
                (entry.role, record)
            })
            .collect();

        let xa = build_xa_tag(&built);

        let mut records: Vec<Record> = built
            .into_iter()
            .filter(|(role, _)| *role != RegionRole::Secondary)
            .map(|(_, mut record)| {
                if let Some(xa) = &xa {
                    record.set_tag("XA", format!("Z:{}", xa));
                }
                record
            })
            .collect();

        attach_sa_tags(&mut records);
        records
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record_for(
        &self,
        read: &ReadSequence,
        candidate: &Candidate,
        entry: &ClassifiedRegion,
        best_score: i32,
        sub_score: Option<i32>,
        sub_count: u32,
        match_score: i32,
        pa: Option<f32>,
    ) -> Record {
        let region = &candidate.region;
        let is_reverse = region.strand == Strand::Reverse;
        let window_slice =
            &candidate.window[region.rbeg - candidate.window_start..region.rend - candidate.window_start];

        let (ops, query_slice, reference_slice, leading_clip, trailing_clip, seq_bytes, qual_bytes, forward_rbeg) =
            if is_reverse {
                let rc_read = read.reverse_complement();
                let leading = (read.len() - region.qend) as u32;
                let trailing = region.qbeg as u32;
                let aligned = leading as usize..rc_read.len() - trailing as usize;

                let mut ops = candidate.ops.clone();
                ops.reverse();

                (
                    ops,
                    rc_read.sequence_ascii()[aligned].to_vec(),
                    revcomp_bytes(window_slice),
                    leading,
                    trailing,
                    rc_read.sequence_ascii(),
                    rc_read.qualities.clone(),
                    self.reference.mirror_to_forward(region.rend - 1),
                )
            } else {
                let leading = region.qbeg as u32;
                let trailing = (read.len() - region.qend) as u32;
                (
                    candidate.ops.clone(),
                    read.sequence_ascii()[region.qbeg..region.qend].to_vec(),
                    window_slice.to_vec(),
                    leading,
                    trailing,
                    read.sequence_ascii(),
                    read.qualities.clone(),
                    region.rbeg,
                )
            };

        let traceback = build_traceback(&ops, &query_slice, &reference_slice, leading_clip, trailing_clip);
        let forward_rbeg = forward_rbeg + traceback.leading_ref_skip as usize;

        let (contig_idx, local_offset) = self
            .reference
            .locate(forward_rbeg)
            .expect("an extended alignment's position must resolve to a contig");
        let contig_name = self.reference.contigs()[contig_idx].name.clone();

        let mapq = if entry.role == RegionRole::Secondary {
            0
        } else {
            estimate_mapq(&MapqInputs {
                best_score,
                sub_score,
                match_score,
                sub_count,
                read_len: read.len(),
            })
        };

        let mut record = build_record(&RecordInputs {
            qname: &read.name,
            contig_name: &contig_name,
            pos: local_offset as i64,
            mapq,
            traceback: &traceback,
            seq: &bytes_to_string(&seq_bytes),
            qual: &phred_to_ascii(&qual_bytes),
            is_reverse,
            is_secondary: entry.role == RegionRole::Secondary,
            is_supplementary: entry.role == RegionRole::Supplementary,
        });

        record.set_tag("AS", format!("i:{}", region.score));
        record.set_tag("XS", format!("i:{}", sub_score.unwrap_or(0)));
        if let Some(rg) = &self.config.read_group {
            record.set_tag("RG", format!("Z:{}", rg));
        }
        if entry.is_alt {
            if let Some(pa) = pa {
                record.set_tag("pa", format!("f:{}", pa));
            }
        }
        record
    }
}

/// Render `Secondary`-role records (folded out of the primary record set)
/// into an `XA:Z` alternate-hit string: `rname,[+-]pos,cigar,nm;` per entry.
fn build_xa_tag(built: &[(RegionRole, Record)]) -> Option<String> {
    let mut entries = String::new();
    for (role, record) in built {
        if *role != RegionRole::Secondary {
            continue;
        }
        let rname = record.rname.as_deref().unwrap_or("*");
        let strand = if record.flag & FLAG_REVERSE != 0 { '-' } else { '+' };
        entries.push_str(&format!(
            "{},{}{},{},{};",
            rname,
            strand,
            record.pos + 1,
            record.cigar,
            nm_of(record)
        ));
    }
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

fn nm_of(record: &Record) -> String {
    record
        .tags
        .iter()
        .find(|(t, _)| t == "NM")
        .map(|(_, v)| v.trim_start_matches("i:").to_string())
        .unwrap_or_else(|| "0".to_string())
}

/// Attach reciprocal `SA:Z` chimeric-alignment tags across the
/// primary/supplementary records kept for one read.
fn attach_sa_tags(records: &mut [Record]) {
    if records.len() < 2 {
        return;
    }
    let entries: Vec<String> = records
        .iter()
        .map(|r| {
            let rname = r.rname.as_deref().unwrap_or("*");
            let strand = if r.flag & FLAG_REVERSE != 0 { '-' } else { '+' };
            format!("{},{},{},{},{},{};", rname, r.pos + 1, strand, r.cigar, r.mapq, nm_of(r))
        })
        .collect();
    for i in 0..records.len() {
        let sa: String = entries
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, e)| e.clone())
            .collect();
        records[i].set_tag("SA", format!("Z:{}", sa));
    }
}

fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Raw Phred scores to a Phred+33 ASCII quality string.
fn phred_to_ascii(quals: &[u8]) -> String {
    quals.iter().map(|&q| (q.saturating_add(33)).min(126) as char).collect()
}

fn revcomp_bytes(bases: &[u8]) -> Vec<u8> {
    bases.iter().rev().map(|&b| complement_base(b)).collect()
}

fn complement_base(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => b'N',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::output::FLAG_REVERSE;

    const REFERENCE: &[u8] =
        b"TGCATGACTGATCGTAGCTAGCATCGTAGCTAGCATGACTGACGTAGCTAGCATGCATGCTAGCATGCTAGCATCGTACGATCGTAGCATCGTAGCTAGG";

    fn build_reference() -> ReferenceMetadata {
        ReferenceMetadata::build(&[("chr1".to_string(), REFERENCE.to_vec(), false)]).unwrap()
    }

    fn read_from(name: &str, slice: &[u8]) -> ReadSequence {
        ReadSequence::new(name, slice, vec![30; slice.len()]).unwrap()
    }

    #[test]
    fn single_read_aligns_end_to_end() {
        let reference = build_reference();
        let index = FmIndex::build(reference.text()).unwrap();
        let pipeline = Pipeline::new(&reference, &index, AlignerConfig::default());

        let read = read_from("r1", &REFERENCE[20..60]);
        let records = pipeline.align_one(&read);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pos, 20);
        assert_eq!(records[0].cigar, "40M");
        assert_eq!(records[0].mapq, 60);
        assert_eq!(records[0].flag & FLAG_REVERSE, 0);
    }

    #[test]
    fn reverse_strand_read_reports_correct_position_and_flag() {
        let reference = build_reference();
        let index = FmIndex::build(reference.text()).unwrap();
        let pipeline = Pipeline::new(&reference, &index, AlignerConfig::default());

        let forward_slice = read_from("r2", &REFERENCE[30..70]);
        let observed = read_from("r2", &forward_slice.reverse_complement().sequence_ascii());
        let records = pipeline.align_one(&observed);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pos, 30);
        assert_eq!(records[0].cigar, "40M");
        assert_ne!(records[0].flag & FLAG_REVERSE, 0);
    }

    #[test]
    fn paired_reads_link_with_mate_fields_set() {
        let reference = build_reference();
        let index = FmIndex::build(reference.text()).unwrap();
        let pipeline = Pipeline::new(&reference, &index, AlignerConfig::default());

        let mate1 = read_from("p1", &REFERENCE[0..40]);
        let mate2_forward = read_from("p1", &REFERENCE[60..100]);
        let mate2 = read_from("p1", &mate2_forward.reverse_complement().sequence_ascii());

        let (records1, records2) = pipeline.align_pair(&ReadPair { mate1, mate2 });

        assert_eq!(records1[0].pos, 0);
        assert_eq!(records2[0].pos, 60);
        assert_ne!(records2[0].flag & FLAG_REVERSE, 0);
        assert_eq!(records1[0].rnext.as_deref(), records2[0].rname.as_deref());
        assert_eq!(records2[0].rnext.as_deref(), records1[0].rname.as_deref());
    }
}
