//! Paired-end resolution: insert-size estimation, pair scoring, and
//! one-sided mate rescue.

use crate::genomics::extend::{banded_affine_sw, AlignmentResult, ExtendParams, MemAlnReg, Strand};

/// Parameters controlling paired-end resolution.
#[derive(Debug, Clone, Copy)]
pub struct PairingParams {
    /// Minimum number of observed pairs required before trusting an
    /// estimated insert-size distribution over the fallback.
    pub min_pairs_for_estimate: usize,
    /// Number of standard deviations defining the "proper pair" window.
    pub std_devs: f64,
    /// Half-width of the reference window searched for mate rescue, in
    /// bases, when no insert-size estimate is yet available.
    pub rescue_window_fallback: usize,
    /// Penalty subtracted from a pair's score when its placement is
    /// discordant (wrong orientation, or outside the proper-pair window).
    pub unpaired_penalty: i32,
    /// Maximum number of the anchor mate's candidates tried when rescuing
    /// its partner.
    pub max_mate_rescue: usize,
}

impl Default for PairingParams {
    fn default() -> Self {
        Self {
            min_pairs_for_estimate: 200,
            std_devs: 4.0,
            rescue_window_fallback: 500,
            unpaired_penalty: 17,
            max_mate_rescue: 3,
        }
    }
}

/// Relative strand/position orientation of a mapped mate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Forward-then-reverse "innie" layout, the common paired-end case.
    Fr,
    /// Reverse-then-forward "outie" layout, typical of mate-pair libraries.
    Rf,
    /// Both mates on the forward strand.
    Ff,
    /// Both mates on the reverse strand.
    Rr,
}

impl Orientation {
    /// Classify a pair's orientation from each mate's strand and leftmost
    /// reference position.
    pub fn classify(mate1_rbeg: usize, mate1_reverse: bool, mate2_rbeg: usize, mate2_reverse: bool) -> Self {
        match (mate1_reverse, mate2_reverse) {
            (false, false) => Orientation::Ff,
            (true, true) => Orientation::Rr,
            (false, true) => {
                if mate1_rbeg <= mate2_rbeg {
                    Orientation::Fr
                } else {
                    Orientation::Rf
                }
            }
            (true, false) => {
                if mate2_rbeg <= mate1_rbeg {
                    Orientation::Fr
                } else {
                    Orientation::Rf
                }
            }
        }
    }
}

/// Empirical insert-size distribution, estimated once from a batch of
/// confidently-paired reads and then reused for the remainder of the run.
#[derive(Debug, Clone, Copy)]
pub struct InsertSizeDist {
    pub mean: f64,
    pub std_dev: f64,
    /// Lower bound of the "proper pair" window.
    pub low: i64,
    /// Upper bound of the "proper pair" window.
    pub high: i64,
    /// Dominant orientation among the observed pairs; a pair must match
    /// this orientation, as well as the insert-size window, to be "proper".
    pub orientation: Orientation,
}

impl InsertSizeDist {
    /// Estimate a distribution from observed `(insert_size, orientation)`
    /// pairs using a percentile-trimmed mean/std over the magnitudes,
    /// following bwa-mem's approach of discarding outliers before computing
    /// summary statistics, plus a majority vote over orientations.
    pub fn estimate(observed: &[(i64, Orientation)], params: &PairingParams) -> Option<Self> {
        if observed.len() < params.min_pairs_for_estimate {
            return None;
        }

        let mut sorted: Vec<i64> = observed.iter().map(|&(insert, _)| insert.abs()).collect();
        sorted.sort_unstable();
        let n = sorted.len();
        let p10 = sorted[n / 10];
        let p90 = sorted[(n * 9) / 10];

        let trimmed: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|&v| v >= p10 && v <= p90)
            .map(|v| v as f64)
            .collect();

        if trimmed.is_empty() {
            return None;
        }

        let mean = trimmed.iter().sum::<f64>() / trimmed.len() as f64;
        let variance =
            trimmed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / trimmed.len() as f64;
        let std_dev = variance.sqrt();

        let low = (mean - params.std_devs * std_dev).max(0.0) as i64;
        let high = (mean + params.std_devs * std_dev) as i64;

        Some(Self {
            mean,
            std_dev,
            low,
            high,
            orientation: dominant_orientation(observed),
        })
    }

    /// Log-scaled score rewarding insert sizes near the distribution mean.
    pub fn score_insert(&self, insert: i64) -> f64 {
        if self.std_dev <= 0.0 {
            return if insert == self.mean as i64 { 0.0 } else { f64::NEG_INFINITY };
        }
        let z = (insert as f64 - self.mean) / self.std_dev;
        -0.5 * z * z
    }

    /// Whether `insert` falls within the "proper pair" window with the
    /// estimated dominant orientation.
    pub fn is_proper(&self, insert: i64, orientation: Orientation) -> bool {
        orientation == self.orientation && insert.abs() >= self.low && insert.abs() <= self.high
    }
}

fn dominant_orientation(observed: &[(i64, Orientation)]) -> Orientation {
    let mut counts = [0usize; 4];
    let index = |o: Orientation| match o {
        Orientation::Fr => 0,
        Orientation::Rf => 1,
        Orientation::Ff => 2,
        Orientation::Rr => 3,
    };
    for &(_, o) in observed {
        counts[index(o)] += 1;
    }
    let variants = [Orientation::Fr, Orientation::Rf, Orientation::Ff, Orientation::Rr];
    let best = (0..4).max_by_key(|&i| counts[i]).unwrap_or(0);
    variants[best]
}

/// Resolves paired-end placement: scores candidate mate combinations and
/// rescues an unmapped (or poorly placed) mate by searching near its
/// partner.
pub struct PairingResolver {
    dist: Option<InsertSizeDist>,
    params: PairingParams,
}

impl PairingResolver {
    /// Build a resolver with no distribution yet estimated.
    pub fn new(params: PairingParams) -> Self {
        Self { dist: None, params }
    }

    /// One-shot estimation from the first batch of confidently paired reads.
    /// Subsequent calls are no-ops once a distribution has been set.
    pub fn estimate_from_batch(&mut self, observed: &[(i64, Orientation)]) {
        if self.dist.is_some() {
            return;
        }
        self.dist = InsertSizeDist::estimate(observed, &self.params);
    }

    /// Currently estimated distribution, if any.
    pub fn distribution(&self) -> Option<InsertSizeDist> {
        self.dist
    }

    /// Score a candidate pair of mate alignments: `score1 + score2` plus an
    /// insert-size consistency bonus, minus `unpairedPenalty` when the
    /// placement is discordant with the estimated orientation/insert-size
    /// window (zero bonus and no penalty when no distribution has been
    /// estimated yet).
    pub fn score_pair(&self, mate1: &MemAlnReg, mate2: &MemAlnReg) -> f64 {
        let base = (mate1.score + mate2.score) as f64;
        let insert = mate2.rbeg as i64 - mate1.rbeg as i64;
        let orientation = Orientation::classify(
            mate1.rbeg,
            mate1.strand == Strand::Reverse,
            mate2.rbeg,
            mate2.strand == Strand::Reverse,
        );

        match self.dist {
            Some(dist) => {
                let bonus = dist.score_insert(insert.abs());
                let discordant = !dist.is_proper(insert, orientation);
                let penalty = if discordant {
                    self.params.unpaired_penalty as f64
                } else {
                    0.0
                };
                base + bonus - penalty
            }
            None => base,
        }
    }

    /// Reference half-window used to search for a missing mate around an
    /// anchor, derived from the estimated insert-size distribution when
    /// available.
    pub fn rescue_window(&self) -> usize {
        match self.dist {
            Some(d) => (d.mean + self.params.std_devs * d.std_dev).max(0.0) as usize,
            None => self.params.rescue_window_fallback,
        }
    }

    /// Attempt to place `mate_sequence` by extending it against a reference
    /// window built around `anchor`, reusing the same banded affine-gap
    /// kernel as primary extension.
    pub fn rescue_mate(
        &self,
        mate_sequence: &[u8],
        reference_window: &[u8],
        extend_params: &ExtendParams,
    ) -> AlignmentResult {
        banded_affine_sw(mate_sequence, reference_window, extend_params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_requires_minimum_pair_count() {
        let params = PairingParams {
            min_pairs_for_estimate: 10,
            ..PairingParams::default()
        };
        let observed: Vec<(i64, Orientation)> = vec![(300, Orientation::Fr); 5];
        assert!(InsertSizeDist::estimate(&observed, &params).is_none());
    }

    #[test]
    fn estimate_centers_on_trimmed_mean() {
        let params = PairingParams {
            min_pairs_for_estimate: 10,
            ..PairingParams::default()
        };
        let mut observed: Vec<(i64, Orientation)> =
            (280..=320).map(|v| (v, Orientation::Fr)).collect();
        observed.push((100_000, Orientation::Fr)); // outlier, should be trimmed away
        let dist = InsertSizeDist::estimate(&observed, &params).unwrap();
        assert!((dist.mean - 300.0).abs() < 5.0);
        assert_eq!(dist.orientation, Orientation::Fr);
    }

    #[test]
    fn estimate_picks_majority_orientation() {
        let params = PairingParams {
            min_pairs_for_estimate: 10,
            ..PairingParams::default()
        };
        let mut observed: Vec<(i64, Orientation)> =
            (280..=310).map(|v| (v, Orientation::Fr)).collect();
        observed.extend((280..=290).map(|v| (v, Orientation::Ff)));
        let dist = InsertSizeDist::estimate(&observed, &params).unwrap();
        assert_eq!(dist.orientation, Orientation::Fr);
    }

    #[test]
    fn score_insert_peaks_at_mean() {
        let dist = InsertSizeDist {
            mean: 300.0,
            std_dev: 20.0,
            low: 200,
            high: 400,
            orientation: Orientation::Fr,
        };
        assert!(dist.score_insert(300) > dist.score_insert(250));
        assert!(dist.score_insert(300) > dist.score_insert(400));
    }

    #[test]
    fn is_proper_requires_matching_orientation() {
        let dist = InsertSizeDist {
            mean: 300.0,
            std_dev: 20.0,
            low: 200,
            high: 400,
            orientation: Orientation::Fr,
        };
        assert!(dist.is_proper(300, Orientation::Fr));
        assert!(!dist.is_proper(300, Orientation::Ff));
    }

    #[test]
    fn rescue_mate_delegates_to_banded_sw() {
        let resolver = PairingResolver::new(PairingParams::default());
        let result = resolver.rescue_mate(b"ACGTACGT", b"TTTTACGTACGTTTTT", &ExtendParams::default());
        assert!(result.score > 0);
    }
}
