//! Mapping-quality estimation.

/// Inputs required to estimate a mapping quality score.
#[derive(Debug, Clone, Copy)]
pub struct MapqInputs {
    /// Score of the best alignment.
    pub best_score: i32,
    /// Score of the next-best overlapping alignment, if any.
    pub sub_score: Option<i32>,
    /// Match bonus used by the scoring scheme (for normalization).
    pub match_score: i32,
    /// Number of other alignments within range of the best score
    /// (`subN` in the classical bwa-mem formula).
    pub sub_count: u32,
    /// Full read length, including any soft-clipped bases, used to
    /// normalize `identity_factor`.
    pub read_len: usize,
}

/// Estimate mapping quality from a best/second-best score pair.
///
/// `mapq ~= round(6.02 * (best - sub) / match - 4.343 * ln(subN + 1)) *
/// identity_factor`, clamped to `[0, 60]`, where `identity_factor = min(1,
/// best / (match * readLen))`. With no competing alignment (`sub_score =
/// None`), the subtraction term is skipped and quality is driven by
/// `identity_factor` alone.
pub fn estimate_mapq(inputs: &MapqInputs) -> u8 {
    if inputs.match_score <= 0 || inputs.read_len == 0 {
        return 0;
    }

    let raw = match inputs.sub_score {
        Some(sub) if sub <= inputs.best_score => {
            let score_term = 6.02 * (inputs.best_score - sub) as f64 / inputs.match_score as f64;
            let penalty_term = 4.343 * ((inputs.sub_count as f64) + 1.0).ln();
            score_term - penalty_term
        }
        _ => 60.0,
    };

    let identity_factor = (inputs.best_score as f64 / (inputs.match_score as f64 * inputs.read_len as f64))
        .min(1.0)
        .max(0.0);
    let scaled = (raw.max(0.0) * identity_factor).round();

    scaled.clamp(0.0, 60.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_alignment_gets_high_mapq() {
        let inputs = MapqInputs {
            best_score: 100,
            sub_score: None,
            match_score: 1,
            sub_count: 0,
            read_len: 100,
        };
        assert_eq!(estimate_mapq(&inputs), 60);
    }

    #[test]
    fn close_second_best_lowers_mapq() {
        let unique = MapqInputs {
            best_score: 100,
            sub_score: Some(40),
            match_score: 1,
            sub_count: 1,
            read_len: 100,
        };
        let contested = MapqInputs {
            best_score: 100,
            sub_score: Some(98),
            match_score: 1,
            sub_count: 1,
            read_len: 100,
        };
        assert!(estimate_mapq(&contested) < estimate_mapq(&unique));
    }

    #[test]
    fn low_identity_reduces_mapq() {
        let high_identity = MapqInputs {
            best_score: 100,
            sub_score: Some(50),
            match_score: 1,
            sub_count: 0,
            read_len: 100,
        };
        let low_identity = MapqInputs {
            best_score: 50,
            sub_score: Some(25),
            match_score: 1,
            sub_count: 0,
            read_len: 100,
        };
        assert!(estimate_mapq(&low_identity) < estimate_mapq(&high_identity));
    }

    #[test]
    fn mapq_never_exceeds_sixty() {
        let inputs = MapqInputs {
            best_score: 1000,
            sub_score: None,
            match_score: 1,
            sub_count: 0,
            read_len: 100,
        };
        assert!(estimate_mapq(&inputs) <= 60);
    }

    #[test]
    fn zero_read_len_is_unmappable() {
        let inputs = MapqInputs {
            best_score: 100,
            sub_score: None,
            match_score: 1,
            sub_count: 0,
            read_len: 0,
        };
        assert_eq!(estimate_mapq(&inputs), 0);
    }
}
