//! Collinear seed chaining.
//!
//! Seed hits that lie on (approximately) the same diagonal `rpos - qbeg` and
//! are close enough together on both axes are grouped into a [`Chain`].
//! Chains are scored by the total query bases they cover and filtered by a
//! minimum weight before being handed to extension.

use crate::genomics::seed::SeedHit;

/// Parameters controlling chain construction.
#[derive(Debug, Clone, Copy)]
pub struct ChainingParams {
    /// Maximum allowed gap (on either query or reference axis) between two
    /// seeds for them to be considered part of the same chain.
    pub max_chain_gap: i64,
    /// Maximum allowed drift in the diagonal (`rpos - qbeg`) between two
    /// seeds in the same chain.
    pub bandwidth: i64,
    /// Chains covering fewer query bases than this are dropped.
    pub min_chain_weight: usize,
    /// A chain whose reference range is contained in a higher-weight
    /// chain's range is dropped if its weight is below this fraction of
    /// the overlapping chain's weight.
    pub chain_drop_ratio: f64,
}

impl Default for ChainingParams {
    fn default() -> Self {
        Self {
            max_chain_gap: 10_000,
            bandwidth: 100,
            min_chain_weight: 0,
            chain_drop_ratio: 0.5,
        }
    }
}

/// A group of collinear seed hits, approximating one candidate alignment
/// location.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Member hits, sorted by query start offset.
    pub hits: Vec<SeedHit>,
}

impl Chain {
    /// Smallest reference position spanned by this chain.
    pub fn rpos_min(&self) -> usize {
        self.hits.iter().map(|h| h.rpos).min().unwrap_or(0)
    }

    /// Largest reference end position spanned by this chain.
    pub fn rpos_max(&self) -> usize {
        self.hits
            .iter()
            .map(|h| h.rpos + h.len())
            .max()
            .unwrap_or(0)
    }

    /// Smallest query start offset spanned by this chain.
    pub fn qbeg_min(&self) -> usize {
        self.hits.iter().map(|h| h.qbeg).min().unwrap_or(0)
    }

    /// Largest query end offset spanned by this chain.
    pub fn qend_max(&self) -> usize {
        self.hits.iter().map(|h| h.qend).max().unwrap_or(0)
    }

    /// Approximate diagonal of the chain (from its first hit).
    pub fn diagonal(&self) -> i64 {
        self.hits
            .first()
            .map(|h| h.rpos as i64 - h.qbeg as i64)
            .unwrap_or(0)
    }

    /// Weight of the chain: total distinct query bases covered by its
    /// member hits (overlaps counted once).
    pub fn weight(&self) -> usize {
        let mut intervals: Vec<(usize, usize)> = self.hits.iter().map(|h| (h.qbeg, h.qend)).collect();
        intervals.sort_unstable();
        let mut covered = 0usize;
        let mut cursor = 0usize;
        for (start, end) in intervals {
            let start = start.max(cursor);
            if end > start {
                covered += end - start;
                cursor = end;
            }
        }
        covered
    }
}

/// Greedy collinear chaining over a read's seed hits.
pub struct Chainer {
    params: ChainingParams,
}

impl Chainer {
    /// Build a chainer with the given parameters.
    pub fn new(params: ChainingParams) -> Self {
        Self { params }
    }

    /// Group `hits` into chains, sorted by descending weight.
    pub fn chain(&self, hits: &[SeedHit]) -> Vec<Chain> {
        let mut sorted: Vec<SeedHit> = hits.to_vec();
        sorted.sort_by(|a, b| {
            let diag_a = a.rpos as i64 - a.qbeg as i64;
            let diag_b = b.rpos as i64 - b.qbeg as i64;
            diag_a
                .cmp(&diag_b)
                .then(a.qbeg.cmp(&b.qbeg))
                .then(a.rpos.cmp(&b.rpos))
        });

        let mut chains: Vec<Chain> = Vec::new();

        for hit in sorted {
            let mut attached = false;
            for chain in chains.iter_mut().rev() {
                let last = chain.hits.last().expect("chain always non-empty");
                let diag_last = last.rpos as i64 - last.qbeg as i64;
                let diag_hit = hit.rpos as i64 - hit.qbeg as i64;
                let drift = (diag_hit - diag_last).abs();

                let q_gap = hit.qbeg as i64 - last.qend as i64;
                let r_gap = hit.rpos as i64 - (last.rpos + last.len()) as i64;

                if drift <= self.params.bandwidth
                    && q_gap >= -(last.len() as i64)
                    && q_gap <= self.params.max_chain_gap
                    && r_gap >= -(last.len() as i64)
                    && r_gap <= self.params.max_chain_gap
                    && hit.qbeg >= chain.qbeg_min()
                {
                    chain.hits.push(hit);
                    attached = true;
                    break;
                }
            }

            if !attached {
                chains.push(Chain { hits: vec![hit] });
            }
        }

        chains.retain(|c| c.weight() >= self.params.min_chain_weight);
        chains.sort_by(|a, b| b.weight().cmp(&a.weight()));

        let mut keep = vec![true; chains.len()];
        for i in 0..chains.len() {
            let best_overlapping_weight = chains[..i]
                .iter()
                .zip(&keep[..i])
                .filter(|(other, &kept)| kept && ranges_overlap(&chains[i], other))
                .map(|(other, _)| other.weight())
                .max();
            if let Some(best) = best_overlapping_weight {
                keep[i] = (chains[i].weight() as f64) >= self.params.chain_drop_ratio * best as f64;
            }
        }
        let mut keep = keep.into_iter();
        chains.retain(|_| keep.next().unwrap());
        chains
    }
}

/// Whether two chains' reference ranges overlap at all.
fn ranges_overlap(a: &Chain, b: &Chain) -> bool {
    a.rpos_min() < b.rpos_max() && b.rpos_min() < a.rpos_max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(qbeg: usize, qend: usize, rpos: usize) -> SeedHit {
        SeedHit { qbeg, qend, rpos }
    }

    #[test]
    fn collinear_hits_form_one_chain() {
        let hits = vec![hit(0, 20, 1000), hit(25, 45, 1025), hit(50, 70, 1050)];
        let chainer = Chainer::new(ChainingParams::default());
        let chains = chainer.chain(&hits);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].hits.len(), 3);
        assert_eq!(chains[0].weight(), 70);
    }

    #[test]
    fn hits_on_different_diagonals_form_separate_chains() {
        let hits = vec![hit(0, 20, 1000), hit(0, 20, 5000)];
        let chainer = Chainer::new(ChainingParams::default());
        let chains = chainer.chain(&hits);
        assert_eq!(chains.len(), 2);
    }

    #[test]
    fn chains_sorted_by_descending_weight() {
        let hits = vec![hit(0, 10, 1000), hit(0, 50, 9000)];
        let chainer = Chainer::new(ChainingParams::default());
        let chains = chainer.chain(&hits);
        assert_eq!(chains.len(), 2);
        assert!(chains[0].weight() >= chains[1].weight());
    }

    #[test]
    fn weak_chain_contained_in_stronger_overlapping_chain_is_dropped() {
        let hits = vec![hit(0, 60, 1000), hit(200, 210, 1010)];
        let mut params = ChainingParams::default();
        params.chain_drop_ratio = 0.5;
        let chainer = Chainer::new(params);
        let chains = chainer.chain(&hits);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].weight(), 60);
    }

    #[test]
    fn overlapping_chain_above_drop_ratio_is_kept() {
        let hits = vec![hit(0, 60, 1000), hit(500, 550, 1030)];
        let chainer = Chainer::new(ChainingParams::default());
        let chains = chainer.chain(&hits);
        assert_eq!(chains.len(), 2);
    }
}
