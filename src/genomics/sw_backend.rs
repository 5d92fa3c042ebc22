//! Batch Smith-Waterman backend contract.
//!
//! Extension is expressed against a trait so that a batched, hardware
//! accelerated implementation (GPU, SIMD-batched CPU) can be swapped in
//! without touching the pipeline above it. Only the CPU reference
//! implementation, which simply calls [`banded_affine_sw`] per task, ships
//! here; the `gpu` feature exists to let a downstream crate provide an
//! accelerated implementation behind the same trait.

use crate::genomics::extend::{banded_affine_sw, AlignmentResult, ExtendParams};

/// One independent extension task: a query slice against a reference
/// window.
#[derive(Debug, Clone)]
pub struct SwTask<'a> {
    pub query: &'a [u8],
    pub reference: &'a [u8],
}

/// Executes a batch of independent extension tasks, in order.
///
/// Implementations must preserve task order in the returned vector — the
/// pipeline correlates results back to tasks positionally, not by identity.
pub trait BatchSwBackend {
    /// Run every task in `batch` and return one [`AlignmentResult`] per task,
    /// in the same order.
    fn align_batch(&self, batch: &[SwTask<'_>], params: &ExtendParams) -> Vec<AlignmentResult>;
}

/// Reference CPU implementation: runs [`banded_affine_sw`] once per task.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuSwBackend;

impl BatchSwBackend for CpuSwBackend {
    fn align_batch(&self, batch: &[SwTask<'_>], params: &ExtendParams) -> Vec<AlignmentResult> {
        batch
            .iter()
            .map(|task| banded_affine_sw(task.query, task.reference, params))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_backend_preserves_task_order() {
        let backend = CpuSwBackend;
        let params = ExtendParams::default();
        let batch = vec![
            SwTask {
                query: b"ACGT",
                reference: b"ACGT",
            },
            SwTask {
                query: b"TTTT",
                reference: b"ACGTACGTACGT",
            },
        ];
        let results = backend.align_batch(&batch, &params);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].query_end - results[0].query_start, 4);
    }
}
