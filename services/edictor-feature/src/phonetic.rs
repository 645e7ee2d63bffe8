//! Global pairwise alignment of token sequences.
//!
//! Needleman-Wunsch style edit grid with a pluggable substitution cost and a
//! fixed indel cost of 1.0. The same grid yields both the gapped alignment
//! (via backtrace) and the normalised sequence distance.

use ndarray::Array2;

use crate::config::ClassPenalties;
use crate::distance::SegmentMetric;
use crate::features::FeatureTable;
use crate::types::{Alignment, EditOp, GAP};

/// Cost of inserting or deleting one segment.
pub const INDEL_COST: f64 = 1.0;

/// Source of substitution costs for the aligners.
///
/// Implementors only provide the segment-by-segment cost matrix; the
/// dynamic programme, backtrace and normalisation are shared.
pub trait AlignmentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `costs[[i, j]]` is the cost of aligning `a[i]` with `b[j]`.
    fn substitution_costs(&self, a: &[String], b: &[String]) -> Array2<f64>;

    fn cost_grid(&self, a: &[String], b: &[String]) -> Array2<f64> {
        cost_grid(&self.substitution_costs(a, b))
    }

    /// Minimum-cost global alignment of `a` and `b`.
    fn align_pair(&self, a: &[String], b: &[String]) -> Alignment {
        let substitution = self.substitution_costs(a, b);
        let grid = cost_grid(&substitution);
        backtrace(a, b, &substitution, &grid)
    }

    /// Alignment cost normalised by the longer sequence.
    ///
    /// Two empty sequences are identical (0.0); an empty sequence against a
    /// non-empty one is maximally distant (1.0).
    fn sequence_distance(&self, a: &[String], b: &[String]) -> f64 {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return 0.0,
            (true, false) | (false, true) => return 1.0,
            _ => {}
        }
        let grid = self.cost_grid(a, b);
        grid[[a.len(), b.len()]] / a.len().max(b.len()) as f64
    }
}

/// Fill the (m+1)×(n+1) edit grid for a precomputed substitution matrix.
pub fn cost_grid(substitution: &Array2<f64>) -> Array2<f64> {
    let (len_a, len_b) = substitution.dim();
    let mut dp = Array2::<f64>::zeros((len_a + 1, len_b + 1));

    for i in 0..=len_a {
        dp[[i, 0]] = i as f64 * INDEL_COST;
    }
    for j in 0..=len_b {
        dp[[0, j]] = j as f64 * INDEL_COST;
    }

    for i in 1..=len_a {
        for j in 1..=len_b {
            let sub = dp[[i - 1, j - 1]] + substitution[[i - 1, j - 1]];
            let del = dp[[i - 1, j]] + INDEL_COST;
            let ins = dp[[i, j - 1]] + INDEL_COST;
            dp[[i, j]] = sub.min(del).min(ins);
        }
    }

    dp
}

/// Walk the grid back from the corner.
///
/// Where several predecessors reach the same cost, substitution wins over
/// deletion, and deletion over insertion.
fn backtrace(a: &[String], b: &[String], substitution: &Array2<f64>, grid: &Array2<f64>) -> Alignment {
    let len_a = a.len();
    let len_b = b.len();

    let mut i = len_a;
    let mut j = len_b;
    let mut operations = Vec::with_capacity(len_a + len_b);
    let mut aligned_a = Vec::with_capacity(len_a + len_b);
    let mut aligned_b = Vec::with_capacity(len_a + len_b);

    while i > 0 || j > 0 {
        let step = if i == 0 {
            EditOp::Insert
        } else if j == 0 {
            EditOp::Delete
        } else {
            let best = grid[[i, j]];
            if best == grid[[i - 1, j - 1]] + substitution[[i - 1, j - 1]] {
                if a[i - 1] == b[j - 1] {
                    EditOp::Match
                } else {
                    EditOp::Substitute
                }
            } else if best == grid[[i - 1, j]] + INDEL_COST {
                EditOp::Delete
            } else {
                EditOp::Insert
            }
        };

        match step {
            EditOp::Match | EditOp::Substitute => {
                aligned_a.push(a[i - 1].clone());
                aligned_b.push(b[j - 1].clone());
                i -= 1;
                j -= 1;
            }
            EditOp::Delete => {
                aligned_a.push(a[i - 1].clone());
                aligned_b.push(GAP.to_string());
                i -= 1;
            }
            EditOp::Insert => {
                aligned_a.push(GAP.to_string());
                aligned_b.push(b[j - 1].clone());
                j -= 1;
            }
        }
        operations.push(step);
    }

    operations.reverse();
    aligned_a.reverse();
    aligned_b.reverse();

    Alignment::new(aligned_a, aligned_b, operations, grid[[len_a, len_b]])
}

/// Substitution cost from segment feature vectors.
pub struct FeatureAligner<'t> {
    table: &'t FeatureTable,
    metric: SegmentMetric,
}

impl<'t> FeatureAligner<'t> {
    pub fn new(table: &'t FeatureTable, penalties: ClassPenalties) -> Self {
        Self {
            table,
            metric: SegmentMetric::for_names(table.names(), penalties),
        }
    }
}

impl AlignmentProvider for FeatureAligner<'_> {
    fn name(&self) -> &'static str {
        "feature"
    }

    fn substitution_costs(&self, a: &[String], b: &[String]) -> Array2<f64> {
        let vecs_a = self.table.vectorize_all(a);
        let vecs_b = self.table.vectorize_all(b);
        Array2::from_shape_fn((a.len(), b.len()), |(i, j)| {
            self.metric.distance(&vecs_a[i], &vecs_b[j])
        })
    }
}

/// Unit substitution cost: plain segment edit distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAligner;

impl AlignmentProvider for IdentityAligner {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn substitution_costs(&self, a: &[String], b: &[String]) -> Array2<f64> {
        Array2::from_shape_fn((a.len(), b.len()), |(i, j)| {
            if a[i] == b[j] {
                0.0
            } else {
                1.0
            }
        })
    }
}

/// Owned token sequence from string slices.
pub fn tokens(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}
