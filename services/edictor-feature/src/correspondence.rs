//! Sound correspondences from aligned cognate forms.

use rustc_hash::FxHashMap;

use crate::cluster::group_by;
use crate::types::{CorrespondenceEdge, Row, GAP};

/// Count aligned segment pairs between every two rows of a concept.
///
/// Gaps and identical segments are skipped; every counted pair is
/// recorded in both directions. Rows without an alignment are ignored.
/// Edges are ordered by descending count, then source, then target.
pub fn extract_sound_correspondences(rows: &[Row]) -> Vec<CorrespondenceEdge> {
    let groups = group_by(rows, |row| match &row.alignment {
        Some(alignment) if !alignment.is_empty() => Some(row.concept.as_str()),
        _ => None,
    });

    let mut counts: FxHashMap<(&str, &str), usize> = FxHashMap::default();
    for (_, items) in &groups {
        for i in 0..items.len() {
            for j in i + 1..items.len() {
                let (Some(alm_a), Some(alm_b)) = (&items[i].alignment, &items[j].alignment) else {
                    continue;
                };
                for (a, b) in alm_a.iter().zip(alm_b) {
                    if a == GAP || b == GAP || a == b {
                        continue;
                    }
                    *counts.entry((a.as_str(), b.as_str())).or_insert(0) += 1;
                    *counts.entry((b.as_str(), a.as_str())).or_insert(0) += 1;
                }
            }
        }
    }

    let mut edges: Vec<CorrespondenceEdge> = counts
        .into_iter()
        .map(|((source, target), count)| CorrespondenceEdge::new(source, target, count))
        .collect();
    edges.sort_by(|x, y| {
        y.count
            .cmp(&x.count)
            .then_with(|| x.source.cmp(&y.source))
            .then_with(|| x.target.cmp(&y.target))
    });
    edges
}

/// Tab-separated table with a `SOURCE TARGET COUNT` header.
pub fn to_tsv(edges: &[CorrespondenceEdge]) -> String {
    let mut lines = Vec::with_capacity(edges.len() + 1);
    lines.push("SOURCE\tTARGET\tCOUNT".to_string());
    lines.extend(
        edges
            .iter()
            .map(|e| format!("{}\t{}\t{}", e.source, e.target, e.count)),
    );
    lines.join("\n")
}
