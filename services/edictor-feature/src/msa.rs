//! Star multiple alignment.
//!
//! Every sequence is aligned against the longest one; the insertion runs
//! each pairwise alignment needs in front of a reference segment are merged
//! into a shared column template, and all sequences are projected onto it.

use crate::phonetic::AlignmentProvider;
use crate::types::{Alignment, GAP};

/// Index of the longest sequence, first one on ties.
fn reference_index(sequences: &[Vec<String>]) -> usize {
    let mut best = 0;
    for (i, seq) in sequences.iter().enumerate() {
        if seq.len() > sequences[best].len() {
            best = i;
        }
    }
    best
}

/// Column of the merged template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    /// Padding for insertions relative to the reference.
    Padding,
    /// Position of a reference segment.
    Reference,
}

/// Align `sequences` into equal-length gapped rows, in input order.
///
/// Removing [`GAP`] from row `i` gives back `sequences[i]`.
pub fn multi_align(provider: &dyn AlignmentProvider, sequences: &[Vec<String>]) -> Vec<Vec<String>> {
    if sequences.is_empty() {
        return Vec::new();
    }

    let ref_idx = reference_index(sequences);
    let reference = &sequences[ref_idx];

    // gaps[p]: longest insertion run in front of reference position p;
    // gaps[len] covers trailing insertions.
    let mut gaps = vec![0usize; reference.len() + 1];
    let mut pairwise: Vec<Option<Alignment>> = Vec::with_capacity(sequences.len());

    for (i, seq) in sequences.iter().enumerate() {
        if i == ref_idx {
            pairwise.push(None);
            continue;
        }
        let alignment = provider.align_pair(reference, seq);
        let mut position = 0;
        let mut run = 0;
        for segment in &alignment.sequence_a {
            if segment == GAP {
                run += 1;
                gaps[position] = gaps[position].max(run);
            } else {
                position += 1;
                run = 0;
            }
        }
        pairwise.push(Some(alignment));
    }

    let mut template = Vec::with_capacity(reference.len() + gaps.iter().sum::<usize>());
    for (position, &gap) in gaps.iter().enumerate() {
        template.extend(std::iter::repeat(Column::Padding).take(gap));
        if position < reference.len() {
            template.push(Column::Reference);
        }
    }

    pairwise
        .iter()
        .map(|alignment| match alignment {
            None => project_reference(reference, &template),
            Some(alignment) => project(alignment, &template),
        })
        .collect()
}

fn project_reference(reference: &[String], template: &[Column]) -> Vec<String> {
    let mut segments = reference.iter();
    template
        .iter()
        .map(|column| match column {
            Column::Reference => segments.next().cloned().unwrap_or_else(|| GAP.to_string()),
            Column::Padding => GAP.to_string(),
        })
        .collect()
}

/// Lay one pairwise alignment against the reference onto the template.
///
/// Insertions fill the first padding columns in front of their reference
/// position; the remaining padding stays gapped.
fn project(alignment: &Alignment, template: &[Column]) -> Vec<String> {
    let ref_side = &alignment.sequence_a;
    let own_side = &alignment.sequence_b;
    let mut cursor = 0;
    let mut row = Vec::with_capacity(template.len());

    for column in template {
        let take = match column {
            Column::Reference => true,
            Column::Padding => ref_side.get(cursor).map_or(false, |s| s == GAP),
        };
        if take {
            row.push(own_side.get(cursor).cloned().unwrap_or_else(|| GAP.to_string()));
            cursor += 1;
        } else {
            row.push(GAP.to_string());
        }
    }

    row
}
