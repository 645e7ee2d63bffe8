//! Pairwise distances between doculects.

use std::collections::BTreeMap;
use std::fmt::Write;

use ahash::AHashMap;
use ndarray::Array2;
use rayon::prelude::*;

use crate::phonetic::AlignmentProvider;
use crate::types::Row;

/// Distance between two taxa without a shared concept.
pub const NO_OVERLAP_DISTANCE: f64 = 1.0;

/// Characters with structural meaning in Newick text.
const NEWICK_RESERVED: &[char] = &['(', ')', ':', ';', ','];

/// Forms per concept, at most one per taxon.
struct ConceptTable<'r> {
    taxa: Vec<String>,
    /// `forms[c][t]`: form of taxon `t` for the c-th concept.
    forms: Vec<Vec<Option<&'r [String]>>>,
}

impl<'r> ConceptTable<'r> {
    fn new(rows: &'r [Row]) -> Self {
        let mut taxa: Vec<String> = Vec::new();
        let mut taxon_slot: AHashMap<&str, usize> = AHashMap::new();
        let mut concept_slot: AHashMap<&str, usize> = AHashMap::new();
        let mut entries: Vec<Vec<(usize, &'r [String])>> = Vec::new();

        for row in rows {
            let taxon = *taxon_slot.entry(row.doculect.as_str()).or_insert_with(|| {
                taxa.push(row.doculect.clone());
                taxa.len() - 1
            });
            let concept = *concept_slot.entry(row.concept.as_str()).or_insert_with(|| {
                entries.push(Vec::new());
                entries.len() - 1
            });
            if !entries[concept].iter().any(|(t, _)| *t == taxon) {
                entries[concept].push((taxon, row.tokens.as_slice()));
            }
        }

        let forms = entries
            .into_iter()
            .map(|concept| {
                let mut by_taxon = vec![None; taxa.len()];
                for (taxon, tokens) in concept {
                    by_taxon[taxon] = Some(tokens);
                }
                by_taxon
            })
            .collect();

        Self { taxa, forms }
    }

    /// Mean distance over shared concepts, `None` without overlap.
    fn mean_distance(&self, provider: &dyn AlignmentProvider, i: usize, j: usize) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for concept in &self.forms {
            if let (Some(a), Some(b)) = (concept[i], concept[j]) {
                sum += provider.sequence_distance(a, b);
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }
}

/// Square taxon distance matrix, taxa in first-seen order.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    pub taxa: Vec<String>,
    pub values: Array2<f64>,
    /// Ordered taxon pairs that share no concept.
    pub empty_pairs: usize,
}

impl DistanceMatrix {
    /// Average sequence distance of every ordered pair of taxa.
    ///
    /// Pairs without a shared concept get [`NO_OVERLAP_DISTANCE`] and are
    /// counted in `empty_pairs`. The diagonal is 0.
    pub fn from_rows(provider: &dyn AlignmentProvider, rows: &[Row], parallel: bool) -> Self {
        let table = ConceptTable::new(rows);
        let n = table.taxa.len();

        let row_of = |i: usize| -> (Vec<f64>, usize) {
            let mut out = vec![0.0; n];
            let mut empty = 0;
            for (j, cell) in out.iter_mut().enumerate() {
                if i == j {
                    continue;
                }
                *cell = table.mean_distance(provider, i, j).unwrap_or_else(|| {
                    empty += 1;
                    NO_OVERLAP_DISTANCE
                });
            }
            (out, empty)
        };

        let computed: Vec<(Vec<f64>, usize)> = if parallel {
            (0..n).into_par_iter().map(row_of).collect()
        } else {
            (0..n).map(row_of).collect()
        };

        let mut values = Array2::<f64>::zeros((n, n));
        let mut empty_pairs = 0;
        for (i, (row, empty)) in computed.into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                values[[i, j]] = value;
            }
            empty_pairs += empty;
        }

        tracing::debug!(
            taxa = n,
            concepts = table.forms.len(),
            empty_pairs,
            "computed distance matrix"
        );

        Self {
            taxa: table.taxa,
            values,
            empty_pairs,
        }
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values.outer_iter().map(|row| row.to_vec()).collect()
    }

    /// PHYLIP-style text: taxon count, then one row per taxon with the
    /// label cut or padded to 10 characters.
    pub fn to_phylip(&self) -> String {
        let mut out = self.taxa.len().to_string();
        for (name, row) in self.taxa.iter().zip(self.values.outer_iter()) {
            out.push('\n');
            let _ = write!(out, "{name:<10.10}");
            for value in row {
                let _ = write!(out, " {value:.4}");
            }
        }
        out
    }
}

/// Replace Newick-reserved characters in taxon labels with `_`.
///
/// Returns the cleaned labels in input order and a map back to the
/// original labels. A cleaned label that is already taken gets a `_2`,
/// `_3`, ... suffix so every taxon keeps its own entry.
pub fn sanitize_taxa(names: &[String]) -> (Vec<String>, BTreeMap<String, String>) {
    let mut mapping = BTreeMap::new();
    let cleaned = names
        .iter()
        .map(|name| {
            let base: String = name
                .chars()
                .map(|c| if NEWICK_RESERVED.contains(&c) { '_' } else { c })
                .collect();
            let mut safe = base.clone();
            let mut suffix = 2;
            while mapping.contains_key(&safe) {
                safe = format!("{base}_{suffix}");
                suffix += 1;
            }
            if safe != base {
                tracing::warn!(
                    taxon = %name,
                    label = %safe,
                    "sanitized taxon label collides, renamed"
                );
            }
            mapping.insert(safe.clone(), name.clone());
            safe
        })
        .collect();
    (cleaned, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassPenalties;
    use crate::features::FeatureTable;
    use crate::phonetic::{FeatureAligner, IdentityAligner};

    fn rows() -> Vec<Row> {
        vec![
            Row::new("1", "German", "hand", &["h", "a", "n", "t"]),
            Row::new("2", "English", "hand", &["h", "æ", "n", "d"]),
            Row::new("3", "Latin", "hand", &["m", "a", "n", "u", "s"]),
            Row::new("4", "German", "water", &["v", "a", "s", "ɐ"]),
            Row::new("5", "English", "water", &["w", "ɔ", "t", "ə"]),
            Row::new("6", "Latin", "water", &["a", "k", "w", "a"]),
            Row::new("7", "German", "water", &["x"]),
        ]
    }

    #[test]
    fn test_diagonal_and_symmetry() {
        let table = FeatureTable::builtin().unwrap();
        let aligner = FeatureAligner::new(&table, ClassPenalties::default());
        let matrix = DistanceMatrix::from_rows(&aligner, &rows(), true);
        assert_eq!(matrix.taxa, vec!["German", "English", "Latin"]);
        for i in 0..3 {
            assert_eq!(matrix.values[[i, i]], 0.0);
            for j in 0..3 {
                assert!((matrix.values[[i, j]] - matrix.values[[j, i]]).abs() < 1e-9);
                assert!((0.0..=1.5).contains(&matrix.values[[i, j]]));
            }
        }
        assert_eq!(matrix.empty_pairs, 0);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let table = FeatureTable::builtin().unwrap();
        let aligner = FeatureAligner::new(&table, ClassPenalties::default());
        let a = DistanceMatrix::from_rows(&aligner, &rows(), true);
        let b = DistanceMatrix::from_rows(&aligner, &rows(), false);
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_first_form_per_concept_wins() {
        // German "water" is "v a s ɐ", not the later "x"
        let rows = rows();
        let table = ConceptTable::new(&rows);
        assert_eq!(table.forms[1][0].unwrap().len(), 4);
    }

    #[test]
    fn test_empty_pairs() {
        let rows = vec![
            Row::new("1", "A", "one", &["a"]),
            Row::new("2", "B", "two", &["b"]),
        ];
        let matrix = DistanceMatrix::from_rows(&IdentityAligner, &rows, false);
        assert_eq!(matrix.values[[0, 1]], 1.0);
        assert_eq!(matrix.values[[1, 0]], 1.0);
        assert_eq!(matrix.empty_pairs, 2);
    }

    #[test]
    fn test_single_taxon() {
        let rows = vec![Row::new("1", "A", "one", &["a"])];
        let matrix = DistanceMatrix::from_rows(&IdentityAligner, &rows, true);
        assert_eq!(matrix.to_rows(), vec![vec![0.0]]);
    }

    #[test]
    fn test_phylip() {
        let rows = vec![
            Row::new("1", "A", "one", &["a", "b"]),
            Row::new("2", "Proto-Indo-European", "one", &["a", "c"]),
        ];
        let matrix = DistanceMatrix::from_rows(&IdentityAligner, &rows, false);
        assert_eq!(
            matrix.to_phylip(),
            "2\nA          0.0000 0.5000\nProto-Indo 0.5000 0.0000"
        );
    }

    #[test]
    fn test_sanitize_taxa() {
        let names = vec!["Old (Norse)".to_string(), "a:b;c,d".to_string(), "plain".to_string()];
        let (safe, mapping) = sanitize_taxa(&names);
        assert_eq!(safe, vec!["Old _Norse_", "a_b_c_d", "plain"]);
        assert_eq!(mapping["Old _Norse_"], "Old (Norse)");
        assert_eq!(mapping["plain"], "plain");
    }

    #[test]
    fn test_sanitize_taxa_collisions() {
        let names = vec!["a(b".to_string(), "a)b".to_string(), "a_b".to_string()];
        let (safe, mapping) = sanitize_taxa(&names);
        assert_eq!(safe, vec!["a_b", "a_b_2", "a_b_3"]);
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping["a_b"], "a(b");
        assert_eq!(mapping["a_b_2"], "a)b");
        assert_eq!(mapping["a_b_3"], "a_b");
    }
}
