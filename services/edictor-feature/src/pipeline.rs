//! The five wordlist operations and the request dispatcher.
//!
//! A [`FeatureContext`] is built once per process and passed by reference
//! to every request. It owns the configuration and the lazily loaded
//! feature table; everything else lives for one call.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cluster::{assign_cognates, group_by};
use crate::config::{AlignerKind, FeatureConfig};
use crate::correspondence::{extract_sound_correspondences, to_tsv};
use crate::error::{FeatureError, Result};
use crate::features::FeatureTable;
use crate::matrix::{sanitize_taxa, DistanceMatrix};
use crate::msa::multi_align;
use crate::phonetic::{AlignmentProvider, FeatureAligner, IdentityAligner};
use crate::tree::build_tree;
use crate::types::{CorrespondenceEdge, Row};
use crate::wordlist::{parse_wordlist, Columns};

pub const VECTOR_COLUMN: &str = "FEAT_VEC";
pub const COGNATE_COLUMN: &str = "FEAT_COGID";
pub const ALIGNMENT_COLUMN: &str = "FEAT_ALIGN";
pub const DISTANCE_COLUMN: &str = "FEAT_DIST";
pub const TREE_COLUMN: &str = "FEAT_TREE";
pub const SOUNDCHANGE_COLUMN: &str = "FEAT_SNDCHAIN";

/// Derived values for one wordlist column, keyed by row index.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnPayload {
    pub column: &'static str,
    pub values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

/// A single cell to write back: `values` maps a row index to text.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnValues {
    pub name: &'static str,
    pub values: BTreeMap<String, String>,
}

impl ColumnValues {
    fn single(name: &'static str, index: &str, value: String) -> Self {
        Self {
            name,
            values: BTreeMap::from([(index.to_string(), value)]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistancePayload {
    pub matrix: Vec<Vec<f64>>,
    pub taxa: Vec<String>,
    /// Tree label → original taxon name.
    pub taxa_map: BTreeMap<String, String>,
    pub tree: String,
    pub ascii: String,
    pub downloads: BTreeMap<String, String>,
    pub columns: Vec<ColumnValues>,
    pub empty_pairs: usize,
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoundChangePayload {
    pub downloads: BTreeMap<String, String>,
    pub columns: Vec<ColumnValues>,
    pub edges: Vec<CorrespondenceEdge>,
    pub message: &'static str,
}

/// Process-wide engine state.
#[derive(Debug, Default)]
pub struct FeatureContext {
    config: FeatureConfig,
    table: OnceCell<FeatureTable>,
}

impl FeatureContext {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            table: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// The feature table, loaded on first use.
    ///
    /// Threads racing on the first call each load a table; the first one
    /// stored wins and the others are dropped. Failed loads are not cached.
    pub fn table(&self) -> Result<&FeatureTable> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let loaded = FeatureTable::load(&self.config)?;
        match self.table.try_insert(loaded) {
            Ok(table) => Ok(table),
            Err((winner, _duplicate)) => Ok(winner),
        }
    }

    /// Aligner chosen by the configuration.
    ///
    /// The identity aligner needs no feature table and never loads one.
    pub fn aligner(&self) -> Result<Box<dyn AlignmentProvider + '_>> {
        match self.config.aligner {
            AlignerKind::Identity => Ok(Box::new(IdentityAligner)),
            AlignerKind::Feature => Ok(Box::new(FeatureAligner::new(
                self.table()?,
                self.config.penalties,
            ))),
        }
    }

    /// Feature vectors of every row's tokens, as JSON text per row.
    pub fn vectorize(&self, rows: &[Row]) -> Result<ColumnPayload> {
        let table = self.table()?;
        let mut values = BTreeMap::new();
        for row in rows {
            let vectors = table.vectorize_all(&row.tokens);
            let text = serde_json::to_string(&vectors)
                .map_err(|e| FeatureError::json("serialise feature vectors", e))?;
            values.insert(row.index.clone(), text);
        }
        tracing::debug!(rows = rows.len(), "vectorized wordlist");
        Ok(ColumnPayload {
            column: VECTOR_COLUMN,
            values,
            features: Some(table.names().to_vec()),
        })
    }

    /// Cognate IDs per row, clustered within each concept.
    pub fn cognates(&self, rows: &[Row]) -> Result<ColumnPayload> {
        let aligner = self.aligner()?;
        let ids = assign_cognates(aligner.as_ref(), rows, self.config.cognate_threshold);
        Ok(ColumnPayload {
            column: COGNATE_COLUMN,
            values: ids.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
            features: None,
        })
    }

    /// Multiple alignment of each cognate set; rows without a cogid are
    /// left out.
    pub fn align(&self, rows: &[Row]) -> Result<ColumnPayload> {
        let aligner = self.aligner()?;
        let mut values = BTreeMap::new();
        let groups = group_by(rows, |row| row.cogid.as_deref().filter(|c| !c.is_empty()));
        for (_, items) in &groups {
            let sequences: Vec<Vec<String>> = items.iter().map(|row| row.tokens.clone()).collect();
            let aligned = multi_align(aligner.as_ref(), &sequences);
            for (row, alignment) in items.iter().zip(aligned) {
                values.insert(row.index.clone(), alignment.join(" "));
            }
        }
        tracing::debug!(sets = groups.len(), "aligned cognate sets");
        Ok(ColumnPayload {
            column: ALIGNMENT_COLUMN,
            values,
            features: None,
        })
    }

    /// Taxon distance matrix, tree and their text downloads.
    pub fn distances(&self, rows: &[Row]) -> Result<DistancePayload> {
        let first = rows.first().ok_or(FeatureError::NoRows {
            operation: "distances",
        })?;
        let aligner = self.aligner()?;
        let matrix = DistanceMatrix::from_rows(aligner.as_ref(), rows, self.config.parallel);
        let (safe_taxa, taxa_map) = sanitize_taxa(&matrix.taxa);

        let tree = build_tree(self.config.tree_method, &matrix.values, &safe_taxa);
        let (newick, ascii) = match &tree {
            Some(tree) => (tree.to_newick(), tree.ascii_art()),
            None => (String::new(), String::new()),
        };

        let dst_name = self.config.download_name("distances", "dst");
        let mut downloads = BTreeMap::from([(dst_name.clone(), matrix.to_phylip())]);
        let mut columns = vec![ColumnValues::single(DISTANCE_COLUMN, &first.index, dst_name)];
        if tree.is_some() {
            downloads.insert(self.config.download_name("tree", "nwk"), newick.clone());
            downloads.insert(self.config.download_name("tree", "txt"), ascii.clone());
            columns.push(ColumnValues::single(TREE_COLUMN, &first.index, newick.clone()));
        }

        Ok(DistancePayload {
            matrix: matrix.to_rows(),
            empty_pairs: matrix.empty_pairs,
            taxa: matrix.taxa,
            taxa_map,
            tree: newick,
            ascii,
            downloads,
            columns,
            message: "Feature distances computed.",
        })
    }

    /// Sound-correspondence table over aligned rows.
    pub fn soundchange(&self, rows: &[Row]) -> Result<SoundChangePayload> {
        let first = rows.first().ok_or(FeatureError::NoRows {
            operation: "soundchange",
        })?;
        let edges = extract_sound_correspondences(rows);
        let downloads = BTreeMap::from([(
            self.config.download_name("soundchange", "tsv"),
            to_tsv(&edges),
        )]);
        let columns = vec![ColumnValues::single(
            SOUNDCHANGE_COLUMN,
            &first.index,
            edges.len().to_string(),
        )];
        tracing::debug!(edges = edges.len(), "extracted sound correspondences");
        Ok(SoundChangePayload {
            downloads,
            columns,
            edges,
            message: "Soundchange table generated.",
        })
    }

    fn run(&self, action: &str, wordlist: &str) -> Result<Value> {
        if wordlist.trim().is_empty() {
            return Err(FeatureError::MissingWordlist);
        }
        match action {
            "vectorize" => to_value(&self.vectorize(&parse_wordlist(wordlist, Columns::BASIC))?),
            "cognates" => to_value(&self.cognates(&parse_wordlist(wordlist, Columns::BASIC))?),
            "align" => to_value(&self.align(&parse_wordlist(wordlist, Columns::COGNATES))?),
            "distances" => to_value(&self.distances(&parse_wordlist(wordlist, Columns::BASIC))?),
            "soundchange" => {
                to_value(&self.soundchange(&parse_wordlist(wordlist, Columns::ALIGNMENTS))?)
            }
            other => Err(FeatureError::UnknownAction(other.to_string())),
        }
    }

    /// Run `action` on a wire-format wordlist.
    ///
    /// Always returns a JSON object: the operation payload, or
    /// `{"error": message}`.
    pub fn handle_request(&self, action: &str, wordlist: &str) -> Value {
        let action = action.trim().to_lowercase();
        match self.run(&action, wordlist) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(action = %action, error = %err, "feature request failed");
                json!({ "error": err.to_string() })
            }
        }
    }
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload).map_err(|e| FeatureError::json("serialise payload", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeMethod;

    fn context() -> FeatureContext {
        FeatureContext::new(FeatureConfig::default())
    }

    fn scenario() -> Vec<Row> {
        vec![
            Row::new("1", "A", "head", &["t", "a"]),
            Row::new("2", "B", "head", &["t", "a"]),
            Row::new("3", "A", "hand", &["k", "o"]),
        ]
    }

    #[test]
    fn test_table_is_cached() {
        let ctx = context();
        let a = ctx.table().unwrap() as *const FeatureTable;
        let b = ctx.table().unwrap() as *const FeatureTable;
        assert_eq!(a, b);
    }

    #[test]
    fn test_concurrent_first_loads_share_one_table() {
        let ctx = context();
        let addresses: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| ctx.table().unwrap() as *const FeatureTable as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let stored = ctx.table().unwrap() as *const FeatureTable as usize;
        assert!(addresses.iter().all(|&a| a == stored));
    }

    #[test]
    fn test_identity_aligner_skips_feature_table() {
        let config = FeatureConfig {
            aligner: AlignerKind::Identity,
            feature_table: Some("/nonexistent/ipa_bases.csv".into()),
            ..FeatureConfig::default()
        };
        let ctx = FeatureContext::new(config);
        assert_eq!(ctx.aligner().unwrap().name(), "identity");

        let value = ctx.handle_request("cognates", "1\tA\thead\tt a\n2\tB\thead\tt a\n");
        assert_eq!(value["values"]["1"], "1");
        assert_eq!(value["values"]["2"], "1");
        let value = ctx.handle_request("distances", "1\tA\thead\tt a\n2\tB\thead\td a\n");
        assert_eq!(value["matrix"][0][1], 0.5);
        assert!(ctx.table().is_err());
    }

    #[test]
    fn test_feature_aligner_by_default() {
        assert_eq!(context().aligner().unwrap().name(), "feature");
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let config = FeatureConfig {
            feature_table: Some("/nonexistent/ipa_bases.csv".into()),
            ..FeatureConfig::default()
        };
        let ctx = FeatureContext::new(config);
        assert!(ctx.table().is_err());
        let value = ctx.handle_request("vectorize", "1\tA\tx\ta\n");
        assert!(value["error"].is_string());
    }

    #[test]
    fn test_vectorize() {
        let payload = context().vectorize(&scenario()).unwrap();
        assert_eq!(payload.column, "FEAT_VEC");
        assert_eq!(payload.features.as_ref().unwrap().len(), 24);
        let vectors: Vec<Vec<f64>> = serde_json::from_str(&payload.values["1"]).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 24);
    }

    #[test]
    fn test_cognates_scenario() {
        let payload = context().cognates(&scenario()).unwrap();
        assert_eq!(payload.column, "FEAT_COGID");
        assert_eq!(payload.values["1"], payload.values["2"]);
        assert_ne!(payload.values["1"], payload.values["3"]);
        assert_eq!(payload.values["1"], "1");
        assert_eq!(payload.values["3"], "2");
    }

    #[test]
    fn test_align_by_cogid() {
        let rows = vec![
            Row::new("1", "A", "x", &["t", "a", "n"]).with_cogid("1"),
            Row::new("2", "B", "x", &["t", "a"]).with_cogid("1"),
            Row::new("3", "C", "x", &["k", "o"]),
        ];
        let payload = context().align(&rows).unwrap();
        assert_eq!(payload.values["1"], "t a n");
        assert_eq!(payload.values["2"], "t a -");
        assert!(!payload.values.contains_key("3"));
    }

    #[test]
    fn test_distances_payload() {
        let payload = context().distances(&scenario()).unwrap();
        assert_eq!(payload.taxa, vec!["A", "B"]);
        assert_eq!(payload.matrix[0][0], 0.0);
        assert_eq!(payload.matrix[0][1], 0.0);
        assert!(payload.tree.ends_with(';'));
        assert!(payload.downloads.contains_key("feat_distances.dst"));
        assert!(payload.downloads.contains_key("feat_tree.nwk"));
        assert!(payload.downloads.contains_key("feat_tree.txt"));
        assert_eq!(payload.columns.len(), 2);
        assert_eq!(payload.columns[0].values["1"], "feat_distances.dst");
        assert_eq!(payload.message, "Feature distances computed.");
    }

    #[test]
    fn test_distances_single_taxon() {
        let rows = vec![Row::new("1", "A", "head", &["t", "a"])];
        let payload = context().distances(&rows).unwrap();
        assert_eq!(payload.matrix, vec![vec![0.0]]);
        assert!(payload.tree.is_empty());
        assert_eq!(payload.downloads.len(), 1);
        assert_eq!(payload.columns.len(), 1);
    }

    #[test]
    fn test_distances_without_rows() {
        let err = context().distances(&[]).unwrap_err();
        assert_eq!(err.to_string(), "No rows available for distances.");
    }

    #[test]
    fn test_soundchange_payload() {
        let rows = vec![
            Row::new("1", "A", "two", &["t", "a"]).with_alignment(&["t", "a"]),
            Row::new("2", "B", "two", &["d", "a"]).with_alignment(&["d", "a"]),
        ];
        let payload = context().soundchange(&rows).unwrap();
        assert_eq!(payload.edges.len(), 2);
        assert_eq!(
            payload.downloads["feat_soundchange.tsv"],
            "SOURCE\tTARGET\tCOUNT\nd\tt\t1\nt\td\t1"
        );
        assert_eq!(payload.columns[0].values["1"], "2");
    }

    #[test]
    fn test_handle_request_errors() {
        let ctx = context();
        assert_eq!(
            ctx.handle_request("vectorize", "  \n"),
            json!({"error": "Missing wordlist."})
        );
        assert_eq!(
            ctx.handle_request("bogus", "1\tA\tx\ta"),
            json!({"error": "Unknown action: bogus"})
        );
        assert_eq!(
            ctx.handle_request("distances", "1\tA\n"),
            json!({"error": "No rows available for distances."})
        );
    }

    #[test]
    fn test_handle_request_normalises_action() {
        let value = context().handle_request("  Cognates ", "1\tA\thead\tt a\n2\tB\thead\tt a\n");
        assert_eq!(value["column"], "FEAT_COGID");
        assert_eq!(value["values"]["1"], "1");
        assert_eq!(value["values"]["2"], "1");
    }

    #[test]
    fn test_configured_methods() {
        let config = FeatureConfig {
            aligner: AlignerKind::Identity,
            tree_method: TreeMethod::Upgma,
            download_prefix: "run".to_string(),
            ..FeatureConfig::default()
        };
        let ctx = FeatureContext::new(config);
        let rows = vec![
            Row::new("1", "A", "x", &["a", "b"]),
            Row::new("2", "B", "x", &["a", "c"]),
        ];
        let payload = ctx.distances(&rows).unwrap();
        assert_eq!(payload.matrix[0][1], 0.5);
        assert_eq!(payload.tree, "(A:0.2500,B:0.2500);");
        assert!(payload.downloads.contains_key("run_tree.nwk"));
    }
}
