//! Segment feature table.
//!
//! Segments map to PanPhon-style feature vectors (`+` → 1, `-` → -1,
//! `0` → 0, or a real-valued weight). The built-in table covers common IPA
//! base segments; complex segments (`tʰ`, `aː`, `ã`, `kʷ`) are analysed as a
//! base plus diacritics. Anything that cannot be analysed maps to the zero
//! vector.

use std::path::Path;

use rustc_hash::FxHashMap;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::FeatureConfig;
use crate::error::{FeatureError, Result};
use crate::types::FeatureVector;

const BUILTIN_TABLE: &str = include_str!("../data/ipa_bases.csv");

/// Diacritics and the feature values they impose on their base.
const DIACRITICS: &[(char, &[(&str, f64)])] = &[
    ('ː', &[("long", 1.0)]),
    ('ˑ', &[("long", 1.0)]),
    ('ʰ', &[("sg", 1.0)]),
    ('ʱ', &[("sg", 1.0), ("voi", 1.0)]),
    ('ʼ', &[("cg", 1.0)]),
    ('ʷ', &[("round", 1.0), ("lab", 1.0)]),
    ('ʲ', &[("hi", 1.0), ("back", -1.0)]),
    ('ˠ', &[("hi", 1.0), ("back", 1.0)]),
    ('ˤ', &[("lo", 1.0), ("back", 1.0)]),
    ('\u{0303}', &[("nas", 1.0)]),
    ('\u{0325}', &[("voi", -1.0)]),
    ('\u{030A}', &[("voi", -1.0)]),
    ('\u{032C}', &[("voi", 1.0)]),
    ('\u{0329}', &[("syl", 1.0)]),
    ('\u{030D}', &[("syl", 1.0)]),
    ('\u{032F}', &[("syl", -1.0)]),
    ('\u{032A}', &[("distr", 1.0)]),
    ('\u{0301}', &[("hitone", 1.0), ("hireg", 1.0)]),
    ('\u{0300}', &[("hitone", -1.0), ("hireg", -1.0)]),
    ('\u{0361}', &[]),
    ('\u{035C}', &[]),
];

fn is_combining(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn diacritic(c: char) -> Option<&'static [(&'static str, f64)]> {
    DIACRITICS
        .iter()
        .find(|(mark, _)| *mark == c)
        .map(|(_, values)| *values)
}

/// Canonical (NFD) spelling used for table keys and queries, so that
/// precomposed and decomposed forms of a segment look up the same entry.
fn canonical(segment: &str) -> String {
    segment.nfd().collect()
}

fn parse_cell(cell: &str, line: usize) -> Result<f64> {
    match cell.trim() {
        "+" => Ok(1.0),
        "-" => Ok(-1.0),
        "0" => Ok(0.0),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| FeatureError::table(line, format!("invalid feature value `{other}`"))),
    }
}

/// Immutable segment → feature vector mapping.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
    segments: FxHashMap<String, FeatureVector>,
    zero: FeatureVector,
}

impl FeatureTable {
    /// Table selected by `config`: the external CSV when one is configured,
    /// the built-in table otherwise.
    pub fn load(config: &FeatureConfig) -> Result<Self> {
        match &config.feature_table {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn builtin() -> Result<Self> {
        Self::from_csv_str(BUILTIN_TABLE)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| FeatureError::io("read feature table", e))?;
        let table = Self::from_csv_str(&data)?;
        tracing::info!(
            path = %path.display(),
            segments = table.len(),
            features = table.names.len(),
            "loaded feature table"
        );
        Ok(table)
    }

    /// Parse a PanPhon-style CSV: header `ipa,<feature>,...`, then one
    /// segment per line.
    pub fn from_csv_str(data: &str) -> Result<Self> {
        let mut lines = data
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| FeatureError::table(1, "empty feature table"))?;
        let names: Vec<String> = header
            .split(',')
            .skip(1)
            .map(|name| name.trim().to_string())
            .collect();
        if names.is_empty() {
            return Err(FeatureError::table(1, "header names no features"));
        }

        let mut segments = FxHashMap::default();
        for (line_no, line) in lines {
            let cells: Vec<&str> = line.split(',').collect();
            if cells.len() != names.len() + 1 {
                return Err(FeatureError::table(
                    line_no,
                    format!("expected {} columns, found {}", names.len() + 1, cells.len()),
                ));
            }
            let values = cells[1..]
                .iter()
                .map(|cell| parse_cell(cell, line_no))
                .collect::<Result<Vec<f64>>>()?;
            segments.insert(canonical(cells[0].trim()), FeatureVector::new(values));
        }

        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let zero = FeatureVector::zeros(names.len());

        Ok(Self {
            names,
            index,
            segments,
            zero,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn zero(&self) -> &FeatureVector {
        &self.zero
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Feature vector of `segment`, or `None` when it cannot be analysed.
    pub fn lookup(&self, segment: &str) -> Option<FeatureVector> {
        let segment = canonical(segment);
        if let Some(vector) = self.segments.get(&segment) {
            return Some(vector.clone());
        }
        self.analyse(&segment)
    }

    /// Feature vector of `segment`; the zero vector when it cannot be analysed.
    pub fn vectorize(&self, segment: &str) -> FeatureVector {
        self.lookup(segment).unwrap_or_else(|| self.zero.clone())
    }

    pub fn vectorize_all<S: AsRef<str>>(&self, segments: &[S]) -> Vec<FeatureVector> {
        segments.iter().map(|s| self.vectorize(s.as_ref())).collect()
    }

    /// Longest leading run of grapheme clusters that names a base segment,
    /// with every remaining mark applied as a diacritic.
    ///
    /// A run is tried as spelled first, then with its combining marks
    /// stripped and moved to the diacritics.
    fn analyse(&self, segment: &str) -> Option<FeatureVector> {
        let clusters: Vec<&str> = segment.graphemes(true).collect();

        for split in (1..=clusters.len()).rev() {
            let head = clusters[..split].concat();
            let rest = clusters[split..].iter().flat_map(|c| c.chars());

            if let Some(base) = self.segments.get(&head) {
                return self.apply_diacritics(base, rest);
            }
            let bare: String = head.chars().filter(|c| !is_combining(*c)).collect();
            if bare == head {
                continue;
            }
            if let Some(base) = self.segments.get(&bare) {
                let marks = head.chars().filter(|c| is_combining(*c));
                return self.apply_diacritics(base, marks.chain(rest));
            }
        }
        None
    }

    /// `base` with every mark applied; `None` on an unknown mark.
    fn apply_diacritics(
        &self,
        base: &FeatureVector,
        marks: impl Iterator<Item = char>,
    ) -> Option<FeatureVector> {
        let mut vector = base.clone();
        for mark in marks {
            for (name, value) in diacritic(mark)? {
                if let Some(&i) = self.index.get(*name) {
                    vector.set(i, *value);
                }
            }
        }
        Some(vector)
    }
}
