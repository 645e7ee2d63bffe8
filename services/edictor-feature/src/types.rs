//! Shared data structures for the feature engine.

use std::ops::Deref;

use serde::{Serialize, Serializer};

/// Gap symbol in aligned sequences.
pub const GAP: &str = "-";

/// Numeric articulatory description of one segment.
///
/// Integral values serialise as JSON integers, so a PanPhon-style vector
/// comes out as `[1,-1,0,...]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    pub(crate) fn set(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = value;
        }
    }
}

impl Deref for FeatureVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for value in &self.0 {
            if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                seq.serialize_element(&(*value as i64))?;
            } else {
                seq.serialize_element(value)?;
            }
        }
        seq.end()
    }
}

/// One wordlist entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub index: String,
    pub doculect: String,
    pub concept: String,
    pub tokens: Vec<String>,
    pub cogid: Option<String>,
    pub alignment: Option<Vec<String>>,
}

impl Row {
    pub fn new(
        index: impl Into<String>,
        doculect: impl Into<String>,
        concept: impl Into<String>,
        tokens: &[&str],
    ) -> Self {
        Self {
            index: index.into(),
            doculect: doculect.into(),
            concept: concept.into(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            cogid: None,
            alignment: None,
        }
    }

    pub fn with_cogid(mut self, cogid: impl Into<String>) -> Self {
        self.cogid = Some(cogid.into());
        self
    }

    pub fn with_alignment(mut self, alignment: &[&str]) -> Self {
        self.alignment = Some(alignment.iter().map(|t| t.to_string()).collect());
        self
    }
}

/// Edit operation in sequence alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Match,
    Substitute,
    Insert,
    Delete,
}

/// Result of a pairwise alignment
#[derive(Debug, Clone)]
pub struct Alignment {
    pub sequence_a: Vec<String>,
    pub sequence_b: Vec<String>,
    pub operations: Vec<EditOp>,
    pub cost: f64,
}

impl Alignment {
    pub fn new(
        sequence_a: Vec<String>,
        sequence_b: Vec<String>,
        operations: Vec<EditOp>,
        cost: f64,
    ) -> Self {
        Self {
            sequence_a,
            sequence_b,
            operations,
            cost,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Substituted segment pairs, in column order.
    pub fn substitutions(&self) -> Vec<(String, String)> {
        self.operations
            .iter()
            .zip(self.sequence_a.iter().zip(&self.sequence_b))
            .filter(|(op, _)| **op == EditOp::Substitute)
            .map(|(_, (a, b))| (a.clone(), b.clone()))
            .collect()
    }
}

/// Forms of one concept judged to be cognate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CognateSet {
    pub id: usize,
    pub members: Vec<String>,
}

impl CognateSet {
    pub fn new(id: usize, members: Vec<String>) -> Self {
        Self { id, members }
    }
}

/// How often `source` stands in the same alignment column as `target`.
///
/// Serialises as a `[source, target, count]` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondenceEdge {
    pub source: String,
    pub target: String,
    pub count: usize,
}

impl CorrespondenceEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, count: usize) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            count,
        }
    }
}

impl Serialize for CorrespondenceEdge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.source, &self.target, self.count).serialize(serializer)
    }
}
