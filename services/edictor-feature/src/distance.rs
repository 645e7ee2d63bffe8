//! Distance between two segment feature vectors.

use crate::config::ClassPenalties;

/// Distance returned for vectors that cannot be compared.
pub const MISMATCH_DISTANCE: f64 = 1.0;

/// Feature positions of the major-class features, resolved once per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassIndices {
    pub consonantal: Option<usize>,
    pub syllabic: Option<usize>,
    pub sonorant: Option<usize>,
}

impl ClassIndices {
    /// Accepts both PanPhon abbreviations (`cons`, `syl`, `son`) and the
    /// spelled-out names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let find = |short: &str, long: &str| {
            names
                .iter()
                .position(|n| n.as_ref() == short || n.as_ref() == long)
        };
        Self {
            consonantal: find("cons", "consonantal"),
            syllabic: find("syl", "syllabic"),
            sonorant: find("son", "sonorant"),
        }
    }
}

/// Segment metric: normalised Manhattan distance plus major-class penalties.
#[derive(Debug, Clone, Copy)]
pub struct SegmentMetric {
    classes: Option<ClassIndices>,
    penalties: ClassPenalties,
}

impl SegmentMetric {
    pub fn new(classes: Option<ClassIndices>, penalties: ClassPenalties) -> Self {
        Self { classes, penalties }
    }

    pub fn for_names<S: AsRef<str>>(names: &[S], penalties: ClassPenalties) -> Self {
        Self::new(Some(ClassIndices::from_names(names)), penalties)
    }

    /// Distance in `[0, penalties.cap]`.
    ///
    /// Empty or differently sized vectors are not comparable and get
    /// [`MISMATCH_DISTANCE`].
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        if a.is_empty() || b.is_empty() || a.len() != b.len() {
            return MISMATCH_DISTANCE;
        }

        let total: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
        let base = total / (2.0 * a.len() as f64);

        let mut penalty = 0.0;
        if let Some(classes) = &self.classes {
            let opposed = |index: Option<usize>| match index {
                Some(i) if i < a.len() => a[i] * b[i] < 0.0,
                _ => false,
            };
            if opposed(classes.consonantal) {
                penalty += self.penalties.consonantal;
            }
            if opposed(classes.syllabic) {
                penalty += self.penalties.syllabic;
            }
            if opposed(classes.sonorant) {
                penalty += self.penalties.sonorant;
            }
        }

        (base + penalty).min(self.penalties.cap)
    }
}

/// Distance between two feature vectors with the default penalties.
///
/// Class penalties only apply when `names` is given.
pub fn segment_distance(a: &[f64], b: &[f64], names: Option<&[String]>) -> f64 {
    let metric = SegmentMetric::new(names.map(ClassIndices::from_names), ClassPenalties::default());
    metric.distance(a, b)
}
