//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the stock engine: feature-based alignment, neighbor-joining
//! trees and a cognate threshold of 0.45.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FeatureError, Result};

/// Extra cost for crossing a major-class boundary between two segments.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassPenalties {
    pub consonantal: f64,
    pub syllabic: f64,
    pub sonorant: f64,
    /// Upper bound of a single segment distance.
    pub cap: f64,
}

impl Default for ClassPenalties {
    fn default() -> Self {
        Self {
            consonantal: 0.6,
            syllabic: 0.4,
            sonorant: 0.2,
            cap: 1.5,
        }
    }
}

/// Substitution cost used by the aligners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignerKind {
    /// Feature-vector distance between segments.
    #[default]
    Feature,
    /// 0 for identical segments, 1 otherwise.
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMethod {
    #[default]
    Neighbor,
    Upgma,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// PanPhon-style CSV replacing the built-in segment table.
    pub feature_table: Option<PathBuf>,
    pub aligner: AlignerKind,
    pub tree_method: TreeMethod,
    /// Forms within a concept whose sequence distance is at or below this
    /// value are merged into one cognate set.
    pub cognate_threshold: f64,
    pub penalties: ClassPenalties,
    /// Prefix of the download file names (`<prefix>_distances.dst`, ...).
    pub download_prefix: String,
    /// Fill the taxon distance matrix with rayon workers.
    pub parallel: bool,
}

impl FeatureConfig {
    pub const DEFAULT_COGNATE_THRESHOLD: f64 = 0.45;

    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(data).map_err(|e| FeatureError::json("parse config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data =
            std::fs::read_to_string(path).map_err(|e| FeatureError::io("read config", e))?;
        Self::from_json_str(&data)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cognate_threshold.is_finite() || self.cognate_threshold < 0.0 {
            return Err(FeatureError::config(format!(
                "cognate_threshold must be a non-negative number, got {}",
                self.cognate_threshold
            )));
        }
        let p = &self.penalties;
        for (name, value) in [
            ("consonantal", p.consonantal),
            ("syllabic", p.syllabic),
            ("sonorant", p.sonorant),
            ("cap", p.cap),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FeatureError::config(format!(
                    "penalty `{name}` must be a non-negative number, got {value}"
                )));
            }
        }
        if self.download_prefix.is_empty() {
            return Err(FeatureError::config("download_prefix must not be empty"));
        }
        Ok(())
    }

    pub(crate) fn download_name(&self, stem: &str, extension: &str) -> String {
        format!("{}_{stem}.{extension}", self.download_prefix)
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            feature_table: None,
            aligner: AlignerKind::default(),
            tree_method: TreeMethod::default(),
            cognate_threshold: Self::DEFAULT_COGNATE_THRESHOLD,
            penalties: ClassPenalties::default(),
            download_prefix: "feat".to_string(),
            parallel: true,
        }
    }
}
