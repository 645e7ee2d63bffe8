//! Python bindings for the EDICTOR feature engine.
//!
//! The server builds one `FeatureEngine` at startup and routes every
//! feature request through `FeatureEngine.handle`.

use std::path::PathBuf;

use numpy::{PyArray2, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use edictor_feature::matrix::DistanceMatrix;
use edictor_feature::{parse_wordlist, Alignment, Columns, FeatureConfig, FeatureContext, FeatureError};

fn feature_err_to_py(err: FeatureError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn split_tokens(text: &str) -> Vec<String> {
    text.split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// ENGINE
// ============================================================================

#[pyclass]
struct FeatureEngine {
    context: FeatureContext,
}

#[pymethods]
impl FeatureEngine {
    #[new]
    #[pyo3(signature = (config_path = None))]
    fn new(config_path: Option<PathBuf>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => FeatureConfig::from_json_file(&path).map_err(feature_err_to_py)?,
            None => FeatureConfig::default(),
        };
        tracing::debug!(?config, "feature engine created");
        Ok(Self {
            context: FeatureContext::new(config),
        })
    }

    /// Run an action on a wordlist; returns the JSON payload as text.
    fn handle(&self, py: Python<'_>, action: &str, wordlist: &str) -> String {
        py.allow_threads(|| self.context.handle_request(action, wordlist).to_string())
    }

    /// Taxon distance matrix as a numpy array, with the taxa in row order.
    fn distance_matrix<'py>(
        &self,
        py: Python<'py>,
        wordlist: &str,
    ) -> PyResult<(&'py PyArray2<f64>, Vec<String>)> {
        let matrix = py
            .allow_threads(|| -> Result<DistanceMatrix, FeatureError> {
                let rows = parse_wordlist(wordlist, Columns::BASIC);
                if rows.is_empty() {
                    return Err(FeatureError::NoRows {
                        operation: "distances",
                    });
                }
                let aligner = self.context.aligner()?;
                Ok(DistanceMatrix::from_rows(
                    aligner.as_ref(),
                    &rows,
                    self.context.config().parallel,
                ))
            })
            .map_err(feature_err_to_py)?;
        Ok((matrix.values.to_pyarray(py), matrix.taxa))
    }

    /// Normalised distance between two space-separated token strings.
    fn sequence_distance(&self, a: &str, b: &str) -> PyResult<f64> {
        let aligner = self.context.aligner().map_err(feature_err_to_py)?;
        Ok(aligner.sequence_distance(&split_tokens(a), &split_tokens(b)))
    }

    /// Pairwise alignment of two space-separated token strings.
    fn align_pair(&self, a: &str, b: &str) -> PyResult<PyAlignment> {
        let aligner = self.context.aligner().map_err(feature_err_to_py)?;
        Ok(aligner.align_pair(&split_tokens(a), &split_tokens(b)).into())
    }

    fn feature_names(&self) -> PyResult<Vec<String>> {
        let table = self.context.table().map_err(feature_err_to_py)?;
        Ok(table.names().to_vec())
    }
}

// ============================================================================
// PYTHON WRAPPER TYPES
// ============================================================================

#[pyclass]
struct PyAlignment {
    #[pyo3(get)]
    sequence_a: Vec<String>,
    #[pyo3(get)]
    sequence_b: Vec<String>,
    #[pyo3(get)]
    cost: f64,
    substitutions: Vec<(String, String)>,
}

impl From<Alignment> for PyAlignment {
    fn from(alignment: Alignment) -> Self {
        let substitutions = alignment.substitutions();
        Self {
            sequence_a: alignment.sequence_a,
            sequence_b: alignment.sequence_b,
            cost: alignment.cost,
            substitutions,
        }
    }
}

#[pymethods]
impl PyAlignment {
    /// Substituted segment pairs, gaps and matches excluded.
    fn correspondences(&self) -> Vec<(String, String)> {
        self.substitutions.clone()
    }

    fn __len__(&self) -> usize {
        self.sequence_a.len()
    }
}

// ============================================================================
// MODULE DEFINITION
// ============================================================================

#[pymodule]
fn edictor_native(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<FeatureEngine>()?;
    m.add_class::<PyAlignment>()?;
    Ok(())
}
