//! EDICTOR feature engine: phonetic-feature analysis of wordlists.
//!
//! Provides, on tab-separated wordlist records:
//! - Feature vectors for IPA segments (PanPhon-style table)
//! - Feature-weighted pairwise and star multiple alignment
//! - Cognate clustering per concept
//! - Taxon distance matrices, neighbor-joining / UPGMA trees
//! - Sound-correspondence tables
//!
//! The entry point for servers is [`FeatureContext::handle_request`].

pub mod cluster;
pub mod config;
pub mod correspondence;
pub mod distance;
pub mod error;
pub mod features;
pub mod matrix;
pub mod msa;
pub mod phonetic;
pub mod pipeline;
pub mod tree;
pub mod types;
pub mod wordlist;

pub use config::{AlignerKind, ClassPenalties, FeatureConfig, TreeMethod};
pub use error::{FeatureError, Result};
pub use features::FeatureTable;
pub use phonetic::{AlignmentProvider, FeatureAligner, IdentityAligner};
pub use pipeline::FeatureContext;
pub use types::{Alignment, CognateSet, CorrespondenceEdge, FeatureVector, Row, GAP};
pub use wordlist::{parse_wordlist, Columns};
