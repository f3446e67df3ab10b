//! Vecino: exact nearest-neighbor search for dense numeric vectors.
//!
//! Vecino builds an index over a set of observations (points in R^n) and
//! answers "k nearest neighbors of observation i", "k nearest neighbors of
//! an arbitrary query vector", and "all neighbors within radius r" under a
//! pluggable distance metric. Every backend returns exact results; they
//! differ only in how much work the build invests to make queries cheap.
//!
//! # Quick Start
//!
//! ```
//! use vecino::prelude::*;
//!
//! // Five observations in two dimensions.
//! let data = DenseMatrix::from_vec(2, 5, vec![
//!     0.0, 0.0,
//!     1.0, 0.0,
//!     0.0, 1.0,
//!     4.0, 4.0,
//!     4.0, 5.0,
//! ]).unwrap();
//!
//! // Build once, search many times.
//! let prebuilt = VpTreeBuilder::new(EuclideanDistance).build(&data).unwrap();
//! let mut searcher = prebuilt.initialize();
//!
//! let mut indices = Vec::new();
//! let mut distances = Vec::new();
//! searcher.search(0, 2, Some(&mut indices), Some(&mut distances)).unwrap();
//! assert_eq!(indices, vec![1, 2]);
//! assert_eq!(distances, vec![1.0, 1.0]);
//! ```
//!
//! # Modules
//!
//! - [`matrix`]: Observation sources and the dense input matrix
//! - [`metric`]: Distance metrics (Euclidean, Manhattan)
//! - [`traits`]: The Builder / Prebuilt / Searcher lifecycle
//! - [`queue`]: Bounded top-k candidate queue
//! - [`bruteforce`]: Exhaustive-scan baseline index
//! - [`vptree`]: Vantage-point tree index
//! - [`kmknn`]: K-means for k-nearest neighbors index
//! - [`cluster`]: K-means clustering used by the KMKNN index
//! - [`l2`]: L2-normalization decorator for cosine-distance search
//! - [`error`]: Error types

pub mod bruteforce;
pub mod cluster;
pub mod error;
pub mod kmknn;
pub mod l2;
pub mod matrix;
pub mod metric;
pub mod prelude;
pub mod queue;
mod report;
pub mod traits;
pub mod vptree;

pub use crate::error::{Result, VecinoError};
pub use crate::traits::{Builder, Prebuilt, Searcher};
