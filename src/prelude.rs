//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use vecino::prelude::*;
//! ```

pub use crate::bruteforce::BruteforceBuilder;
pub use crate::cluster::{Clusterer, KMeans};
pub use crate::error::{Result, VecinoError};
pub use crate::kmknn::KmknnBuilder;
pub use crate::l2::L2NormalizedBuilder;
pub use crate::matrix::{DenseMatrix, ObservationSource};
pub use crate::metric::{DistanceMetric, EuclideanDistance, ManhattanDistance};
pub use crate::traits::{Builder, Prebuilt, Searcher};
pub use crate::vptree::VpTreeBuilder;
