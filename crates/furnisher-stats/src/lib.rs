//! Statistical utilities for the furnisher surrogate.
//!
//! - [`descriptive`]: summary statistics of a sample
//! - [`standardization`]: z-scoring parameters frozen into model checkpoints
//! - [`metrics`]: regression and pass/fail metrics for evaluating score predictions
//!
//! # Examples
//!
//! ```
//! use furnisher_stats::{descriptive::DescriptiveStats, standardization::Standardization};
//!
//! let stats = DescriptiveStats::new([1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! assert_eq!(stats.mean, 3.0);
//!
//! let z = Standardization::from_stats(&stats);
//! assert!(z.apply(3.0).abs() < 1e-12);
//! ```

pub mod descriptive;
pub mod metrics;
pub mod standardization;
