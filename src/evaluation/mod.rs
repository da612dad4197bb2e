// Evaluation - per-run quality scoring and ROI accounting

//! # Evaluation Module
//!
//! Scores every completed run across seven weighted dimensions and computes
//! the business return of handling the incident autonomously. Results land in
//! the incident's `quality_scores` and the performance-metrics table.

pub mod evaluator;
pub mod roi;

pub use evaluator::{Evaluator, Grade, QualityReport};
pub use roi::{IncidentRoi, RoiCalculator};
