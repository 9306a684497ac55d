// Sampling Module
// Category-balanced dataset sampling organized into:
// - allocation: splits a total across ordered keys
// - stratified: grouping, per-key selection and deficit rebalancing
// - materialize: copies or moves the selection on disk
// - subsets: dataset-level samplers built on the above

pub mod allocation;
pub mod stratified;
pub mod materialize;
pub mod subsets;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplingError {
    #[error("Invalid sampling configuration: {0}")]
    Configuration(String),
    #[error("Unable to meet total sample requirement. Deficit of {deficit} but only {available} extras available")]
    InsufficientData { deficit: usize, available: usize },
    #[error("Source file missing: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub use allocation::{compute_allocation, Allocation};
pub use stratified::{group_by_pattern, rebalance, select_sample, stratified_sample, SampleSelection};
pub use materialize::{materialize, TransferMode};
pub use subsets::{
    sample_authentic_for_prompt,
    sample_tampered_for_categories,
    sample_tampered_for_prompt,
    sample_top_categories,
    PromptSampleRequest,
};
