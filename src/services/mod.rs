// splice-eval Core Services

pub mod config_store;
pub mod dataset;
pub mod evaluation;
pub mod filename_patterns;
pub mod providers;
pub mod sampling;

pub use config_store::*;
pub use providers::*;

pub use filename_patterns::{
    extract_category,
    is_image_file,
    parse_authentic,
    parse_filename,
    parse_tampered,
    AuthenticPattern,
    FilenamePattern,
    TamperedPairPattern,
};
pub use sampling::{
    compute_allocation,
    group_by_pattern,
    materialize,
    rebalance,
    select_sample,
    stratified_sample,
    SamplingError,
    TransferMode,
};
