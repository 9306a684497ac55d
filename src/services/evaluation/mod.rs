// Evaluation Module
// - prompts: zero-shot / few-shot / reasoning prompt construction
// - runner: per-image model calls written to the decision table
// - decisions: decision table CSV I/O
// - aggregation: label normalization and accuracy statistics

pub mod aggregation;
pub mod decisions;
pub mod prompts;
pub mod runner;

pub use aggregation::{
    build_report,
    compute_accuracy,
    compute_by_category,
    normalize_label,
    render_report,
    UNMATCHED_GROUP,
};
pub use decisions::{read_decisions, write_decisions, DecisionTableError, DecisionWriter};
pub use prompts::{
    few_shot_cot_prompt,
    few_shot_prompt,
    match_cot_examples,
    select_few_shot_examples,
    zero_shot_prompt,
    ContentPart,
    CotExample,
};
pub use runner::{classify_directory, PromptMode, RunConfig, RunError};
