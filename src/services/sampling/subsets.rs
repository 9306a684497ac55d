// Dataset Subsets
// Top-category dataset copy and stratified prompt-example sampling

use super::materialize::{materialize, TransferMode};
use super::stratified::{group_by_pattern, stratified_sample};
use super::SamplingError;
use crate::models::{Category, CategoryPair};
use crate::services::dataset::list_image_files;
use crate::services::filename_patterns::{
    parse_tampered, AuthenticPattern, FilenamePattern, TamperedPairPattern,
};
use rand::Rng;
use std::path::Path;
use tracing::{info, warn};

/// Copy every authentic file of the `top_n` most populated categories.
/// Ties are broken by category name. Returns the chosen categories, most populated first.
pub fn sample_top_categories(
    input_dir: &Path,
    output_dir: &Path,
    top_n: usize,
) -> Result<Vec<Category>, SamplingError> {
    let names = list_image_files(input_dir)?;
    let groups = group_by_pattern(&names, &AuthenticPattern::any());

    let mut ranked: Vec<(&Category, usize)> = groups.iter().map(|(c, files)| (c, files.len())).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let top: Vec<Category> = ranked.into_iter().take(top_n).map(|(c, _)| c.clone()).collect();
    if top.is_empty() {
        warn!("[SAMPLING] no authentic files found in {}", input_dir.display());
        return Ok(top);
    }
    info!(
        "The top {} categories are: {:?}",
        top.len(),
        top.iter().map(|c| c.as_str()).collect::<Vec<_>>()
    );

    let selected: Vec<String> = top
        .iter()
        .filter_map(|c| groups.get(c))
        .flat_map(|files| files.iter().cloned())
        .collect();
    materialize(&selected, input_dir, output_dir, TransferMode::Copy)?;

    Ok(top)
}

/// Copy every tampered file whose source or destination category is in `categories`.
pub fn sample_tampered_for_categories(
    input_dir: &Path,
    output_dir: &Path,
    categories: &[Category],
) -> Result<usize, SamplingError> {
    if categories.is_empty() {
        return Err(SamplingError::Configuration(
            "a non-empty list of categories is required".to_string(),
        ));
    }

    let selected: Vec<String> = list_image_files(input_dir)?
        .into_iter()
        .filter(|name| {
            parse_tampered(name)
                .map(|pair| categories.iter().any(|c| pair.contains(c)))
                .unwrap_or(false)
        })
        .collect();

    let count = materialize(&selected, input_dir, output_dir, TransferMode::Copy)?;
    info!(
        "Sampled {} tampered (spliced) images to {}",
        count,
        output_dir.display()
    );
    Ok(count)
}

/// Parameters for drawing few-shot prompt examples out of a sample directory.
#[derive(Debug, Clone)]
pub struct PromptSampleRequest<'a> {
    pub input_dir: &'a Path,
    pub output_dir: &'a Path,
    pub categories: &'a [Category],
    pub total: usize,
    pub mode: TransferMode,
}

/// Stratify authentic files across `categories` and transfer them.
pub fn sample_authentic_for_prompt<R: Rng + ?Sized>(
    request: &PromptSampleRequest<'_>,
    rng: &mut R,
) -> Result<usize, SamplingError> {
    let pattern = AuthenticPattern::restricted(request.categories);
    sample_for_prompt(request, &pattern, request.categories, rng)
}

/// Stratify tampered files across the full categories x categories pair grid and transfer them.
pub fn sample_tampered_for_prompt<R: Rng + ?Sized>(
    request: &PromptSampleRequest<'_>,
    rng: &mut R,
) -> Result<usize, SamplingError> {
    let pattern = TamperedPairPattern::restricted(request.categories);
    let pairs = CategoryPair::grid(request.categories);
    sample_for_prompt(request, &pattern, &pairs, rng)
}

fn sample_for_prompt<P, R>(
    request: &PromptSampleRequest<'_>,
    pattern: &P,
    keys: &[P::Key],
    rng: &mut R,
) -> Result<usize, SamplingError>
where
    P: FilenamePattern,
    P::Key: std::fmt::Debug,
    R: Rng + ?Sized,
{
    let names = list_image_files(request.input_dir)?;
    let groups = group_by_pattern(&names, pattern);
    let selected = stratified_sample(&groups, keys, request.total, rng)?;

    let count = materialize(&selected, request.input_dir, request.output_dir, request.mode)?;
    info!(
        "Transferred {} of {} requested images to {}",
        count,
        request.total,
        request.output_dir.display()
    );
    Ok(count)
}
