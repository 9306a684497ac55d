// Classification Runner
// Sends every image of a sample directory to the model and records the decisions

use super::decisions::{DecisionTableError, DecisionWriter};
use super::prompts::{
    few_shot_cot_prompt, few_shot_prompt, image_part, match_cot_examples, primary_category,
    select_few_shot_examples, zero_shot_prompt, ContentPart,
};
use crate::models::{DecisionRecord, RunSummary};
use crate::services::config_store::ModelConfig;
use crate::services::dataset::list_image_paths;
use crate::services::providers::VisionModel;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decision table error: {0}")]
    Table(#[from] DecisionTableError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    ZeroShot,
    FewShot,
    FewShotCot,
}

impl PromptMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptMode::ZeroShot => "zero_shot",
            PromptMode::FewShot => "few_shot",
            PromptMode::FewShotCot => "few_shot_cot",
        }
    }

    pub fn max_tokens(self, settings: &ModelConfig) -> i32 {
        match self {
            PromptMode::ZeroShot => settings.zero_shot_max_tokens,
            PromptMode::FewShot => settings.few_shot_max_tokens,
            PromptMode::FewShotCot => settings.cot_max_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: PromptMode,
    pub input_dir: PathBuf,
    pub output_csv: PathBuf,
    pub authentic_examples_dir: PathBuf,
    pub spliced_examples_dir: PathBuf,
    pub authentic_cot_dir: PathBuf,
    pub spliced_cot_dir: PathBuf,
    pub per_class: usize,
    pub seed: u64,
    pub max_tokens: i32,
}

/// Example pools loaded once per run.
struct ExamplePools {
    authentic: Vec<PathBuf>,
    spliced: Vec<PathBuf>,
}

fn load_pools(config: &RunConfig) -> Result<ExamplePools, RunError> {
    if config.mode != PromptMode::FewShot {
        return Ok(ExamplePools {
            authentic: Vec::new(),
            spliced: Vec::new(),
        });
    }
    Ok(ExamplePools {
        authentic: list_image_paths(&config.authentic_examples_dir)?,
        spliced: list_image_paths(&config.spliced_examples_dir)?,
    })
}

fn build_prompt(
    target: &Path,
    config: &RunConfig,
    pools: &ExamplePools,
) -> Result<Vec<ContentPart>, String> {
    let mut parts = match config.mode {
        PromptMode::ZeroShot => zero_shot_prompt(),
        PromptMode::FewShot => {
            // same examples for the same target on every run
            let mut rng = StdRng::seed_from_u64(config.seed);
            let (au, sp) = select_few_shot_examples(
                target,
                &pools.authentic,
                &pools.spliced,
                config.per_class,
                &mut rng,
            );
            few_shot_prompt(&au, &sp).map_err(|e| format!("few-shot examples: {}", e))?
        }
        PromptMode::FewShotCot => {
            let name = target
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let (au, sp) = match primary_category(&name) {
                Some(category) => (
                    match_cot_examples(&category, &config.authentic_cot_dir, &config.authentic_examples_dir)
                        .map_err(|e| format!("authentic reasoning examples: {}", e))?,
                    match_cot_examples(&category, &config.spliced_cot_dir, &config.spliced_examples_dir)
                        .map_err(|e| format!("spliced reasoning examples: {}", e))?,
                ),
                None => (Vec::new(), Vec::new()),
            };
            few_shot_cot_prompt(&au, &sp).map_err(|e| format!("reasoning examples: {}", e))?
        }
    };

    parts.push(image_part(target).map_err(|e| format!("read image: {}", e))?);
    Ok(parts)
}

async fn classify_one<M: VisionModel + ?Sized>(
    model: &M,
    target: &Path,
    config: &RunConfig,
    pools: &ExamplePools,
) -> Result<String, String> {
    let parts = build_prompt(target, config, pools)?;
    let result = model
        .complete(parts, config.max_tokens)
        .await
        .map_err(|e| e.to_string())?;
    info!(
        "[RUNNER] model={} latency_ms={} decision={:?}",
        model.model_name(),
        result.latency_ms,
        result.content
    );
    Ok(result.content)
}

/// Classify every image in `config.input_dir`, one request at a time.
///
/// Each decision is written as soon as it arrives. A failed image is recorded
/// as `ERROR: <message>` and the run continues.
pub async fn classify_directory<M: VisionModel + ?Sized>(
    model: &M,
    config: &RunConfig,
) -> Result<RunSummary, RunError> {
    let images = list_image_paths(&config.input_dir)?;
    let pools = load_pools(config)?;
    let mut writer = DecisionWriter::create(&config.output_csv)?;

    info!(
        "[RUNNER] mode={} images={} output={}",
        config.mode.as_str(),
        images.len(),
        config.output_csv.display()
    );

    let mut summary = RunSummary {
        output: config.output_csv.display().to_string(),
        ..RunSummary::default()
    };

    for path in &images {
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("Processing {}...", path.display());

        let decision = match classify_one(model, path, config, &pools).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Error processing {}: {}", path.display(), e);
                summary.failed += 1;
                format!("ERROR: {}", e)
            }
        };

        writer.append(&DecisionRecord::new(filename, decision))?;
        summary.processed += 1;
    }

    info!(
        "Processing complete. {} images ({} failed). Results saved to: {}",
        summary.processed,
        summary.failed,
        config.output_csv.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::evaluation::decisions::read_decisions;
    use crate::services::providers::{ChatResult, ProviderError};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;

    struct FakeModel {
        replies: Mutex<Vec<Result<String, u16>>>,
        seen_parts: Mutex<Vec<usize>>,
    }

    impl FakeModel {
        fn new(replies: Vec<Result<String, u16>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen_parts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionModel for FakeModel {
        fn model_name(&self) -> &str {
            "fake"
        }

        async fn complete(
            &self,
            parts: Vec<ContentPart>,
            _max_tokens: i32,
        ) -> Result<ChatResult, ProviderError> {
            self.seen_parts.lock().unwrap().push(parts.len());
            match self.replies.lock().unwrap().remove(0) {
                Ok(content) => Ok(ChatResult { content, latency_ms: 1 }),
                Err(status) => Err(ProviderError::ApiError {
                    status,
                    message: "rate limited".to_string(),
                }),
            }
        }
    }

    fn run_config(root: &Path, mode: PromptMode) -> RunConfig {
        RunConfig {
            mode,
            input_dir: root.join("Au_sample"),
            output_csv: root.join("results").join("out.csv"),
            authentic_examples_dir: root.join("Au_additional"),
            spliced_examples_dir: root.join("Sp_additional"),
            authentic_cot_dir: root.join("Au_CoT"),
            spliced_cot_dir: root.join("Sp_CoT"),
            per_class: 2,
            seed: 42,
            max_tokens: 100,
        }
    }

    fn touch(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            fs::write(dir.join(name), b"img").unwrap();
        }
    }

    #[tokio::test]
    async fn test_zero_shot_run_records_errors_and_continues() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Au_sample"), &["Au_ani_1.jpg", "Au_arc_1.jpg", "notes.txt"]);

        let model = FakeModel::new(vec![Ok("Authentic".to_string()), Err(429)]);
        let config = run_config(root.path(), PromptMode::ZeroShot);
        let summary = classify_directory(&model, &config).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        let rows = read_decisions(&config.output_csv).unwrap();
        assert_eq!(rows[0], DecisionRecord::new("Au_ani_1.jpg", "Authentic"));
        assert_eq!(rows[1].filename, "Au_arc_1.jpg");
        assert!(rows[1].decision.starts_with("ERROR: API error: 429"));
        assert_eq!(*model.seen_parts.lock().unwrap(), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_few_shot_run_includes_examples() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Au_sample"), &["Au_ani_1.jpg"]);
        touch(&root.path().join("Au_additional"), &["Au_ani_2.jpg", "Au_ani_3.jpg", "Au_arc_2.jpg"]);
        touch(
            &root.path().join("Sp_additional"),
            &["Tp_D_CND_M_N_ani00001_arc00002_00001.jpg", "Tp_D_CND_M_N_cha00001_arc00002_00002.jpg"],
        );

        let model = FakeModel::new(vec![Ok("Spliced".to_string())]);
        let config = run_config(root.path(), PromptMode::FewShot);
        classify_directory(&model, &config).await.unwrap();

        // 2 authentic + 1 spliced example (text + image each), task text, target image
        assert_eq!(*model.seen_parts.lock().unwrap(), vec![8]);
    }

    #[tokio::test]
    async fn test_cot_run_missing_dirs_marks_error() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Au_sample"), &["Au_ani_1.jpg"]);

        let model = FakeModel::new(Vec::new());
        let config = run_config(root.path(), PromptMode::FewShotCot);
        let summary = classify_directory(&model, &config).await.unwrap();

        assert_eq!(summary.failed, 1);
        let rows = read_decisions(&config.output_csv).unwrap();
        assert!(rows[0].decision.starts_with("ERROR: authentic reasoning examples"));
        assert!(model.seen_parts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cot_run_uses_reasoning() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("Au_sample"), &["Au_ani_1.jpg"]);
        touch(&root.path().join("Au_additional"), &["Au_ani_2.jpg"]);
        touch(&root.path().join("Sp_additional"), &[]);
        fs::create_dir_all(root.path().join("Au_CoT")).unwrap();
        fs::create_dir_all(root.path().join("Sp_CoT")).unwrap();
        fs::write(root.path().join("Au_CoT").join("Au_ani_2.txt"), "Consistent shadows.").unwrap();

        let model = FakeModel::new(vec![Ok("Authentic".to_string())]);
        let config = run_config(root.path(), PromptMode::FewShotCot);
        let summary = classify_directory(&model, &config).await.unwrap();

        assert_eq!(summary.failed, 0);
        assert_eq!(*model.seen_parts.lock().unwrap(), vec![4]);
    }
}
