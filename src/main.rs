use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use splice_eval_lib::models::{Grouping, Verdict};
use splice_eval_lib::services::dataset::{write_listing, SAMPLE_SUBDIRS};
use splice_eval_lib::services::evaluation::{
    build_report, classify_directory, read_decisions, render_report, PromptMode, RunConfig,
};
use splice_eval_lib::services::providers::{get_api_key, parse_provider, ProviderClient};
use splice_eval_lib::services::sampling::{
    sample_authentic_for_prompt, sample_tampered_for_categories, sample_tampered_for_prompt,
    sample_top_categories, PromptSampleRequest, TransferMode,
};
use splice_eval_lib::services::{AppConfig, ConfigStore};
use std::path::{Path, PathBuf};
use tracing::info;

/// Vision-LLM splicing detection harness for the CASIA v2.0 dataset
#[derive(Parser, Debug)]
#[command(name = "splice-eval", version)]
struct Cli {
    /// Directory holding config.json
    #[arg(long, env = "SPLICE_EVAL_CONFIG_DIR", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Dataset root, overrides the configured one
    #[arg(long, value_name = "DIR")]
    dataset_root: Option<PathBuf>,

    /// Sampling seed, overrides the configured one
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Pool {
    Authentic,
    Spliced,
    Both,
}

impl Pool {
    fn verdict(self) -> Result<Verdict> {
        match self {
            Pool::Authentic => Ok(Verdict::Authentic),
            Pool::Spliced => Ok(Verdict::Spliced),
            Pool::Both => Err(anyhow!("choose either `authentic` or `spliced`")),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy the top authentic categories and the matching tampered images into the sample dirs
    SampleDataset {
        #[arg(long)]
        top: Option<usize>,
    },
    /// Draw a category-balanced prompt-example set out of the sample dirs
    SamplePrompts {
        #[arg(long, value_enum, default_value = "both")]
        pool: Pool,
        /// Overrides the configured sample size of the chosen pool
        #[arg(long)]
        total: Option<usize>,
        /// `move` depletes the sample dir so later runs never reuse an example
        #[arg(long, value_enum, default_value = "move")]
        transfer: TransferMode,
    },
    /// Ask the model about every image of a sample dir and write the decision CSV
    Classify {
        #[arg(long, value_enum)]
        pool: Pool,
        #[arg(long, value_enum, default_value = "zero-shot")]
        mode: PromptMode,
        /// Image directory, defaults to the pool's sample dir
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// `name[:model]`
        #[arg(long)]
        provider: Option<String>,
    },
    /// Accuracy statistics from a decision CSV
    Analyze {
        csv: PathBuf,
        /// Label every row of the table should carry
        #[arg(long, value_enum)]
        expected: Pool,
        /// Group by category membership (a spliced image counts for both of its categories)
        #[arg(long)]
        membership: bool,
        #[arg(long)]
        json: bool,
    },
    /// Write `<subdir>.txt` manifests of the sample dirs
    ListFiles,
    /// Inspect or edit the stored configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    SetKey { provider: String, key: String },
    DeleteKey { provider: String },
    SetUrl { provider: String, url: String },
}

fn open_store(cli: &Cli) -> ConfigStore {
    let dir = cli
        .config_dir
        .clone()
        .or_else(ConfigStore::default_config_dir)
        .unwrap_or_else(|| PathBuf::from(".splice-eval"));
    ConfigStore::new(dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    splice_eval_lib::init_logging(&cli.log_level);

    let store = open_store(&cli);
    let mut config = store.load().map_err(|e| anyhow!(e))?;
    if let Some(root) = &cli.dataset_root {
        config.dataset.root = root.clone();
    }
    if let Some(seed) = cli.seed {
        config.sampling.seed = seed;
    }

    match &cli.command {
        Commands::SampleDataset { top } => sample_dataset(&config, top.unwrap_or(config.sampling.top_categories)),
        Commands::SamplePrompts { pool, total, transfer } => sample_prompts(&config, *pool, *total, *transfer),
        Commands::Classify { pool, mode, input, output, provider } => {
            classify(&store, &config, *pool, *mode, input.clone(), output.clone(), provider.as_deref()).await
        }
        Commands::Analyze { csv, expected, membership, json } => {
            analyze(&config, csv, expected.verdict()?, *membership, *json)
        }
        Commands::ListFiles => {
            let written = write_listing(&config.dataset.root, &SAMPLE_SUBDIRS)
                .with_context(|| format!("listing {}", config.dataset.root.display()))?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Config { command } => config_command(&store, &config, command),
    }
}

fn sample_dataset(config: &AppConfig, top: usize) -> Result<()> {
    let ds = &config.dataset;
    let categories = sample_top_categories(
        &ds.dir(&ds.authentic_dir),
        &ds.dir(&ds.authentic_sample_dir),
        top,
    )
    .context("sampling authentic images")?;
    println!(
        "The top {} categories are: {}",
        categories.len(),
        categories.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
    );

    let count = sample_tampered_for_categories(
        &ds.dir(&ds.tampered_dir),
        &ds.dir(&ds.spliced_sample_dir),
        &categories,
    )
    .context("sampling tampered images")?;
    println!("Sampled {} tampered (spliced) images", count);
    Ok(())
}

fn sample_prompts(config: &AppConfig, pool: Pool, total: Option<usize>, transfer: TransferMode) -> Result<()> {
    let ds = &config.dataset;
    let categories = config.sampling.category_set();
    let mut rng = StdRng::seed_from_u64(config.sampling.seed);

    if matches!(pool, Pool::Authentic | Pool::Both) {
        let input = ds.dir(&ds.authentic_sample_dir);
        let output = ds.dir(&ds.authentic_prompt_dir);
        let request = PromptSampleRequest {
            input_dir: &input,
            output_dir: &output,
            categories: &categories,
            total: total.unwrap_or(config.sampling.authentic_prompt_samples),
            mode: transfer,
        };
        let n = sample_authentic_for_prompt(&request, &mut rng).context("sampling authentic prompt examples")?;
        println!("Transferred {} authentic images to {}", n, output.display());
    }

    if matches!(pool, Pool::Spliced | Pool::Both) {
        let input = ds.dir(&ds.spliced_sample_dir);
        let output = ds.dir(&ds.spliced_prompt_dir);
        let request = PromptSampleRequest {
            input_dir: &input,
            output_dir: &output,
            categories: &categories,
            total: total.unwrap_or(config.sampling.spliced_prompt_samples),
            mode: transfer,
        };
        let n = sample_tampered_for_prompt(&request, &mut rng).context("sampling spliced prompt examples")?;
        println!("Transferred {} spliced images to {}", n, output.display());
    }
    Ok(())
}

async fn classify(
    store: &ConfigStore,
    config: &AppConfig,
    pool: Pool,
    mode: PromptMode,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    provider: Option<&str>,
) -> Result<()> {
    let verdict = pool.verdict()?;
    let ds = &config.dataset;

    let spec = parse_provider(
        provider
            .or(config.default_provider.as_deref())
            .unwrap_or("openai"),
    );
    let mut settings = store.model_settings(config, &spec.name);
    if !spec.model.is_empty() {
        settings.model = spec.model.clone();
    }
    let api_key = get_api_key(&spec.name, Some(store))
        .ok_or_else(|| anyhow!("no API key for provider `{}`", spec.name))?;
    let client = ProviderClient::new(&settings, api_key, config.proxy_url())?;
    info!(provider = %spec.name, model = %settings.model, url = %client.url(), "provider.ready");

    let (sample_dir, prefix) = match verdict {
        Verdict::Authentic => (&ds.authentic_sample_dir, "Au"),
        Verdict::Spliced => (&ds.spliced_sample_dir, "Sp"),
    };
    let run = RunConfig {
        mode,
        input_dir: input.unwrap_or_else(|| ds.dir(sample_dir)),
        output_csv: output.unwrap_or_else(|| {
            ds.results_dir
                .join(format!("{}_sample_llm_decisions_{}.csv", prefix, mode.as_str()))
        }),
        authentic_examples_dir: ds.dir(&ds.authentic_prompt_dir),
        spliced_examples_dir: ds.dir(&ds.spliced_prompt_dir),
        authentic_cot_dir: ds.dir(&ds.authentic_cot_dir),
        spliced_cot_dir: ds.dir(&ds.spliced_cot_dir),
        per_class: config.sampling.few_shot_per_class,
        seed: config.sampling.seed,
        max_tokens: mode.max_tokens(&settings),
    };

    let summary = classify_directory(&client, &run).await?;
    println!(
        "Processing complete. {} images ({} failed). Results saved to: {}",
        summary.processed, summary.failed, summary.output
    );
    Ok(())
}

fn analyze(config: &AppConfig, csv: &Path, expected: Verdict, membership: bool, json: bool) -> Result<()> {
    let records = read_decisions(csv).with_context(|| format!("reading {}", csv.display()))?;
    let grouping = if membership {
        Grouping::Membership(config.sampling.category_set())
    } else {
        Grouping::Category
    };

    let report = build_report(&records, expected, &grouping);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

fn config_command(store: &ConfigStore, config: &AppConfig, command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            for key in shown.api_keys.values_mut() {
                *key = "***".to_string();
            }
            println!("# {}", store.config_file().display());
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigCommand::SetKey { provider, key } => store.set_api_key(provider, key).map_err(|e| anyhow!(e))?,
        ConfigCommand::DeleteKey { provider } => store.delete_api_key(provider).map_err(|e| anyhow!(e))?,
        ConfigCommand::SetUrl { provider, url } => store.set_provider_url(provider, url).map_err(|e| anyhow!(e))?,
    }
    Ok(())
}
