// Configuration Storage Service
// Handles config file read/write and version backup

use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    pub default_provider: Option<String>,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_provider: Some("openai".to_string()),
            proxy: None,
            dataset: DatasetConfig::default(),
            sampling: SamplingConfig::default(),
            model: ModelConfig::default(),
            providers: HashMap::new(),
            api_keys: HashMap::new(),
        }
    }
}

impl AppConfig {
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.https.as_deref().or(p.http.as_deref()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

/// Directory layout of the extracted CASIA v2.0 dataset and the harness outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetConfig {
    pub root: PathBuf,
    pub authentic_dir: String,
    pub tampered_dir: String,
    pub authentic_sample_dir: String,
    pub spliced_sample_dir: String,
    pub authentic_prompt_dir: String,
    pub spliced_prompt_dir: String,
    pub authentic_cot_dir: String,
    pub spliced_cot_dir: String,
    pub results_dir: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("CASIA2"),
            authentic_dir: "Au".to_string(),
            tampered_dir: "Tp".to_string(),
            authentic_sample_dir: "Au_sample".to_string(),
            spliced_sample_dir: "Sp_sample".to_string(),
            authentic_prompt_dir: "Au_additional".to_string(),
            spliced_prompt_dir: "Sp_additional".to_string(),
            authentic_cot_dir: "Au_CoT".to_string(),
            spliced_cot_dir: "Sp_CoT".to_string(),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl DatasetConfig {
    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplingConfig {
    pub seed: u64,
    pub top_categories: usize,
    pub categories: Vec<String>,
    pub authentic_prompt_samples: usize,
    pub spliced_prompt_samples: usize,
    pub few_shot_per_class: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            top_categories: 3,
            categories: vec!["ani".to_string(), "arc".to_string(), "cha".to_string()],
            authentic_prompt_samples: 38,
            spliced_prompt_samples: 50,
            few_shot_per_class: 2,
        }
    }
}

impl SamplingConfig {
    pub fn category_set(&self) -> Vec<Category> {
        self.categories.iter().map(|c| Category::new(c)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f64,
    pub base_url: Option<String>,
    pub zero_shot_max_tokens: i32,
    pub few_shot_max_tokens: i32,
    pub cot_max_tokens: i32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-2025-04-14".to_string(),
            temperature: 0.0,
            base_url: None,
            zero_shot_max_tokens: 100,
            few_shot_max_tokens: 150,
            cot_max_tokens: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("splice-eval"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names embed the timestamp
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Get provider API key from config file
    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Delete provider API key from config file
    pub fn delete_api_key(&self, provider: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }

    /// Set provider base URL in config file
    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), String> {
        let mut config = self.load()?;
        let provider_config = config.providers.entry(provider.to_string()).or_default();
        provider_config.base_url = Some(url.to_string());
        self.save(&config)
    }

    /// Model settings with the provider's base URL and model override applied.
    pub fn model_settings(&self, config: &AppConfig, provider: &str) -> ModelConfig {
        let mut settings = config.model.clone();
        if let Some(p) = config.providers.get(provider) {
            if let Some(url) = p.base_url.as_ref().filter(|u| !u.trim().is_empty()) {
                settings.base_url = Some(url.clone());
            }
            if let Some(model) = p.model.as_ref().filter(|m| !m.trim().is_empty()) {
                settings.model = model.clone();
            }
        }
        settings
    }
}
