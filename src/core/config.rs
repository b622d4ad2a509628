//! Configuration for the memory bank engine
//!
//! Mirrors the corpus's TOML-file-plus-global-`RwLock<Option<Config>>`
//! configuration shape, scoped to the bank: one nested struct per
//! subsystem, every tunable named here instead of scattered as literals.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;

use crate::core::error::{BankError, Result};
use crate::core::logging::LoggingConfig;

static CONFIG: Lazy<RwLock<Option<BankConfig>>> = Lazy::new(|| RwLock::new(None));

/// Complete memory bank configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    pub bank_root: PathBuf,
    pub file_layer: FileLayerConfig,
    pub scoring: ScoringConfig,
    pub optimizer: OptimizerConfig,
    pub duplication: DuplicationConfig,
    pub patterns: PatternConfig,
    pub learning: LearningConfig,
    pub quality: QualityWeights,
    #[serde(skip, default = "LoggingConfig::default")]
    pub logging: LoggingConfig,
}

/// File layer (C1) tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLayerConfig {
    pub lock_timeout_s: u64,
    pub rate_ops_per_sec: u32,
    pub rate_wait_s: u64,
    pub subprocess_timeout_s: u64,
}

impl Default for FileLayerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_s: 5,
            rate_ops_per_sec: 100,
            rate_wait_s: 1,
            subprocess_timeout_s: 30,
        }
    }
}

/// Relevance scorer (C7) tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub w_keyword: f64,
    pub w_dependency: f64,
    pub w_recency: f64,
    pub w_quality: f64,
    pub dependency_cache_cap: usize,
    /// Half-life, in days, of the recency decay curve.
    pub recency_half_life_days: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            w_keyword: 0.40,
            w_dependency: 0.30,
            w_recency: 0.20,
            w_quality: 0.10,
            dependency_cache_cap: 100,
            recency_half_life_days: 14.0,
        }
    }
}

/// Context optimizer (C8) tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub token_budget_default: u64,
    /// Fraction of the budget the `hybrid` strategy spends in `priority` mode
    /// before switching to `sections` for the remainder.
    pub hybrid_priority_fraction: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            token_budget_default: 100_000,
            hybrid_priority_fraction: 0.6,
        }
    }
}

/// Duplication detector (C9) tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicationConfig {
    pub similarity_threshold: f64,
    pub consolidation_threshold: f64,
    pub similarity_cache_cap: usize,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            consolidation_threshold: 0.70,
            similarity_cache_cap: 1000,
        }
    }
}

/// Pattern analyzer (C10) tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub access_log_window: usize,
    pub unused_after_days: i64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            access_log_window: 10_000,
            unused_after_days: 30,
        }
    }
}

/// Learning store (C13) tunables: confidence-adjustment coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Weight applied to pattern success rate deviation from 0.5.
    pub alpha: f64,
    /// Weight applied to preference-table deviation from 0.5.
    pub beta: f64,
    pub retention_cap: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.3,
            retention_cap: 5_000,
        }
    }
}

/// Quality metric weights (C11), sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub completeness: f64,
    pub consistency: f64,
    pub freshness: f64,
    pub structure: f64,
    pub efficiency: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.25,
            consistency: 0.25,
            freshness: 0.15,
            structure: 0.20,
            efficiency: 0.15,
        }
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            bank_root: default_bank_root(),
            file_layer: FileLayerConfig::default(),
            scoring: ScoringConfig::default(),
            optimizer: OptimizerConfig::default(),
            duplication: DuplicationConfig::default(),
            patterns: PatternConfig::default(),
            learning: LearningConfig::default(),
            quality: QualityWeights::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Default bank root: `$CORTEX_HOME` if set, else `./.cortex`.
pub fn default_bank_root() -> PathBuf {
    if let Ok(home) = std::env::var("CORTEX_HOME") {
        PathBuf::from(home)
    } else {
        PathBuf::from(".cortex")
    }
}

/// Load configuration from `<bank_root>/config.toml`, or materialize defaults.
pub async fn load_config(bank_root: &PathBuf) -> Result<BankConfig> {
    let config_path = bank_root.join("config.toml");

    let config = if config_path.exists() {
        let contents = fs::read_to_string(&config_path).await?;
        let mut config: BankConfig = toml::from_str(&contents)?;
        config.bank_root = bank_root.clone();
        config
    } else {
        BankConfig {
            bank_root: bank_root.clone(),
            ..BankConfig::default()
        }
    };

    let mut global = CONFIG.write().await;
    *global = Some(config.clone());
    Ok(config)
}

/// Persist configuration to `<bank_root>/config.toml`.
pub async fn save_config(config: &BankConfig) -> Result<()> {
    fs::create_dir_all(&config.bank_root).await?;
    let config_path = config.bank_root.join("config.toml");
    let toml_str = toml::to_string_pretty(config)?;
    fs::write(&config_path, toml_str).await?;
    Ok(())
}

/// Fetch the last-loaded configuration, erroring if none has been loaded yet.
pub async fn get_config() -> Result<BankConfig> {
    let guard = CONFIG.read().await;
    guard
        .clone()
        .ok_or_else(|| BankError::internal("config", "configuration not loaded"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = QualityWeights::default();
        let sum = w.completeness + w.consistency + w.freshness + w.structure + w.efficiency;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn default_scoring_weights_sum_to_one() {
        let s = ScoringConfig::default();
        let sum = s.w_keyword + s.w_dependency + s.w_recency + s.w_quality;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn load_config_materializes_defaults_when_absent() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("bank");
        let config = load_config(&root).await.unwrap();
        assert_eq!(config.bank_root, root);
        assert_eq!(config.file_layer.lock_timeout_s, 5);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("bank");
        tokio::fs::create_dir_all(&root).await.unwrap();
        let mut config = BankConfig {
            bank_root: root.clone(),
            ..BankConfig::default()
        };
        config.duplication.similarity_threshold = 0.9;
        save_config(&config).await.unwrap();

        let loaded = load_config(&root).await.unwrap();
        assert_eq!(loaded.duplication.similarity_threshold, 0.9);
    }
}
