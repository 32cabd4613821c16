// Configuration management for the grid trading engine

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters of one grid session. Immutable once the session starts; a
/// rebalance derives a fresh range from these plus the trigger price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub instrument: String,
    pub lower_price: f64,
    pub upper_price: f64,
    pub grid_count: usize,
    /// Fixed quantity per level. Mutually exclusive with `total_investment`.
    #[serde(default)]
    pub quantity_per_grid: Option<f64>,
    /// Capital to spread equally across levels (equal capital, not equal
    /// share count). Mutually exclusive with `quantity_per_grid`.
    #[serde(default)]
    pub total_investment: Option<f64>,
    pub poll_interval_secs: u64,
}

/// Which tick strategy the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EngineMode {
    /// React to the price crossing grid levels, tracking each level's
    /// held state explicitly. Primary mode: the invariants are auditable.
    LevelCrossing,
    /// Infer fills from the open-order list draining to empty, then
    /// recenter and replace the whole grid.
    OrderRefill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mode: EngineMode,
    /// Half-width of the recentered range on rebalance, as a fraction of
    /// the trigger price.
    pub rebalance_band: f64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Capital assumed when neither `quantity_per_grid` nor
    /// `total_investment` is configured.
    pub fallback_investment: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::LevelCrossing,
            rebalance_band: 0.05,
            max_retries: 3,
            retry_delay_secs: 2,
            fallback_investment: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory for trade-history CSV exports written on shutdown.
    pub output_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "logs/trades".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Optional webhook to notify on unrecoverable startup failure.
    #[serde(default)]
    pub alert_webhook: Option<String>,
    /// Base URL for the REST market-data gateway in live mode.
    #[serde(default)]
    pub market_data_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid: GridConfig {
                instrument: "ETH-USDT".to_string(),
                lower_price: 1500.0,
                upper_price: 2500.0,
                grid_count: 10,
                quantity_per_grid: None,
                total_investment: Some(1000.0),
                poll_interval_secs: 60,
            },
            engine: EngineConfig::default(),
            report: ReportConfig::default(),
            alert_webhook: None,
            market_data_url: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.instrument.is_empty() {
            return Err(ConfigError::Validation(
                "instrument must not be empty".to_string(),
            ));
        }

        if self.grid.upper_price <= self.grid.lower_price {
            return Err(ConfigError::Validation(format!(
                "upper_price ({}) must be greater than lower_price ({})",
                self.grid.upper_price, self.grid.lower_price
            )));
        }

        if self.grid.grid_count < 1 {
            return Err(ConfigError::Validation(
                "grid_count must be at least 1".to_string(),
            ));
        }

        // Neither funding field set is allowed: the engine falls back to
        // `fallback_investment`.
        match (self.grid.quantity_per_grid, self.grid.total_investment) {
            (Some(q), _) if q <= 0.0 => {
                return Err(ConfigError::Validation(
                    "quantity_per_grid must be positive".to_string(),
                ));
            }
            (_, Some(t)) if t <= 0.0 => {
                return Err(ConfigError::Validation(
                    "total_investment must be positive".to_string(),
                ));
            }
            _ => {}
        }

        if self.grid.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.engine.rebalance_band <= 0.0 || self.engine.rebalance_band >= 1.0 {
            return Err(ConfigError::Validation(
                "rebalance_band must be between 0 and 1 exclusive".to_string(),
            ));
        }

        if self.engine.max_retries == 0 {
            return Err(ConfigError::Validation(
                "max_retries must be at least 1".to_string(),
            ));
        }

        if self.engine.fallback_investment <= 0.0 {
            return Err(ConfigError::Validation(
                "fallback_investment must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::error::EngineError {
    fn from(err: ConfigError) -> Self {
        crate::error::EngineError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut config = Config::default();
        config.grid.lower_price = 2000.0;
        config.grid.upper_price = 1800.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_zero_grid_count() {
        let mut config = Config::default();
        config.grid.grid_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_funding_may_be_left_to_fallback() {
        let mut config = Config::default();
        config.grid.quantity_per_grid = None;
        config.grid.total_investment = None;
        assert!(config.validate().is_ok());

        config.grid.total_investment = Some(-5.0);
        assert!(config.validate().is_err());

        config.grid.total_investment = Some(500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_fallback_investment() {
        let mut config = Config::default();
        config.engine.fallback_investment = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.grid.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_band() {
        let mut config = Config::default();
        config.engine.rebalance_band = 1.5;
        assert!(config.validate().is_err());
        config.engine.rebalance_band = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.grid.instrument, config.grid.instrument);
        assert_eq!(parsed.engine.mode, EngineMode::LevelCrossing);
    }
}
