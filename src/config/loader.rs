//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating optimizer parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    path = %path.display(),
    iterations = config.optimizer.iterations,
    batch_size = config.optimizer.batch_size,
    learning_rate = config.optimizer.learning_rate,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
///
/// # Errors
/// Returns an error when the file exists but cannot be read, parsed,
/// or validated.
pub fn load_or_default(path: &str) -> Result<AppConfig> {
  if Path::new(path).exists() {
    load_config(path)
  } else {
    info!(path, "No config file found, using defaults");
    Ok(AppConfig::default())
  }
}

/// Parse and validate configuration text.
///
/// # Errors
/// Returns an error on TOML syntax errors or invalid values.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate optimizer parameters.
///
/// Checks for:
/// - Finite, positive wealth and learning rate
/// - At least one iteration and one sample per batch
/// - Adam decay rates in [0, 1) and a positive epsilon
///
/// Market arrays are not checked here; the training loop validates
/// them before creating any run state.
///
/// # Errors
/// Returns the first violated rule.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  let opt = &config.optimizer;

  anyhow::ensure!(
    opt.initial_wealth.is_finite() && opt.initial_wealth > 0.0,
    "initial_wealth must be a positive number, got {}",
    opt.initial_wealth
  );
  anyhow::ensure!(
    opt.learning_rate.is_finite() && opt.learning_rate > 0.0,
    "learning_rate must be a positive number, got {}",
    opt.learning_rate
  );
  anyhow::ensure!(opt.iterations > 0, "iterations must be at least 1");
  anyhow::ensure!(opt.batch_size > 0, "batch_size must be at least 1");
  anyhow::ensure!(
    (0.0..1.0).contains(&opt.beta1),
    "beta1 must be in [0, 1), got {}",
    opt.beta1
  );
  anyhow::ensure!(
    (0.0..1.0).contains(&opt.beta2),
    "beta2 must be in [0, 1), got {}",
    opt.beta2
  );
  anyhow::ensure!(
    opt.epsilon > 0.0,
    "epsilon must be positive, got {}",
    opt.epsilon
  );

  Ok(())
}
