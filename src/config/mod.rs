//! Configuration Module - TOML-based Allocator Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Every section has defaults, so an empty file (or no file at all)
//! is a valid configuration; CLI flags override individual fields.
//! Market arrays are kept as the raw comma-separated text the user
//! typed; they are parsed and checked right before a run.

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::domain::adam::AdamConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
  /// Identity and logging.
  #[serde(default)]
  pub app: AppSection,
  /// Market inputs.
  #[serde(default)]
  pub market: MarketConfig,
  /// Optimizer settings.
  #[serde(default)]
  pub optimizer: OptimizerConfig,
}

/// Identity and logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppSection {
  /// Human-readable name, shown in logs.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Tracing output format.
  #[serde(default)]
  pub log_format: LogFormat,
}

impl Default for AppSection {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      log_format: LogFormat::default(),
    }
  }
}

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
  /// One JSON object per line.
  Json,
  /// Human-readable, for terminals.
  #[default]
  Pretty,
}

/// Market inputs as comma-separated text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MarketConfig {
  /// Market prices, e.g. `"0.3, 0.55"`.
  #[serde(default)]
  pub prices: String,
  /// Assumed YES probabilities, same count as `prices`.
  #[serde(default)]
  pub true_probabilities: String,
}

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OptimizerConfig {
  /// Initial wealth `W` in USDC.
  #[serde(default = "default_initial_wealth")]
  pub initial_wealth: f64,
  /// Adam learning rate.
  #[serde(default = "default_learning_rate")]
  pub learning_rate: f64,
  /// Number of optimizer steps.
  #[serde(default = "default_iterations")]
  pub iterations: usize,
  /// Monte-Carlo samples per step.
  #[serde(default = "default_batch_size")]
  pub batch_size: usize,
  /// RNG seed; unset means OS entropy (runs are not reproducible).
  #[serde(default)]
  pub seed: Option<u64>,
  /// Adam first-moment decay.
  #[serde(default = "default_beta1")]
  pub beta1: f64,
  /// Adam second-moment decay.
  #[serde(default = "default_beta2")]
  pub beta2: f64,
  /// Adam denominator epsilon.
  #[serde(default = "default_epsilon")]
  pub epsilon: f64,
}

impl OptimizerConfig {
  /// Adam hyper-parameters for this configuration.
  pub fn adam(&self) -> AdamConfig {
    AdamConfig {
      learning_rate: self.learning_rate,
      beta1: self.beta1,
      beta2: self.beta2,
      epsilon: self.epsilon,
    }
  }
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      initial_wealth: default_initial_wealth(),
      learning_rate: default_learning_rate(),
      iterations: default_iterations(),
      batch_size: default_batch_size(),
      seed: None,
      beta1: default_beta1(),
      beta2: default_beta2(),
      epsilon: default_epsilon(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "kelly-allocator".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_initial_wealth() -> f64 {
  100.0
}

fn default_learning_rate() -> f64 {
  0.05
}

fn default_iterations() -> usize {
  1000
}

fn default_batch_size() -> usize {
  256
}

fn default_beta1() -> f64 {
  0.9
}

fn default_beta2() -> f64 {
  0.999
}

fn default_epsilon() -> f64 {
  1e-7
}
