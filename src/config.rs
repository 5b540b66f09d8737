use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use serde::Deserialize;

const MAX_BUFFER_CAPACITY: usize = 10_000;

#[derive(Debug, Parser)]
#[command(name = "hypermine", about = "Simulated crypto mining dashboard")]
pub struct Cli {
    /// Milliseconds between simulation ticks.
    #[arg(long, default_value_t = 50)]
    pub tick_ms: u64,

    /// Seed the simulation RNG for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON file overriding simulation tuning.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    #[arg(long, default_value = "gemini-2.5-flash")]
    pub model: String,

    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Skip the language model and always use the canned insight.
    #[arg(long)]
    pub offline: bool,
}

impl Cli {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn sim_config(&self) -> Result<SimConfig> {
        match &self.config {
            Some(path) => SimConfig::load(path),
            None => Ok(SimConfig::default()),
        }
    }
}

/// Tuning knobs for the simulation. Every field has a default so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub max_hash_rate: f64,
    pub btc_rate_per_sec: f64,
    pub eth_rate_per_sec: f64,
    pub ramp_step_max: f64,
    pub decay_per_tick: f64,
    pub sample_probability: f64,
    pub history_capacity: usize,
    pub log_capacity: usize,
    pub insight_threshold: f64,
    pub withdrawal_delay_ms: u64,
    pub seed_btc: f64,
    pub seed_eth: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_hash_rate: 500_000.0,
            btc_rate_per_sec: 0.027,
            eth_rate_per_sec: 0.45,
            ramp_step_max: 5_000.0,
            decay_per_tick: 20_000.0,
            sample_probability: 0.2,
            history_capacity: 20,
            log_capacity: 5,
            insight_threshold: 0.5,
            withdrawal_delay_ms: 2_500,
            seed_btc: 12.4502,
            seed_eth: 145.203,
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_hash_rate.is_finite() && self.max_hash_rate > 0.0,
            "max_hash_rate must be positive"
        );
        ensure!(
            (0.0..=1.0).contains(&self.sample_probability),
            "sample_probability must be within 0..=1"
        );
        ensure!(
            (0.0..=1.0).contains(&self.insight_threshold),
            "insight_threshold must be within 0..=1"
        );
        ensure!(
            self.ramp_step_max >= 0.0 && self.decay_per_tick >= 0.0,
            "ramp_step_max and decay_per_tick must not be negative"
        );
        ensure!(
            self.btc_rate_per_sec >= 0.0 && self.eth_rate_per_sec >= 0.0,
            "earn rates must not be negative"
        );
        ensure!(
            self.history_capacity > 0 && self.log_capacity > 0,
            "buffer capacities must be at least 1"
        );
        ensure!(
            self.history_capacity <= MAX_BUFFER_CAPACITY && self.log_capacity <= MAX_BUFFER_CAPACITY,
            "buffer capacities must not exceed {}",
            MAX_BUFFER_CAPACITY
        );
        Ok(())
    }

    pub fn withdrawal_delay(&self) -> Duration {
        Duration::from_millis(self.withdrawal_delay_ms)
    }

    pub fn insight_trigger(&self) -> f64 {
        self.max_hash_rate * self.insight_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.insight_trigger(), 250_000.0);
        assert_eq!(config.withdrawal_delay(), Duration::from_millis(2_500));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = SimConfig::from_json(r#"{"max_hash_rate": 1000.0, "log_capacity": 8}"#)
            .expect("config parses");
        assert_eq!(config.max_hash_rate, 1000.0);
        assert_eq!(config.log_capacity, 8);
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.seed_btc, 12.4502);
    }

    #[test]
    fn rejects_bad_tuning() {
        assert!(SimConfig::from_json(r#"{"max_hash_rate": 0.0}"#).is_err());
        assert!(SimConfig::from_json(r#"{"sample_probability": 1.5}"#).is_err());
        assert!(SimConfig::from_json(r#"{"history_capacity": 0}"#).is_err());
        assert!(SimConfig::from_json(r#"{"ramp_step_max": -1.0}"#).is_err());
        assert!(SimConfig::from_json(r#"{"history_capacity": 18446744073709551615}"#).is_err());
        assert!(SimConfig::from_json(r#"{"log_capacity": 10001}"#).is_err());
        assert!(SimConfig::from_json(r#"{"history_capacity": 10000}"#).is_ok());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["hypermine"]);
        assert_eq!(cli.tick_rate(), Duration::from_millis(50));
        assert_eq!(cli.model, "gemini-2.5-flash");
        assert!(!cli.offline);
        assert!(cli.config.is_none());
    }
}
