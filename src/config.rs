//! Tuning values for every stage of an analysis run.
//!
//! Weights and thresholds are illustrative defaults; all of them can be
//! overridden from a TOML file and are passed explicitly into each engine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AnalysisError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessorConfig {
    pub scoring: ScoringConfig,
    pub tiers: TierThresholds,
    pub structure: StructureConfig,
    pub collector: CollectorConfig,
    pub report: ReportConfig,
}

impl AssessorConfig {
    /// Load and validate a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: AssessorConfig = toml::from_str(raw).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.tiers.validate()?;
        self.structure.validate()?;
        self.collector.validate()?;

        let total = self.scoring.weights.total();
        if total > 100 {
            // Still usable: the score is clamped and the unclamped sum reported.
            log::warn!(
                "Detector weights sum to {} (> 100); scores will be clamped",
                total
            );
        }

        let ratio = self.scoring.js_gap_ratio;
        if ratio.is_nan() || ratio < 1.0 {
            return Err(AnalysisError::config("scoring.js_gap_ratio must be >= 1.0"));
        }

        if self.report.top_selectors_per_category == 0 {
            return Err(AnalysisError::config(
                "report.top_selectors_per_category must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Points added by each protection signal when it fires
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalWeights {
    pub cloudflare_challenge: u8,
    pub captcha: u8,
    pub rate_limit: u8,
    pub js_required: u8,
    pub user_agent_sensitive: u8,
    pub cookie_redirect_loop: u8,
}

impl SignalWeights {
    pub fn total(&self) -> u32 {
        [
            self.cloudflare_challenge,
            self.captcha,
            self.rate_limit,
            self.js_required,
            self.user_agent_sensitive,
            self.cookie_redirect_loop,
        ]
        .iter()
        .map(|w| *w as u32)
        .sum()
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            cloudflare_challenge: 25,
            captcha: 30,
            rate_limit: 15,
            js_required: 20,
            user_agent_sensitive: 5,
            cookie_redirect_loop: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: SignalWeights,

    /// Static body length (bytes) below which content is considered thin
    pub content_sufficiency_threshold: usize,

    /// Rendered body must be at least this many times the static one
    pub js_gap_ratio: f64,

    /// User agent signal fires when more than this many probes are refused
    pub user_agent_block_threshold: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            content_sufficiency_threshold: 4096,
            js_gap_ratio: 1.5,
            user_agent_block_threshold: 1,
        }
    }
}

/// Lower bounds of the MEDIUM, HIGH and CRITICAL tiers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TierThresholds {
    pub medium: u8,
    pub high: u8,
    pub critical: u8,
}

impl TierThresholds {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0 < self.medium && self.medium < self.high && self.high < self.critical && self.critical <= 100) {
            return Err(AnalysisError::config(format!(
                "tier thresholds must satisfy 0 < medium < high < critical <= 100 (got {}/{}/{})",
                self.medium, self.high, self.critical
            )));
        }
        Ok(())
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            medium: 40,
            high: 60,
            critical: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Siblings sharing a signature before a node counts as a repeated list
    pub min_repeated_siblings: usize,

    /// Upper sanity bound on elements a selector may match
    pub max_selector_matches: usize,

    /// Minimum weighted score for a zone to be classified
    pub min_zone_score: f64,

    /// Link density at which a region reads as navigation
    pub nav_link_density: f64,
}

impl StructureConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.min_repeated_siblings < 2 {
            return Err(AnalysisError::config("structure.min_repeated_siblings must be >= 2"));
        }
        if self.max_selector_matches < 2 {
            return Err(AnalysisError::config("structure.max_selector_matches must be >= 2"));
        }
        if !(0.0..=1.0).contains(&self.min_zone_score) || !(0.0..=1.0).contains(&self.nav_link_density) {
            return Err(AnalysisError::config(
                "structure.min_zone_score and structure.nav_link_density must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            min_repeated_siblings: 3,
            max_selector_matches: 500,
            min_zone_score: 0.35,
            nav_link_density: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Per-probe timeout in seconds
    pub probe_timeout_secs: u64,

    /// Maximum probes in flight at once
    pub max_concurrency: usize,

    /// Requests sent back to back to look for rate limiting
    pub burst_requests: usize,

    /// Delay between burst requests (requests per second)
    pub burst_rate: f64,

    /// User agents tried against the target
    pub probe_user_agents: Vec<String>,
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.probe_timeout_secs == 0 {
            return Err(AnalysisError::config("collector.probe_timeout_secs must be > 0"));
        }
        if self.max_concurrency == 0 {
            return Err(AnalysisError::config("collector.max_concurrency must be > 0"));
        }
        if self.burst_rate.is_nan() || self.burst_rate <= 0.0 {
            return Err(AnalysisError::config("collector.burst_rate must be > 0"));
        }
        Ok(())
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 15,
            max_concurrency: 4,
            burst_requests: 10,
            burst_rate: 5.0,
            probe_user_agents: crate::utils::PROBE_USER_AGENTS
                .iter()
                .map(|ua| ua.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub top_selectors_per_category: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_selectors_per_category: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AssessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tiers.medium, 40);
        assert_eq!(config.tiers.critical, 80);
        assert_eq!(config.scoring.weights.total(), 100);
    }

    #[test]
    fn test_config_from_toml_partial_override() {
        let raw = r#"
            [scoring.weights]
            captcha = 35

            [tiers]
            medium = 30

            [collector]
            max_concurrency = 2
        "#;

        let config = AssessorConfig::from_toml(raw).unwrap();
        assert_eq!(config.scoring.weights.captcha, 35);
        assert_eq!(config.scoring.weights.cloudflare_challenge, 25);
        assert_eq!(config.tiers.medium, 30);
        assert_eq!(config.tiers.high, 60);
        assert_eq!(config.collector.max_concurrency, 2);
        assert_eq!(config.collector.probe_user_agents.len(), 5);
    }

    #[test]
    fn test_overlapping_tiers_rejected() {
        let raw = r#"
            [tiers]
            medium = 60
            high = 60
        "#;
        assert!(AssessorConfig::from_toml(raw).is_err());

        let tiers = TierThresholds { medium: 0, high: 50, critical: 90 };
        assert!(tiers.validate().is_err());
    }

    #[test]
    fn test_weights_above_hundred_are_allowed() {
        let mut config = AssessorConfig::default();
        config.scoring.weights.captcha = 60;
        assert!(config.scoring.weights.total() > 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nan_ratios_rejected() {
        let mut config = AssessorConfig::default();
        config.scoring.js_gap_ratio = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AssessorConfig::default();
        config.scoring.js_gap_ratio = 0.5;
        assert!(config.validate().is_err());

        let mut config = AssessorConfig::default();
        config.collector.burst_rate = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_structure_bounds() {
        let mut config = AssessorConfig::default();
        config.structure.max_selector_matches = 1;
        assert!(config.validate().is_err());
    }
}
