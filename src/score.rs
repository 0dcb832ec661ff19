//! Protection score calculation and tier mapping.

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

use crate::config::{ScoringConfig, TierThresholds};
use crate::detectors::{Detector, DetectorOutcome, DETECTORS};
use crate::error::{AnalysisError, Diagnostic, DiagnosticKind, DetectorError};
use crate::observation::ObservationBundle;

/// Discrete summary of defense strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl ComplexityTier {
    /// Map a score onto the tier whose half-open range contains it.
    /// `[0, medium)`, `[medium, high)`, `[high, critical)`, `[critical, 100]`
    pub fn from_score(score: u8, thresholds: &TierThresholds) -> Self {
        if score >= thresholds.critical {
            ComplexityTier::Critical
        } else if score >= thresholds.high {
            ComplexityTier::High
        } else if score >= thresholds.medium {
            ComplexityTier::Medium
        } else {
            ComplexityTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Low => "LOW",
            ComplexityTier::Medium => "MEDIUM",
            ComplexityTier::High => "HIGH",
            ComplexityTier::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    Fired,
    Quiet,
    Unknown,
    Failed,
}

/// How one detector ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub signal: String,
    pub state: SignalState,
    pub points: u8,
    pub detail: Option<String>,
}

/// Points a fired signal added to the score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub signal: String,
    pub points: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionScore {
    /// Clamped to [0, 100]
    pub score: u8,
    /// Sum before clamping; differs from `score` only when weights exceed 100
    pub unclamped: u32,
    /// Fired signals in detector order
    pub contributions: Vec<SignalContribution>,
    pub signals: Vec<SignalReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ProtectionScore {
    /// Points added by a signal (0 if it did not fire)
    pub fn contribution_of(&self, signal: &str) -> u8 {
        self.contributions
            .iter()
            .find(|c| c.signal == signal)
            .map(|c| c.points)
            .unwrap_or(0)
    }

    pub fn was_clamped(&self) -> bool {
        self.unclamped > self.score as u32
    }

    /// True when some detector could not give a definite answer
    pub fn is_partial(&self) -> bool {
        self.signals
            .iter()
            .any(|s| matches!(s.state, SignalState::Unknown | SignalState::Failed))
    }
}

/// Protection score plus the tier derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionAssessment {
    pub score: ProtectionScore,
    pub tier: ComplexityTier,
}

pub struct ScoringEngine {
    config: ScoringConfig,
    thresholds: TierThresholds,
    detectors: Vec<Detector>,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig, thresholds: TierThresholds) -> Self {
        Self::with_detectors(config, thresholds, DETECTORS.to_vec())
    }

    /// Build an engine over a custom detector set
    pub fn with_detectors(config: ScoringConfig, thresholds: TierThresholds, detectors: Vec<Detector>) -> Self {
        Self {
            config,
            thresholds,
            detectors,
        }
    }

    /// Score a bundle. Fails only when the bundle carries no usable probe.
    pub fn score(&self, bundle: &ObservationBundle) -> Result<ProtectionScore, AnalysisError> {
        Self::check_sufficient(bundle)?;

        let mut unclamped: u32 = 0;
        let mut contributions = Vec::new();
        let mut signals = Vec::with_capacity(self.detectors.len());
        let mut diagnostics = Vec::new();

        for detector in &self.detectors {
            let name = detector.name();
            let report = match Self::run_isolated(detector, bundle, &self.config) {
                Ok(DetectorOutcome::Fired { reason }) => {
                    let points = detector.signal.weight(&self.config);
                    unclamped += points as u32;
                    contributions.push(SignalContribution {
                        signal: name.to_string(),
                        points,
                    });
                    log::debug!("Signal {} fired (+{}): {}", name, points, reason);
                    SignalReport {
                        signal: name.to_string(),
                        state: SignalState::Fired,
                        points,
                        detail: Some(reason),
                    }
                }
                Ok(DetectorOutcome::Quiet) => SignalReport {
                    signal: name.to_string(),
                    state: SignalState::Quiet,
                    points: 0,
                    detail: None,
                },
                Ok(DetectorOutcome::Unknown { reason }) => {
                    diagnostics.push(Diagnostic::new(DiagnosticKind::SignalUnknown, name, reason.clone()));
                    SignalReport {
                        signal: name.to_string(),
                        state: SignalState::Unknown,
                        points: 0,
                        detail: Some(reason),
                    }
                }
                Err(err) => {
                    log::warn!("Detector {} failed: {}", name, err);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::PartialDetectorFailure,
                        name,
                        err.to_string(),
                    ));
                    SignalReport {
                        signal: name.to_string(),
                        state: SignalState::Failed,
                        points: 0,
                        detail: Some(err.to_string()),
                    }
                }
            };
            signals.push(report);
        }

        let score = unclamped.min(100) as u8;
        if unclamped > 100 {
            log::info!("Protection score clamped from {} to 100", unclamped);
        }

        Ok(ProtectionScore {
            score,
            unclamped,
            contributions,
            signals,
            diagnostics,
        })
    }

    /// Score and map onto a tier in one step
    pub fn assess(&self, bundle: &ObservationBundle) -> Result<ProtectionAssessment, AnalysisError> {
        let score = self.score(bundle)?;
        let tier = ComplexityTier::from_score(score.score, &self.thresholds);
        Ok(ProtectionAssessment { score, tier })
    }

    pub fn tier_for(&self, score: u8) -> ComplexityTier {
        ComplexityTier::from_score(score, &self.thresholds)
    }

    fn check_sufficient(bundle: &ObservationBundle) -> Result<(), AnalysisError> {
        if bundle.status().is_none() {
            return Err(AnalysisError::insufficient("baseline request did not complete"));
        }

        let has_render = bundle
            .script()
            .rendered_body()
            .map(|b| !b.trim().is_empty())
            .unwrap_or(false);
        if bundle.body().is_empty() && !has_render {
            return Err(AnalysisError::insufficient(
                "empty response body and no script-enabled fetch",
            ));
        }

        Ok(())
    }

    fn run_isolated(
        detector: &Detector,
        bundle: &ObservationBundle,
        config: &ScoringConfig,
    ) -> Result<DetectorOutcome, DetectorError> {
        let detect = detector.detect;
        match panic::catch_unwind(AssertUnwindSafe(|| detect(bundle, config))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(DetectorError::Panicked(message))
            }
        }
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default(), TierThresholds::default())
    }
}
