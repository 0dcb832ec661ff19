//! Merges the protection and structure assessments into one result.
//!
//! Everything here is a lookup over what the engines already decided: tool
//! and effort come from the tier, guidance from the tier and the fired
//! signals, selectors are the engine's own ranking cut to the top N.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::analyzer::AnalysisMode;
use crate::detectors::ProtectionSignal;
use crate::error::{AnalysisError, Diagnostic};
use crate::keywords::ContentCategory;
use crate::score::{ComplexityTier, ProtectionAssessment};
use crate::structure::{DocumentProfile, DomZone, SelectorCandidate, StructureReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    HttpClient,
    HttpClientWithRotatingIdentity,
    BrowserAutomation,
    BrowserAutomationWithProxies,
}

impl Tool {
    pub fn for_tier(tier: ComplexityTier) -> Self {
        match tier {
            ComplexityTier::Low => Tool::HttpClient,
            ComplexityTier::Medium => Tool::HttpClientWithRotatingIdentity,
            ComplexityTier::High => Tool::BrowserAutomation,
            ComplexityTier::Critical => Tool::BrowserAutomationWithProxies,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::HttpClient => "http_client",
            Tool::HttpClientWithRotatingIdentity => "http_client_with_rotating_identity",
            Tool::BrowserAutomation => "browser_automation",
            Tool::BrowserAutomationWithProxies => "browser_automation_with_proxies",
        }
    }
}

/// Advice codes; front-ends map them to their own wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guidance {
    AddUserAgentHeaders,
    ThrottleRequests,
    RotateUserAgents,
    UseHeadlessBrowser,
    RotateProxiesAndUserAgents,
    UseCaptchaSolvingService,
    PersistCookies,
    ExpectManualIntervention,
    UseProvidedSelectors,
    AutomatePagination,
}

impl Guidance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Guidance::AddUserAgentHeaders => "add_user_agent_headers",
            Guidance::ThrottleRequests => "throttle_requests",
            Guidance::RotateUserAgents => "rotate_user_agents",
            Guidance::UseHeadlessBrowser => "use_headless_browser",
            Guidance::RotateProxiesAndUserAgents => "rotate_proxies_and_user_agents",
            Guidance::UseCaptchaSolvingService => "use_captcha_solving_service",
            Guidance::PersistCookies => "persist_cookies",
            Guidance::ExpectManualIntervention => "expect_manual_intervention",
            Guidance::UseProvidedSelectors => "use_provided_selectors",
            Guidance::AutomatePagination => "automate_pagination",
        }
    }
}

/// Working days to build a scraper; `max_days` is open-ended for the hardest tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortEstimate {
    pub min_days: u32,
    pub max_days: Option<u32>,
}

impl EffortEstimate {
    pub fn for_tier(tier: ComplexityTier) -> Self {
        let (min_days, max_days) = match tier {
            ComplexityTier::Low => (1, Some(2)),
            ComplexityTier::Medium => (3, Some(5)),
            ComplexityTier::High => (7, Some(14)),
            ComplexityTier::Critical => (14, None),
        };
        Self { min_days, max_days }
    }
}

impl fmt::Display for EffortEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_days {
            Some(max) => write!(f, "{}-{} days", self.min_days, max),
            None => write!(f, "{}+ days", self.min_days),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Absent when protection was not assessed
    pub tool: Option<Tool>,
    pub guidance: Vec<Guidance>,
    pub effort: Option<EffortEstimate>,
    pub top_selectors: BTreeMap<ContentCategory, Vec<SelectorCandidate>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Complete,
    Partial,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Complete => "complete",
            AnalysisStatus::Partial => "partial",
            AnalysisStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: String,
    pub url: String,
    pub mode: AnalysisMode,
    pub timestamp: String,
    pub status: AnalysisStatus,
    pub protection: Option<ProtectionAssessment>,
    pub zones: Vec<DomZone>,
    pub selectors: Vec<SelectorCandidate>,
    pub profile: Option<DocumentProfile>,
    pub recommendation: Recommendation,
    pub diagnostics: Vec<Diagnostic>,
}

/// Engine outputs for one run; `None` means the engine was not requested
pub struct EngineOutputs {
    pub protection: Option<Result<ProtectionAssessment, AnalysisError>>,
    pub structure: Option<StructureReport>,
    /// Notes gathered before the engines ran (probe failures and the like)
    pub diagnostics: Vec<Diagnostic>,
}

pub struct RecommendationComposer {
    top_selectors_per_category: usize,
}

impl Default for RecommendationComposer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RecommendationComposer {
    pub fn new(top_selectors_per_category: usize) -> Self {
        Self {
            top_selectors_per_category: top_selectors_per_category.max(1),
        }
    }

    pub fn compose(&self, url: &str, mode: AnalysisMode, outputs: EngineOutputs) -> AnalysisResult {
        let EngineOutputs {
            protection,
            structure,
            mut diagnostics,
        } = outputs;

        let mut requested = 0;
        let mut usable = 0;
        let mut degraded = false;

        let protection = match protection {
            Some(Ok(assessment)) => {
                requested += 1;
                usable += 1;
                degraded |= assessment.score.is_partial();
                diagnostics.extend(assessment.score.diagnostics.iter().cloned());
                Some(assessment)
            }
            Some(Err(err)) => {
                requested += 1;
                diagnostics.push(Diagnostic::from_error("protection", &err));
                None
            }
            None => None,
        };

        let (zones, selectors, profile) = match structure {
            Some(report) => {
                requested += 1;
                if report.is_usable() {
                    usable += 1;
                }
                degraded |= !report.diagnostics.is_empty();
                diagnostics.extend(report.diagnostics);
                (report.zones, report.selectors, report.profile)
            }
            None => (Vec::new(), Vec::new(), None),
        };

        let status = if requested == 0 || usable == 0 {
            AnalysisStatus::Failed
        } else if usable < requested || degraded {
            AnalysisStatus::Partial
        } else {
            AnalysisStatus::Complete
        };

        let recommendation = self.recommend(protection.as_ref(), &selectors);

        AnalysisResult {
            run_id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            mode,
            timestamp: chrono::Local::now().to_rfc3339(),
            status,
            protection,
            zones,
            selectors,
            profile,
            recommendation,
            diagnostics,
        }
    }

    fn recommend(&self, protection: Option<&ProtectionAssessment>, selectors: &[SelectorCandidate]) -> Recommendation {
        let mut guidance = Vec::new();
        let mut add = |code: Guidance| {
            if !guidance.contains(&code) {
                guidance.push(code);
            }
        };

        let (tool, effort) = match protection {
            Some(assessment) => {
                for code in Self::tier_guidance(assessment.tier) {
                    add(*code);
                }

                // Fired signals call for their own countermeasure regardless of tier
                for contribution in &assessment.score.contributions {
                    let code = match ProtectionSignal::from_name(&contribution.signal) {
                        Some(ProtectionSignal::RateLimited) => Guidance::ThrottleRequests,
                        Some(ProtectionSignal::CaptchaDetected) => Guidance::UseCaptchaSolvingService,
                        Some(ProtectionSignal::RequiresJsForContent) => Guidance::UseHeadlessBrowser,
                        Some(ProtectionSignal::CloudflareChallengePresent) => Guidance::UseHeadlessBrowser,
                        Some(ProtectionSignal::UserAgentSensitive) => Guidance::RotateUserAgents,
                        Some(ProtectionSignal::CookieRedirectLoop) => Guidance::PersistCookies,
                        None => continue,
                    };
                    add(code);
                }

                (Some(Tool::for_tier(assessment.tier)), Some(EffortEstimate::for_tier(assessment.tier)))
            }
            None => (None, None),
        };

        if !selectors.is_empty() {
            add(Guidance::UseProvidedSelectors);
        }
        if selectors.iter().any(|s| s.category == ContentCategory::Pagination) {
            add(Guidance::AutomatePagination);
        }

        let mut top_selectors: BTreeMap<ContentCategory, Vec<SelectorCandidate>> = BTreeMap::new();
        for candidate in selectors {
            let bucket = top_selectors.entry(candidate.category).or_default();
            if bucket.len() < self.top_selectors_per_category {
                bucket.push(candidate.clone());
            }
        }

        Recommendation {
            tool,
            guidance,
            effort,
            top_selectors,
        }
    }

    fn tier_guidance(tier: ComplexityTier) -> &'static [Guidance] {
        match tier {
            ComplexityTier::Low => &[Guidance::AddUserAgentHeaders],
            ComplexityTier::Medium => &[
                Guidance::AddUserAgentHeaders,
                Guidance::RotateUserAgents,
                Guidance::ThrottleRequests,
            ],
            ComplexityTier::High => &[
                Guidance::UseHeadlessBrowser,
                Guidance::RotateProxiesAndUserAgents,
                Guidance::ThrottleRequests,
            ],
            ComplexityTier::Critical => &[
                Guidance::UseHeadlessBrowser,
                Guidance::RotateProxiesAndUserAgents,
                Guidance::UseCaptchaSolvingService,
                Guidance::ExpectManualIntervention,
            ],
        }
    }
}
