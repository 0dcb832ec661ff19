//! Protection signal detectors.
//!
//! Each detector is a named pure function over an [`ObservationBundle`]. The
//! registered set lives in [`DETECTORS`], evaluated in table order.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::config::ScoringConfig;
use crate::error::DetectorError;
use crate::observation::ObservationBundle;

/// Body markers served by Cloudflare interstitial and challenge pages.
static CLOUDFLARE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(checking your browser|cf-browser-verification|cf-challenge|challenge-platform|cf_chl_opt|just a moment\.\.\.|cloudflare ray id)",
    )
    .unwrap()
});

/// Markup and script tokens of the common CAPTCHA providers.
static CAPTCHA_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(g-recaptcha|recaptcha/api|grecaptcha|h-captcha|hcaptcha\.com|cf-turnstile|geetest|captcha-delivery|verify you are human|solve the puzzle)",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionSignal {
    CloudflareChallengePresent,
    CaptchaDetected,
    RateLimited,
    RequiresJsForContent,
    UserAgentSensitive,
    CookieRedirectLoop,
}

impl ProtectionSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionSignal::CloudflareChallengePresent => "cloudflare_challenge_present",
            ProtectionSignal::CaptchaDetected => "captcha_detected",
            ProtectionSignal::RateLimited => "rate_limited",
            ProtectionSignal::RequiresJsForContent => "requires_js_for_content",
            ProtectionSignal::UserAgentSensitive => "user_agent_sensitive",
            ProtectionSignal::CookieRedirectLoop => "cookie_redirect_loop",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            ProtectionSignal::CloudflareChallengePresent,
            ProtectionSignal::CaptchaDetected,
            ProtectionSignal::RateLimited,
            ProtectionSignal::RequiresJsForContent,
            ProtectionSignal::UserAgentSensitive,
            ProtectionSignal::CookieRedirectLoop,
        ]
        .into_iter()
        .find(|signal| signal.as_str() == name)
    }

    /// Points this signal adds when it fires
    pub fn weight(&self, config: &ScoringConfig) -> u8 {
        let w = &config.weights;
        match self {
            ProtectionSignal::CloudflareChallengePresent => w.cloudflare_challenge,
            ProtectionSignal::CaptchaDetected => w.captcha,
            ProtectionSignal::RateLimited => w.rate_limit,
            ProtectionSignal::RequiresJsForContent => w.js_required,
            ProtectionSignal::UserAgentSensitive => w.user_agent_sensitive,
            ProtectionSignal::CookieRedirectLoop => w.cookie_redirect_loop,
        }
    }
}

/// Result of one detector
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutcome {
    Fired { reason: String },
    Quiet,
    /// Required observation is missing
    Unknown { reason: String },
}

pub type DetectorFn = fn(&ObservationBundle, &ScoringConfig) -> Result<DetectorOutcome, DetectorError>;

#[derive(Clone, Copy)]
pub struct Detector {
    pub signal: ProtectionSignal,
    pub detect: DetectorFn,
}

impl Detector {
    pub const fn new(signal: ProtectionSignal, detect: DetectorFn) -> Self {
        Self { signal, detect }
    }

    pub fn name(&self) -> &'static str {
        self.signal.as_str()
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector").field("signal", &self.signal).finish()
    }
}

/// The registered detector set, in evaluation order.
pub static DETECTORS: &[Detector] = &[
    Detector::new(ProtectionSignal::CloudflareChallengePresent, detect_cloudflare_challenge),
    Detector::new(ProtectionSignal::CaptchaDetected, detect_captcha),
    Detector::new(ProtectionSignal::RateLimited, detect_rate_limit),
    Detector::new(ProtectionSignal::RequiresJsForContent, detect_js_required),
    Detector::new(ProtectionSignal::UserAgentSensitive, detect_user_agent_sensitivity),
    Detector::new(ProtectionSignal::CookieRedirectLoop, detect_cookie_redirect_loop),
];

pub fn detect_cloudflare_challenge(
    bundle: &ObservationBundle,
    _config: &ScoringConfig,
) -> Result<DetectorOutcome, DetectorError> {
    let headers = bundle.headers();

    if let Some(mitigated) = headers.get("cf-mitigated") {
        if mitigated.eq_ignore_ascii_case("challenge") {
            return Ok(DetectorOutcome::Fired {
                reason: "cf-mitigated: challenge header".to_string(),
            });
        }
    }

    // A plain cf-ray only means the site sits behind the CDN
    let sources = [Some(bundle.body()), bundle.script().rendered_body()];
    for source in sources.into_iter().flatten() {
        if let Some(found) = CLOUDFLARE_MARKERS.find(source) {
            return Ok(DetectorOutcome::Fired {
                reason: format!("challenge marker '{}' in body", found.as_str()),
            });
        }
    }

    Ok(DetectorOutcome::Quiet)
}

pub fn detect_captcha(
    bundle: &ObservationBundle,
    _config: &ScoringConfig,
) -> Result<DetectorOutcome, DetectorError> {
    let sources = [Some(bundle.body()), bundle.script().rendered_body()];
    for source in sources.into_iter().flatten() {
        if let Some(found) = CAPTCHA_MARKERS.find(source) {
            return Ok(DetectorOutcome::Fired {
                reason: format!("captcha token '{}'", found.as_str()),
            });
        }
    }
    Ok(DetectorOutcome::Quiet)
}

pub fn detect_rate_limit(
    bundle: &ObservationBundle,
    _config: &ScoringConfig,
) -> Result<DetectorOutcome, DetectorError> {
    let headers = bundle.headers();

    if let Some(remaining) = headers.get("x-ratelimit-remaining") {
        let parsed: i64 = remaining.trim().parse().map_err(|_| DetectorError::Malformed {
            field: "x-ratelimit-remaining".to_string(),
            value: remaining.to_string(),
        })?;
        if parsed <= 0 {
            return Ok(DetectorOutcome::Fired {
                reason: "rate limit budget exhausted (x-ratelimit-remaining)".to_string(),
            });
        }
    }

    if bundle.status() == Some(429) {
        return Ok(DetectorOutcome::Fired {
            reason: "baseline request answered 429".to_string(),
        });
    }

    if matches!(bundle.status(), Some(503)) && headers.contains("retry-after") {
        return Ok(DetectorOutcome::Fired {
            reason: "503 with retry-after".to_string(),
        });
    }

    let ua_429 = bundle
        .user_agent_outcomes()
        .iter()
        .filter(|o| o.status == Some(429))
        .count();
    if ua_429 > 0 {
        return Ok(DetectorOutcome::Fired {
            reason: format!("{} user agent probe(s) answered 429", ua_429),
        });
    }

    let burst_blocked = bundle.burst_statuses().iter().filter(|s| **s == 429).count();
    if burst_blocked > 0 {
        return Ok(DetectorOutcome::Fired {
            reason: format!(
                "{} of {} burst requests answered 429",
                burst_blocked,
                bundle.burst_statuses().len()
            ),
        });
    }

    Ok(DetectorOutcome::Quiet)
}

pub fn detect_js_required(
    bundle: &ObservationBundle,
    config: &ScoringConfig,
) -> Result<DetectorOutcome, DetectorError> {
    let Some(added) = bundle.script_added_content(config.js_gap_ratio) else {
        return Ok(DetectorOutcome::Unknown {
            reason: "script-enabled fetch unavailable".to_string(),
        });
    };

    let static_len = bundle.body().len();
    if added && static_len < config.content_sufficiency_threshold {
        let rendered_len = bundle.script().rendered_body().map(str::len).unwrap_or(0);
        return Ok(DetectorOutcome::Fired {
            reason: format!(
                "static body {} bytes, rendered body {} bytes",
                static_len, rendered_len
            ),
        });
    }

    Ok(DetectorOutcome::Quiet)
}

pub fn detect_user_agent_sensitivity(
    bundle: &ObservationBundle,
    config: &ScoringConfig,
) -> Result<DetectorOutcome, DetectorError> {
    // Timed-out probes say nothing about the user agent policy
    let completed: Vec<_> = bundle
        .user_agent_outcomes()
        .iter()
        .filter(|o| o.status.is_some())
        .collect();

    if completed.is_empty() {
        return Ok(DetectorOutcome::Unknown {
            reason: "no user agent probe completed".to_string(),
        });
    }

    let refused = completed.iter().filter(|o| o.is_refused()).count();
    if refused > config.user_agent_block_threshold {
        return Ok(DetectorOutcome::Fired {
            reason: format!("{} of {} user agents refused", refused, completed.len()),
        });
    }

    Ok(DetectorOutcome::Quiet)
}

pub fn detect_cookie_redirect_loop(
    bundle: &ObservationBundle,
    _config: &ScoringConfig,
) -> Result<DetectorOutcome, DetectorError> {
    match bundle.cookie_redirect_loop() {
        Some(true) => Ok(DetectorOutcome::Fired {
            reason: "cookie-less request looped through redirects".to_string(),
        }),
        Some(false) => Ok(DetectorOutcome::Quiet),
        None => Ok(DetectorOutcome::Unknown {
            reason: "cookie-less probe did not complete".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::UserAgentOutcome;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    fn page(body: &str) -> ObservationBundle {
        ObservationBundle::builder("https://example.com").status(200).body(body).build()
    }

    #[test]
    fn test_detector_table_is_complete_and_ordered() {
        let names: Vec<_> = DETECTORS.iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec![
                "cloudflare_challenge_present",
                "captcha_detected",
                "rate_limited",
                "requires_js_for_content",
                "user_agent_sensitive",
                "cookie_redirect_loop",
            ]
        );
    }

    #[test]
    fn test_cloudflare_marker_in_body() {
        let bundle = page("<title>Just a moment...</title><div id=\"cf-challenge-running\"></div>");
        let outcome = detect_cloudflare_challenge(&bundle, &config()).unwrap();
        assert!(matches!(outcome, DetectorOutcome::Fired { .. }));
    }

    #[test]
    fn test_cloudflare_cdn_alone_does_not_fire() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(200)
            .header("Server", "cloudflare")
            .header("CF-Ray", "8a1b2c3d4e-AMS")
            .body("<html><body><p>Hello</p></body></html>")
            .build();
        assert_eq!(detect_cloudflare_challenge(&bundle, &config()).unwrap(), DetectorOutcome::Quiet);
    }

    #[test]
    fn test_cloudflare_mitigated_header() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(403)
            .header("cf-mitigated", "challenge")
            .build();
        assert!(matches!(
            detect_cloudflare_challenge(&bundle, &config()).unwrap(),
            DetectorOutcome::Fired { .. }
        ));
    }

    #[test]
    fn test_captcha_detected() {
        let bundle = page(r#"<div class="g-recaptcha" data-sitekey="abc"></div>"#);
        assert!(matches!(detect_captcha(&bundle, &config()).unwrap(), DetectorOutcome::Fired { .. }));
        assert_eq!(detect_captcha(&page("<p>no challenge</p>"), &config()).unwrap(), DetectorOutcome::Quiet);
    }

    #[test]
    fn test_rate_limit_from_user_agent_probes() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(200)
            .body("ok")
            .user_agent_outcome(UserAgentOutcome::new("curl/8.4.0", Some(429), 0))
            .build();
        assert!(matches!(detect_rate_limit(&bundle, &config()).unwrap(), DetectorOutcome::Fired { .. }));
    }

    #[test]
    fn test_rate_limit_from_burst_and_header() {
        let burst = ObservationBundle::builder("https://example.com")
            .status(200)
            .burst_statuses(vec![200, 200, 429, 429])
            .build();
        assert!(matches!(detect_rate_limit(&burst, &config()).unwrap(), DetectorOutcome::Fired { .. }));

        let header = ObservationBundle::builder("https://example.com")
            .status(200)
            .header("X-RateLimit-Remaining", "0")
            .build();
        assert!(matches!(detect_rate_limit(&header, &config()).unwrap(), DetectorOutcome::Fired { .. }));

        let budget_left = ObservationBundle::builder("https://example.com")
            .status(200)
            .header("X-RateLimit-Remaining", "57")
            .build();
        assert_eq!(detect_rate_limit(&budget_left, &config()).unwrap(), DetectorOutcome::Quiet);
    }

    #[test]
    fn test_rate_limit_malformed_header_errors() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(200)
            .header("X-RateLimit-Remaining", "plenty")
            .build();
        let err = detect_rate_limit(&bundle, &config()).unwrap_err();
        assert!(matches!(err, DetectorError::Malformed { .. }));
    }

    #[test]
    fn test_js_required_unknown_without_render() {
        let outcome = detect_js_required(&page("<div id=\"root\"></div>"), &config()).unwrap();
        assert!(matches!(outcome, DetectorOutcome::Unknown { .. }));
    }

    #[test]
    fn test_js_required_no_meaningful_gap() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(200)
            .body("x".repeat(5000))
            .rendered_body("x".repeat(5050))
            .build();
        assert_eq!(detect_js_required(&bundle, &config()).unwrap(), DetectorOutcome::Quiet);
    }

    #[test]
    fn test_js_required_fires_on_thin_shell() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(200)
            .body("<div id=\"root\"></div>")
            .rendered_body("y".repeat(20_000))
            .build();
        assert!(matches!(detect_js_required(&bundle, &config()).unwrap(), DetectorOutcome::Fired { .. }));
    }

    #[test]
    fn test_user_agent_sensitivity_threshold() {
        let mut builder = ObservationBundle::builder("https://example.com").status(200);
        for (ua, status) in [("a", 200), ("b", 403), ("c", 403), ("d", 200)] {
            builder = builder.user_agent_outcome(UserAgentOutcome::new(ua, Some(status), 10));
        }
        let bundle = builder.build();
        assert!(matches!(
            detect_user_agent_sensitivity(&bundle, &config()).unwrap(),
            DetectorOutcome::Fired { .. }
        ));

        let single = ObservationBundle::builder("https://example.com")
            .status(200)
            .user_agent_outcome(UserAgentOutcome::new("a", Some(200), 10))
            .user_agent_outcome(UserAgentOutcome::new("b", Some(403), 0))
            .user_agent_outcome(UserAgentOutcome::new("c", None, 0))
            .build();
        assert_eq!(detect_user_agent_sensitivity(&single, &config()).unwrap(), DetectorOutcome::Quiet);
    }

    #[test]
    fn test_cookie_loop_states() {
        let unknown = page("x");
        assert!(matches!(
            detect_cookie_redirect_loop(&unknown, &config()).unwrap(),
            DetectorOutcome::Unknown { .. }
        ));

        let looped = ObservationBundle::builder("https://example.com")
            .status(200)
            .cookie_redirect_loop(true)
            .build();
        assert!(matches!(
            detect_cookie_redirect_loop(&looped, &config()).unwrap(),
            DetectorOutcome::Fired { .. }
        ));
    }
}
