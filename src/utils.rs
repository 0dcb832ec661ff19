use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

use crate::error::AnalysisError;

/// Browser user agents used for the baseline fetch
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

/// User agents tried against the target to see which ones get refused
pub const PROBE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "python-requests/2.31.0",
    "curl/8.4.0",
    "Wget/1.21.4",
    "bot/1.0",
];

pub fn get_random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    let index = rng.random_range(0..USER_AGENTS.len());
    USER_AGENTS[index]
}

/// Paces the request burst used to look for rate limiting
pub struct RateLimiter {
    delay_ms: u64,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        let delay_ms = (1000.0 / requests_per_second) as u64;
        Self { delay_ms }
    }

    pub async fn wait(&self) {
        sleep(Duration::from_millis(self.delay_ms)).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(5.0)
    }
}

/// Validate a user-supplied URL, adding `https://` when the scheme is missing
pub fn normalize_url(raw: &str) -> Result<String, AnalysisError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::InvalidUrl {
            url: raw.to_string(),
            reason: "URL is empty".to_string(),
        });
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme).map_err(|e| AnalysisError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.host_str() {
        Some(host) if host.contains('.') || host == "localhost" => Ok(parsed.to_string()),
        _ => Err(AnalysisError::InvalidUrl {
            url: raw.to_string(),
            reason: "URL has no usable host".to_string(),
        }),
    }
}

/// Whether `candidate` points at the same host as `base`
pub fn is_internal_url(base: &Url, candidate: &str) -> bool {
    match base.join(candidate) {
        Ok(resolved) => resolved.host_str() == base.host_str(),
        Err(_) => false,
    }
}
