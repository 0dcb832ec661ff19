//! Raw probe results for one analysis run.
//!
//! An [`ObservationBundle`] is assembled once by the collector (or by hand in
//! tests) through [`ObservationBuilder`] and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Response headers with case-insensitive lookup (keys stored lowercase)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value of a header, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.0
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

/// Outcome of fetching the target with one specific user agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAgentOutcome {
    pub user_agent: String,
    /// `None` when the probe timed out or failed at the network level
    pub status: Option<u16>,
    pub body_length: usize,
}

impl UserAgentOutcome {
    pub fn new(user_agent: impl Into<String>, status: Option<u16>, body_length: usize) -> Self {
        Self {
            user_agent: user_agent.into(),
            status,
            body_length,
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self.status, Some(code) if !(200..300).contains(&code))
    }
}

/// What the script-enabled fetch saw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScriptObservation {
    /// No script-capable fetcher is configured
    Unavailable,
    /// The fetcher exists but the render did not complete
    Failed { reason: String },
    Rendered { body: String },
}

impl ScriptObservation {
    pub fn rendered_body(&self) -> Option<&str> {
        match self {
            ScriptObservation::Rendered { body } => Some(body.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationBundle {
    url: String,
    status: Option<u16>,
    headers: Headers,
    body: String,
    elapsed_ms: u64,
    user_agent_outcomes: Vec<UserAgentOutcome>,
    script: ScriptObservation,
    burst_statuses: Vec<u16>,
    cookie_redirect_loop: Option<bool>,
    collected_at: String,
}

impl ObservationBundle {
    pub fn builder(url: impl Into<String>) -> ObservationBuilder {
        ObservationBuilder::new(url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Status of the baseline fetch; `None` if it never completed
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn user_agent_outcomes(&self) -> &[UserAgentOutcome] {
        &self.user_agent_outcomes
    }

    pub fn script(&self) -> &ScriptObservation {
        &self.script
    }

    pub fn script_capable(&self) -> bool {
        !matches!(self.script, ScriptObservation::Unavailable)
    }

    /// Statuses returned by the back-to-back request burst
    pub fn burst_statuses(&self) -> &[u16] {
        &self.burst_statuses
    }

    pub fn cookie_redirect_loop(&self) -> Option<bool> {
        self.cookie_redirect_loop
    }

    pub fn collected_at(&self) -> &str {
        &self.collected_at
    }

    /// Whether the rendered page carried noticeably more content than the static one.
    /// `None` when no render is available.
    pub fn script_added_content(&self, gap_ratio: f64) -> Option<bool> {
        let rendered = self.script.rendered_body()?;
        let static_len = self.body.len() as f64;
        Some(rendered.len() as f64 >= static_len * gap_ratio && rendered.len() > self.body.len())
    }

    /// Markup the structure engine should read: the rendered page when present
    pub fn document_source(&self) -> &str {
        match self.script.rendered_body() {
            Some(rendered) if !rendered.trim().is_empty() => rendered,
            _ => &self.body,
        }
    }
}

pub struct ObservationBuilder {
    bundle: ObservationBundle,
}

impl ObservationBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            bundle: ObservationBundle {
                url: url.into(),
                status: None,
                headers: Headers::new(),
                body: String::new(),
                elapsed_ms: 0,
                user_agent_outcomes: Vec::new(),
                script: ScriptObservation::Unavailable,
                burst_statuses: Vec::new(),
                cookie_redirect_loop: None,
                collected_at: chrono::Local::now().to_rfc3339(),
            },
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.bundle.status = Some(status);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.bundle.headers = headers;
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.bundle.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.bundle.body = body.into();
        self
    }

    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.bundle.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn user_agent_outcome(mut self, outcome: UserAgentOutcome) -> Self {
        self.bundle.user_agent_outcomes.push(outcome);
        self
    }

    pub fn script(mut self, script: ScriptObservation) -> Self {
        self.bundle.script = script;
        self
    }

    pub fn rendered_body(self, body: impl Into<String>) -> Self {
        self.script(ScriptObservation::Rendered { body: body.into() })
    }

    pub fn burst_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.bundle.burst_statuses = statuses;
        self
    }

    pub fn cookie_redirect_loop(mut self, observed: bool) -> Self {
        self.bundle.cookie_redirect_loop = Some(observed);
        self
    }

    pub fn build(self) -> ObservationBundle {
        self.bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive() {
        let headers: Headers = vec![("CF-Ray", "8a1b2c3d"), ("Set-Cookie", "a=1"), ("set-cookie", "b=2")]
            .into_iter()
            .collect();

        assert_eq!(headers.get("cf-ray"), Some("8a1b2c3d"));
        assert_eq!(headers.get("CF-RAY"), Some("8a1b2c3d"));
        assert_eq!(headers.get_all("Set-Cookie").len(), 2);
        assert!(!headers.contains("server"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_user_agent_refusal() {
        assert!(UserAgentOutcome::new("curl/8.4.0", Some(403), 0).is_refused());
        assert!(!UserAgentOutcome::new("curl/8.4.0", Some(200), 10).is_refused());
        assert!(!UserAgentOutcome::new("curl/8.4.0", None, 0).is_refused());
    }

    #[test]
    fn test_script_added_content() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(200)
            .body("a".repeat(1000))
            .rendered_body("b".repeat(4000))
            .build();
        assert_eq!(bundle.script_added_content(1.5), Some(true));
        assert_eq!(bundle.document_source().len(), 4000);

        let static_only = ObservationBundle::builder("https://example.com")
            .status(200)
            .body("a".repeat(1000))
            .build();
        assert_eq!(static_only.script_added_content(1.5), None);
        assert!(!static_only.script_capable());
        assert_eq!(static_only.document_source().len(), 1000);
    }

    #[test]
    fn test_bundle_serializes() {
        let bundle = ObservationBundle::builder("https://example.com")
            .status(429)
            .header("Retry-After", "30")
            .elapsed(Duration::from_millis(120))
            .build();

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["status"], 429);
        assert_eq!(json["elapsed_ms"], 120);
        assert_eq!(json["script"]["state"], "unavailable");
    }
}
