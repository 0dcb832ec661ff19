//! Network probes that feed the protection and structure engines.
//!
//! All network access goes through [`Fetcher`] so the probe cycle can run
//! against stubs. Rendering is optional: without a [`ScriptFetcher`] the
//! bundle records the capability as unavailable.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

use crate::analyzer::CancelToken;
use crate::config::CollectorConfig;
use crate::error::{AnalysisError, Diagnostic, DiagnosticKind, FetchError};
use crate::observation::{Headers, ObservationBundle, ScriptObservation, UserAgentOutcome};
use crate::utils::{get_random_user_agent, RateLimiter};

/// Most redirects followed before a fetch counts as looping
const MAX_REDIRECTS: usize = 10;

/// A cookie jar scoped to one identity within one run. Requests that carry
/// the same session share cookies; a request without one stores none, not
/// even across its own redirects.
#[derive(Debug, Clone)]
pub struct CookieSession {
    id: Uuid,
    jar: Arc<Jar>,
}

impl CookieSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            jar: Arc::new(Jar::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }
}

impl Default for CookieSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub user_agent: String,
    pub session: Option<CookieSession>,
}

impl FetchRequest {
    /// Request without a cookie jar
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.into(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: CookieSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn keeps_cookies(&self) -> bool {
        self.session.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
    pub elapsed: Duration,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Fetches a page with scripts executed and returns the final markup
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, FetchError>;
}

/// Default [`Fetcher`] on reqwest. Requests with a session get a client
/// bound to that session's jar; the rest share one client that keeps no cookies.
pub struct HttpFetcher {
    request_timeout: Duration,
    cookieless: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let cookieless = Self::client_builder(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            request_timeout,
            cookieless,
        })
    }

    fn client_builder(request_timeout: Duration) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
    }

    fn client_for(&self, request: &FetchRequest) -> Result<reqwest::Client, FetchError> {
        match &request.session {
            Some(session) => Ok(Self::client_builder(self.request_timeout)
                .cookie_provider(session.jar())
                .build()?),
            None => Ok(self.cookieless.clone()),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let start_time = Instant::now();
        let client = self.client_for(request)?;

        let response = client
            .get(&request.url)
            .header(USER_AGENT, &request.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.to_string())))
            .collect();
        let body = response.text().await?;

        Ok(FetchResponse {
            status,
            headers,
            body,
            elapsed: start_time.elapsed(),
        })
    }
}

/// Bundle plus notes about probes that did not complete
#[derive(Debug, Clone)]
pub struct Collection {
    pub bundle: ObservationBundle,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct SignalCollector {
    fetcher: Arc<dyn Fetcher>,
    script: Option<Arc<dyn ScriptFetcher>>,
    config: CollectorConfig,
    semaphore: Arc<Semaphore>,
}

impl SignalCollector {
    pub fn new(fetcher: Arc<dyn Fetcher>, script: Option<Arc<dyn ScriptFetcher>>, config: CollectorConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            fetcher,
            script,
            config,
            semaphore,
        }
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.probe_timeout_secs)
    }

    /// Run the probe cycle. Failed probes are recorded as absent; the only
    /// error is cancellation. Every identity gets its own fresh cookie jar,
    /// so nothing carries over between probes or between runs.
    pub async fn collect(&self, url: &str, cancel: &CancelToken) -> Result<Collection, AnalysisError> {
        cancel.check()?;
        log::info!("🔍 Probing {}", url);

        let mut diagnostics = Vec::new();
        let mut builder = ObservationBundle::builder(url);

        // Baseline fetch with a browser identity
        let browser_agent = get_random_user_agent();
        let base = self
            .probe(FetchRequest::new(url, browser_agent).with_session(CookieSession::new()))
            .await;
        let base_ok = match &base {
            Ok(response) => {
                log::debug!("Baseline: HTTP {} ({} bytes)", response.status, response.body.len());
                builder = builder
                    .status(response.status)
                    .headers(response.headers.clone())
                    .body(response.body.clone())
                    .elapsed(response.elapsed);
                true
            }
            Err(err) => {
                log::warn!("Baseline fetch failed: {}", err);
                diagnostics.push(Self::probe_diagnostic("baseline", err));
                false
            }
        };

        cancel.check()?;

        let (agents, cookie_loop, burst, script) = tokio::join!(
            self.probe_user_agents(url, cancel),
            self.probe_cookie_loop(url, browser_agent, base_ok, cancel),
            self.probe_burst(url, browser_agent, base_ok, cancel),
            self.probe_script(url, cancel),
        );

        cancel.check()?;

        for (outcome, err) in agents {
            if let Some(err) = err {
                diagnostics.push(Self::probe_diagnostic(&format!("user_agent:{}", outcome.user_agent), &err));
            }
            builder = builder.user_agent_outcome(outcome);
        }

        match cookie_loop {
            Ok(Some(looped)) => builder = builder.cookie_redirect_loop(looped),
            Ok(None) => {}
            Err(err) => diagnostics.push(Self::probe_diagnostic("cookie_probe", &err)),
        }

        if !burst.is_empty() {
            builder = builder.burst_statuses(burst);
        }

        if let ScriptObservation::Failed { reason } = &script {
            diagnostics.push(Diagnostic::new(DiagnosticKind::ProbeFailed, "script_render", reason.clone()));
        } else if matches!(script, ScriptObservation::Unavailable) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::CapabilityUnavailable,
                "script_render",
                "no script-capable fetcher configured",
            ));
        }
        builder = builder.script(script);

        let bundle = builder.build();
        log::info!(
            "✅ Probe cycle done: status {:?}, {} UA probes, {} burst responses",
            bundle.status(),
            bundle.user_agent_outcomes().len(),
            bundle.burst_statuses().len()
        );

        Ok(Collection { bundle, diagnostics })
    }

    async fn probe(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::Network("probe pool closed".to_string()))?;

        match timeout(self.probe_timeout(), self.fetcher.fetch(&request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn probe_user_agents(&self, url: &str, cancel: &CancelToken) -> Vec<(UserAgentOutcome, Option<FetchError>)> {
        let probes = self.config.probe_user_agents.iter().map(|agent| async move {
            if cancel.is_cancelled() {
                return (UserAgentOutcome::new(agent.as_str(), None, 0), None);
            }
            let request = FetchRequest::new(url, agent.as_str()).with_session(CookieSession::new());
            match self.probe(request).await {
                Ok(response) => (
                    UserAgentOutcome::new(agent.as_str(), Some(response.status), response.body.len()),
                    None,
                ),
                Err(err) => (UserAgentOutcome::new(agent.as_str(), None, 0), Some(err)),
            }
        });
        join_all(probes).await
    }

    /// Fetch without a cookie jar. A redirect loop that only happens here means
    /// the site bounces clients until they store its cookie.
    async fn probe_cookie_loop(
        &self,
        url: &str,
        user_agent: &str,
        base_ok: bool,
        cancel: &CancelToken,
    ) -> Result<Option<bool>, FetchError> {
        if !base_ok || cancel.is_cancelled() {
            return Ok(None);
        }
        match self.probe(FetchRequest::new(url, user_agent)).await {
            Ok(_) => Ok(Some(false)),
            Err(FetchError::RedirectLoop) => Ok(Some(true)),
            Err(err) => Err(err),
        }
    }

    async fn probe_burst(&self, url: &str, user_agent: &str, base_ok: bool, cancel: &CancelToken) -> Vec<u16> {
        let mut statuses = Vec::new();
        if !base_ok {
            return statuses;
        }

        let limiter = RateLimiter::new(self.config.burst_rate);
        let session = CookieSession::new();
        for i in 0..self.config.burst_requests {
            if cancel.is_cancelled() {
                break;
            }
            if i > 0 {
                limiter.wait().await;
            }
            match self.probe(FetchRequest::new(url, user_agent).with_session(session.clone())).await {
                Ok(response) => {
                    statuses.push(response.status);
                    if response.status == 429 {
                        log::debug!("Burst hit 429 after {} requests", i + 1);
                        break;
                    }
                }
                Err(err) => log::debug!("Burst request {} failed: {}", i + 1, err),
            }
        }
        statuses
    }

    async fn probe_script(&self, url: &str, cancel: &CancelToken) -> ScriptObservation {
        let Some(script) = &self.script else {
            return ScriptObservation::Unavailable;
        };
        if cancel.is_cancelled() {
            return ScriptObservation::Failed {
                reason: "cancelled".to_string(),
            };
        }

        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return ScriptObservation::Failed {
                    reason: "probe pool closed".to_string(),
                }
            }
        };

        match timeout(self.probe_timeout(), script.render(url)).await {
            Ok(Ok(body)) => ScriptObservation::Rendered { body },
            Ok(Err(err)) => ScriptObservation::Failed { reason: err.to_string() },
            Err(_) => ScriptObservation::Failed {
                reason: FetchError::Timeout.to_string(),
            },
        }
    }

    fn probe_diagnostic(source: &str, err: &FetchError) -> Diagnostic {
        let kind = match err {
            FetchError::Timeout => DiagnosticKind::ProbeTimeout,
            _ => DiagnosticKind::ProbeFailed,
        };
        Diagnostic::new(kind, source, err.to_string())
    }
}
