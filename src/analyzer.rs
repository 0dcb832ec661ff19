//! One analysis run: validate the URL, collect observations, run the
//! protection and structure engines side by side, compose the result.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::collector::{Fetcher, HttpFetcher, ScriptFetcher, SignalCollector};
use crate::composer::{AnalysisResult, EngineOutputs, RecommendationComposer};
use crate::config::AssessorConfig;
use crate::dom;
use crate::error::AnalysisError;
use crate::observation::ObservationBundle;
use crate::score::{ProtectionAssessment, ScoringEngine};
use crate::structure::{StructureEngine, StructureReport};
use crate::utils::normalize_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Anti-scraping protection only
    Protection,
    /// Document structure and selectors only
    Structure,
    Both,
}

impl AnalysisMode {
    pub fn wants_protection(&self) -> bool {
        matches!(self, AnalysisMode::Protection | AnalysisMode::Both)
    }

    pub fn wants_structure(&self) -> bool {
        matches!(self, AnalysisMode::Structure | AnalysisMode::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Protection => "protection",
            AnalysisMode::Structure => "structure",
            AnalysisMode::Both => "both",
        }
    }
}

/// Caller-held abort switch shared with an in-flight run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct SiteAnalyzer {
    config: AssessorConfig,
    collector: SignalCollector,
    composer: RecommendationComposer,
}

impl SiteAnalyzer {
    /// Analyzer over the reqwest fetcher
    pub fn new(config: AssessorConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.collector.probe_timeout_secs))?;
        Ok(Self::with_fetchers(config, Arc::new(fetcher), None)?)
    }

    pub fn with_fetchers(
        config: AssessorConfig,
        fetcher: Arc<dyn Fetcher>,
        script: Option<Arc<dyn ScriptFetcher>>,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        let collector = SignalCollector::new(fetcher, script, config.collector.clone());
        let composer = RecommendationComposer::new(config.report.top_selectors_per_category);
        Ok(Self {
            config,
            collector,
            composer,
        })
    }

    pub async fn analyze(&self, url: &str, mode: AnalysisMode, cancel: &CancelToken) -> Result<AnalysisResult, AnalysisError> {
        let url = normalize_url(url)?;
        log::info!("🚀 Analysing {} (mode: {})", url, mode.as_str());

        let collection = self.collector.collect(&url, cancel).await?;
        cancel.check()?;

        let bundle = Arc::new(collection.bundle);
        let (protection, structure) = tokio::join!(
            self.run_protection(bundle.clone(), mode, cancel),
            self.run_structure(bundle.clone(), mode, cancel),
        );

        // Cancellation wins over whatever the engines produced
        cancel.check()?;

        let result = self.composer.compose(
            &url,
            mode,
            EngineOutputs {
                protection: protection?,
                structure: structure?,
                diagnostics: collection.diagnostics,
            },
        );

        log::info!(
            "✅ Analysis {} finished: status {}, {} zones, {} selectors",
            result.run_id,
            result.status.as_str(),
            result.zones.len(),
            result.selectors.len()
        );
        Ok(result)
    }

    /// Run both engines over an existing bundle without touching the network
    pub fn analyze_bundle(&self, bundle: &ObservationBundle, mode: AnalysisMode) -> AnalysisResult {
        let protection = mode
            .wants_protection()
            .then(|| self.scoring_engine().assess(bundle));
        let structure = mode.wants_structure().then(|| {
            Self::structure_report(&self.structure_engine(), bundle.document_source(), bundle.url())
        });

        self.composer.compose(
            bundle.url(),
            mode,
            EngineOutputs {
                protection,
                structure,
                diagnostics: Vec::new(),
            },
        )
    }

    fn scoring_engine(&self) -> ScoringEngine {
        ScoringEngine::new(self.config.scoring.clone(), self.config.tiers.clone())
    }

    fn structure_engine(&self) -> StructureEngine {
        StructureEngine::new(self.config.structure.clone())
    }

    async fn run_protection(
        &self,
        bundle: Arc<ObservationBundle>,
        mode: AnalysisMode,
        cancel: &CancelToken,
    ) -> Result<Option<Result<ProtectionAssessment, AnalysisError>>, AnalysisError> {
        if !mode.wants_protection() {
            return Ok(None);
        }
        cancel.check()?;

        let engine = self.scoring_engine();
        let outcome = tokio::task::spawn_blocking(move || engine.assess(&bundle))
            .await
            .unwrap_or_else(|e| Err(AnalysisError::insufficient(format!("protection engine stopped: {}", e))));
        Ok(Some(outcome))
    }

    async fn run_structure(
        &self,
        bundle: Arc<ObservationBundle>,
        mode: AnalysisMode,
        cancel: &CancelToken,
    ) -> Result<Option<StructureReport>, AnalysisError> {
        if !mode.wants_structure() {
            return Ok(None);
        }
        cancel.check()?;

        // The parsed tree is not Send, so parsing happens on the worker
        let engine = self.structure_engine();
        let report = tokio::task::spawn_blocking(move || {
            Self::structure_report(&engine, bundle.document_source(), bundle.url())
        })
        .await
        .unwrap_or_else(|e| StructureReport::without_document(format!("structure engine stopped: {}", e)));
        Ok(Some(report))
    }

    fn structure_report(engine: &StructureEngine, markup: &str, url: &str) -> StructureReport {
        if !dom::has_markup(markup) {
            return StructureReport::without_document("no markup was collected");
        }
        let document = dom::parse_document(markup);
        let base = Url::parse(url).ok();
        engine.analyze_page(&document, base.as_ref())
    }
}
