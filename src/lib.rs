// Site Assessor Library
//
// Scores how strongly a website defends against scraping, maps the layout of
// its pages and proposes content selectors, then folds both into one
// recommendation.

pub mod analyzer;
pub mod collector;
pub mod composer;
pub mod config;
pub mod detectors;
pub mod dom;
pub mod error;
pub mod export;
pub mod keywords;
pub mod observation;
pub mod score;
pub mod structure;
pub mod utils;

// Re-export main types for convenience
pub use analyzer::{AnalysisMode, CancelToken, SiteAnalyzer};
pub use collector::{CookieSession, FetchRequest, FetchResponse, Fetcher, HttpFetcher, ScriptFetcher, SignalCollector};
pub use composer::{AnalysisResult, AnalysisStatus, EffortEstimate, Guidance, Recommendation, RecommendationComposer, Tool};
pub use config::AssessorConfig;
pub use error::{AnalysisError, Diagnostic, DiagnosticKind, FetchError};
pub use export::ExportFormat;
pub use keywords::{ContentCategory, ZoneKind};
pub use observation::{Headers, ObservationBundle, ScriptObservation, UserAgentOutcome};
pub use score::{ComplexityTier, ProtectionAssessment, ProtectionScore, ScoringEngine};
pub use structure::{
    ComplexityFactor, ComplexityLevel, DocumentProfile, DomZone, ParsingComplexity, PerformanceIndicators,
    SelectorCandidate, SelectorSyntax, StructureEngine, StructureReport,
};
