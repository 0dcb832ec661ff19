//! Report writers: JSON for tooling, plain text for people.

use anyhow::{Context, Result};
use std::fmt::{self, Write};
use std::path::Path;

use crate::composer::AnalysisResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Text,
}

pub fn render(result: &AnalysisResult, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(result).context("Failed to serialize result"),
        ExportFormat::Text => render_text(result),
    }
}

/// Write the report to `output`, or stdout when no path is given
pub fn write_report(result: &AnalysisResult, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let rendered = render(result, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("Failed to write report to {}", path.display()))?;
            log::info!("💾 Report saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn render_text(result: &AnalysisResult) -> Result<String> {
    let mut out = String::new();
    write_text(&mut out, result).context("Failed to render text report")?;
    Ok(out)
}

fn write_text(out: &mut impl Write, result: &AnalysisResult) -> fmt::Result {
    writeln!(out, "Site assessment: {}", result.url)?;
    writeln!(out, "Run:        {}", result.run_id)?;
    writeln!(out, "Timestamp:  {}", result.timestamp)?;
    writeln!(out, "Mode:       {}", result.mode.as_str())?;
    writeln!(out, "Status:     {}", result.status.as_str())?;

    if let Some(protection) = &result.protection {
        writeln!(out, "\nProtection")?;
        write!(out, "  Score: {}/100 ({})", protection.score.score, protection.tier)?;
        if protection.score.was_clamped() {
            write!(out, " [unclamped {}]", protection.score.unclamped)?;
        }
        writeln!(out)?;
        for contribution in &protection.score.contributions {
            writeln!(out, "  + {}: {}", contribution.signal, contribution.points)?;
        }
    }

    if let Some(profile) = &result.profile {
        writeln!(out, "\nDocument")?;
        if let Some(title) = &profile.title {
            writeln!(out, "  Title: {}", title)?;
        }
        writeln!(
            out,
            "  Elements: {} ({} tags, depth {})",
            profile.total_elements,
            profile.unique_tags.len(),
            profile.max_nesting_depth
        )?;
        writeln!(
            out,
            "  Links: {} internal, {} external",
            profile.internal_links_count, profile.external_links_count
        )?;
        if !profile.frameworks_detected.is_empty() {
            writeln!(out, "  Frameworks: {}", profile.frameworks_detected.join(", "))?;
        }
        writeln!(
            out,
            "  Loading: {} ({:.1}, {} bytes, {} external resources)",
            profile.performance.loading_complexity,
            profile.performance.complexity_score,
            profile.performance.page_size_bytes,
            profile.performance.external_resources
        )?;
        let parsing = &profile.parsing_complexity;
        write!(out, "  Parsing: {} ({})", parsing.level, parsing.score)?;
        if !parsing.factors.is_empty() {
            let codes: Vec<&str> = parsing.factors.iter().map(|f| f.as_str()).collect();
            write!(out, " [{}]", codes.join(", "))?;
        }
        writeln!(out)?;
    }

    if !result.zones.is_empty() {
        writeln!(out, "\nZones")?;
        for zone in &result.zones {
            writeln!(
                out,
                "  {:<10} {}  ({:.2})",
                zone.kind.as_str(),
                zone.locator.css_path,
                zone.confidence
            )?;
        }
    }

    let recommendation = &result.recommendation;
    writeln!(out, "\nRecommendation")?;
    if let Some(tool) = recommendation.tool {
        writeln!(out, "  Tool: {}", tool.as_str())?;
    }
    if let Some(effort) = recommendation.effort {
        writeln!(out, "  Effort: {}", effort)?;
    }
    if !recommendation.guidance.is_empty() {
        let codes: Vec<&str> = recommendation.guidance.iter().map(|g| g.as_str()).collect();
        writeln!(out, "  Guidance: {}", codes.join(", "))?;
    }
    for (category, selectors) in &recommendation.top_selectors {
        for selector in selectors {
            writeln!(
                out,
                "  {:<12} {}  ({:.2}, {} matches)",
                category.as_str(),
                selector.selector,
                selector.confidence,
                selector.match_count
            )?;
        }
    }

    if !result.diagnostics.is_empty() {
        writeln!(out, "\nDiagnostics")?;
        for diagnostic in &result.diagnostics {
            writeln!(
                out,
                "  [{}] {}: {}",
                diagnostic.kind.as_str(),
                diagnostic.source,
                diagnostic.message
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalysisMode, SiteAnalyzer};
    use crate::config::AssessorConfig;
    use crate::observation::ObservationBundle;

    fn sample_result() -> AnalysisResult {
        let bundle = ObservationBundle::builder("https://example.com/")
            .status(429)
            .header("Retry-After", "60")
            .body(r#"<html><head><title>Wait</title></head><body><div class="g-recaptcha"></div></body></html>"#)
            .build();
        SiteAnalyzer::new(AssessorConfig::default())
            .unwrap()
            .analyze_bundle(&bundle, AnalysisMode::Both)
    }

    #[test]
    fn test_render_text() {
        let text = render(&sample_result(), ExportFormat::Text).unwrap();
        assert!(text.contains("Site assessment: https://example.com/"));
        assert!(text.contains("Score: 45/100 (MEDIUM)"));
        assert!(text.contains("+ captcha_detected: 30"));
        assert!(text.contains("Title: Wait"));
        assert!(text.contains("[signal_unknown]"));
        assert!(text.contains("Loading: LOW"));
        assert!(text.contains("Parsing: LOW (0)"));
    }

    /// Sink that refuses every write
    struct FailingSink;

    impl Write for FailingSink {
        fn write_str(&mut self, _: &str) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_write_text_propagates_sink_errors() {
        assert!(write_text(&mut FailingSink, &sample_result()).is_err());
    }

    #[test]
    fn test_render_json() {
        let json = render(&sample_result(), ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["protection"]["score"]["score"], 45);
        assert_eq!(value["status"], "partial");
    }

    #[test]
    fn test_write_report_to_file() {
        let path = std::env::temp_dir().join(format!("site-assessor-{}.json", uuid::Uuid::new_v4()));
        write_report(&sample_result(), ExportFormat::Json, Some(&path)).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"run_id\""));
        std::fs::remove_file(path).unwrap();
    }
}
