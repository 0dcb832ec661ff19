use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use url::Url;

use crate::config::StructureConfig;
use crate::error::{AnalysisError, Diagnostic};
use crate::keywords::{self, ContentCategory, ZoneKind, KEYWORD_TABLE_VERSION};
use crate::utils::is_internal_url;

static CHARSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)charset=([^;\s]+)").unwrap());

/// Elements that never form a zone or carry content selectors
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "path", "link", "meta", "br", "hr", "head", "title",
];

const FORM_CONTROLS: &[&str] = &["input", "select", "textarea", "button"];

const SEMANTIC_TAGS: &[&str] = &["article", "section", "nav", "header", "footer", "main", "aside", "figure"];

const FRAMEWORK_MARKERS: &[(&str, &[&str])] = &[
    ("jquery", &["jquery"]),
    ("react", &["react-dom", "data-reactroot", "react.production"]),
    ("vue", &["vue.js", "vue.min.js", "data-v-"]),
    ("angular", &["ng-version", "angular.js", "angular.min.js"]),
    ("bootstrap", &["bootstrap"]),
    ("next.js", &["__next_data__", "/_next/"]),
    ("nuxt", &["__nuxt__", "/_nuxt/"]),
];

/// Read-only pointer to a node of the analysed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLocator {
    pub tag: String,
    pub css_path: String,
    pub xpath: String,
    /// Position of the element in document order
    pub document_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomZone {
    pub kind: ZoneKind,
    pub locator: NodeLocator,
    pub confidence: f64,
    /// Size of the largest group of look-alike children
    pub repeated_items: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorSyntax {
    Css,
    Xpath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub category: ContentCategory,
    pub selector: String,
    pub syntax: SelectorSyntax,
    pub confidence: f64,
    pub match_count: usize,
}

/// Page-level facts gathered while walking the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentProfile {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub language: Option<String>,
    pub charset: Option<String>,
    pub total_elements: usize,
    pub unique_tags: Vec<String>,
    pub classes_count: usize,
    pub ids_count: usize,
    pub max_nesting_depth: usize,
    pub semantic_tags_found: Vec<String>,
    pub links_count: usize,
    pub internal_links_count: usize,
    pub external_links_count: usize,
    pub forms_count: usize,
    pub images_count: usize,
    pub scripts_count: usize,
    pub external_scripts_count: usize,
    pub inline_scripts_count: usize,
    pub stylesheets_count: usize,
    pub frameworks_detected: Vec<String>,
    /// Elements whose attribute tokens fall in each content category
    pub category_counts: BTreeMap<String, usize>,
    pub performance: PerformanceIndicators,
    pub parsing_complexity: ParsingComplexity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplexityLevel {
    #[default]
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Low => "LOW",
            ComplexityLevel::Medium => "MEDIUM",
            ComplexityLevel::High => "HIGH",
            ComplexityLevel::VeryHigh => "VERY_HIGH",
        }
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How heavy the page is to download and render
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceIndicators {
    pub page_size_bytes: usize,
    pub images_count: usize,
    pub scripts_count: usize,
    pub stylesheets_count: usize,
    /// `img`, `script` and `link` elements pointing at absolute URLs
    pub external_resources: usize,
    /// 0-100, one decimal
    pub complexity_score: f64,
    pub loading_complexity: ComplexityLevel,
}

impl PerformanceIndicators {
    fn measure(
        page_size_bytes: usize,
        images_count: usize,
        scripts_count: usize,
        stylesheets_count: usize,
        external_resources: usize,
    ) -> Self {
        let raw = (page_size_bytes as f64 / 1000.0).min(100.0)
            + (images_count as f64 * 2.0).min(50.0)
            + (scripts_count as f64 * 3.0).min(50.0)
            + (external_resources as f64).min(50.0);
        // The capped terms add up to at most 250
        let complexity_score = (raw / 2.5 * 10.0).round() / 10.0;

        let loading_complexity = if complexity_score > 70.0 {
            ComplexityLevel::High
        } else if complexity_score > 40.0 {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        };

        Self {
            page_size_bytes,
            images_count,
            scripts_count,
            stylesheets_count,
            external_resources,
            complexity_score,
            loading_complexity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityFactor {
    ManyScripts,
    SeveralScripts,
    FrameworksDetected,
    ManyForms,
    HighLoadingComplexity,
    DeepNesting,
}

impl ComplexityFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityFactor::ManyScripts => "many_scripts",
            ComplexityFactor::SeveralScripts => "several_scripts",
            ComplexityFactor::FrameworksDetected => "frameworks_detected",
            ComplexityFactor::ManyForms => "many_forms",
            ComplexityFactor::HighLoadingComplexity => "high_loading_complexity",
            ComplexityFactor::DeepNesting => "deep_nesting",
        }
    }
}

/// Effort estimate for writing a parser against this page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingComplexity {
    pub score: u32,
    pub level: ComplexityLevel,
    pub factors: Vec<ComplexityFactor>,
}

impl ParsingComplexity {
    fn evaluate(profile: &DocumentProfile) -> Self {
        let mut score = 0;
        let mut factors = Vec::new();
        let mut add = |points: u32, factor: ComplexityFactor| {
            score += points;
            factors.push(factor);
        };

        if profile.scripts_count > 10 {
            add(30, ComplexityFactor::ManyScripts);
        } else if profile.scripts_count > 5 {
            add(15, ComplexityFactor::SeveralScripts);
        }
        if !profile.frameworks_detected.is_empty() {
            add(25, ComplexityFactor::FrameworksDetected);
        }
        if profile.forms_count > 3 {
            // Several forms usually means logins stand in the way
            add(15, ComplexityFactor::ManyForms);
        }
        if profile.performance.loading_complexity == ComplexityLevel::High {
            add(20, ComplexityFactor::HighLoadingComplexity);
        }
        if profile.max_nesting_depth > 15 {
            add(10, ComplexityFactor::DeepNesting);
        }

        let level = match score {
            70.. => ComplexityLevel::VeryHigh,
            50..=69 => ComplexityLevel::High,
            30..=49 => ComplexityLevel::Medium,
            _ => ComplexityLevel::Low,
        };
        Self { score, level, factors }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub zones: Vec<DomZone>,
    pub selectors: Vec<SelectorCandidate>,
    pub profile: Option<DocumentProfile>,
    pub diagnostics: Vec<Diagnostic>,
    pub keyword_table_version: u32,
}

impl StructureReport {
    fn unusable(err: AnalysisError) -> Self {
        log::warn!("Structure analysis skipped: {}", err);
        Self {
            zones: Vec::new(),
            selectors: Vec::new(),
            profile: None,
            diagnostics: vec![Diagnostic::from_error("structure", &err)],
            keyword_table_version: KEYWORD_TABLE_VERSION,
        }
    }

    /// Report for a run whose markup never arrived
    pub fn without_document(reason: impl Into<String>) -> Self {
        Self::unusable(AnalysisError::unparsable(reason))
    }

    /// False when the document could not be analysed at all
    pub fn is_usable(&self) -> bool {
        self.profile.is_some()
    }

    pub fn selectors_for(&self, category: ContentCategory) -> impl Iterator<Item = &SelectorCandidate> {
        self.selectors.iter().filter(move |s| s.category == category)
    }
}

#[derive(Debug, Clone, Copy)]
enum Specificity {
    Attribute,
    Id,
    Positional,
}

impl Specificity {
    fn weight(self) -> f64 {
        match self {
            Specificity::Attribute => 0.7,
            Specificity::Id => 0.6,
            Specificity::Positional => 0.3,
        }
    }
}

/// One element in document order. Only the last path step is stored; full
/// paths are joined on demand through the parent chain.
struct IndexedNode<'a> {
    element: ElementRef<'a>,
    tag: String,
    css_step: String,
    xpath_step: String,
    depth: usize,
    parent: Option<usize>,
    in_body: bool,
}

/// A child waiting on the indexing stack
struct PendingNode<'a> {
    element: ElementRef<'a>,
    parent: usize,
    css_step: String,
    xpath_step: String,
}

struct ZoneFeatures {
    tokens: Vec<String>,
    role: Option<String>,
    repeated: usize,
    repeated_signature: Option<(String, String)>,
    repeated_tokens: Vec<String>,
    link_count: usize,
    link_density: f64,
    controls: usize,
    paragraphs: usize,
    text_length: usize,
}

struct ZoneMatch {
    index: usize,
    zone: DomZone,
    repeated_signature: Option<(String, String)>,
}

/// Counts selector matches against one document, caching by selector text
struct MatchCounter<'a> {
    document: &'a Html,
    cache: BTreeMap<String, Option<usize>>,
}

impl<'a> MatchCounter<'a> {
    fn new(document: &'a Html) -> Self {
        Self {
            document,
            cache: BTreeMap::new(),
        }
    }

    fn count(&mut self, css: &str) -> Option<usize> {
        if let Some(cached) = self.cache.get(css) {
            return *cached;
        }
        let count = Selector::parse(css).ok().map(|s| self.document.select(&s).count());
        self.cache.insert(css.to_string(), count);
        count
    }
}

/// Classifies document zones and proposes selectors per content category
pub struct StructureEngine {
    config: StructureConfig,
}

impl Default for StructureEngine {
    fn default() -> Self {
        Self::new(StructureConfig::default())
    }
}

impl StructureEngine {
    pub fn new(config: StructureConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, document: &Html) -> StructureReport {
        self.analyze_page(document, None)
    }

    /// Analyse a document; `base_url` lets the profile split internal and external links
    pub fn analyze_page(&self, document: &Html, base_url: Option<&Url>) -> StructureReport {
        let start_time = std::time::Instant::now();
        let nodes = self.index_document(document);

        let Some(body_index) = nodes.iter().position(|n| n.tag == "body") else {
            return StructureReport::unusable(AnalysisError::unparsable("document has no body"));
        };

        let body = nodes[body_index].element;
        let has_children = body.children().any(|c| ElementRef::wrap(c).is_some());
        let has_text = body.text().any(|t| !t.trim().is_empty());
        if !has_children && !has_text {
            return StructureReport::unusable(AnalysisError::unparsable("document body is empty"));
        }

        let zone_matches = self.classify_zones(&nodes);

        let mut counter = MatchCounter::new(document);
        let selectors = self.generate_selectors(&nodes, &zone_matches, &mut counter);

        let profile = self.build_profile(document, &nodes, base_url);

        log::info!(
            "Structure analysis: {} elements, {} zones, {} selector candidates in {} ms",
            nodes.len(),
            zone_matches.len(),
            selectors.len(),
            start_time.elapsed().as_millis()
        );

        StructureReport {
            zones: zone_matches.into_iter().map(|m| m.zone).collect(),
            selectors,
            profile: Some(profile),
            diagnostics: Vec::new(),
            keyword_table_version: KEYWORD_TABLE_VERSION,
        }
    }

    fn index_document<'a>(&self, document: &'a Html) -> Vec<IndexedNode<'a>> {
        let root = document.root_element();
        let tag = root.value().name().to_string();
        let mut nodes = vec![IndexedNode {
            element: root,
            css_step: tag.clone(),
            xpath_step: tag.clone(),
            in_body: tag == "body",
            tag,
            depth: 0,
            parent: None,
        }];

        // Explicit stack; markup can nest thousands of levels deep
        let mut pending = Vec::new();
        Self::push_children(root, 0, &mut pending);
        while let Some(next) = pending.pop() {
            let parent = &nodes[next.parent];
            let tag = next.element.value().name().to_string();
            let node = IndexedNode {
                element: next.element,
                css_step: next.css_step,
                xpath_step: next.xpath_step,
                depth: parent.depth + 1,
                parent: Some(next.parent),
                in_body: parent.in_body || tag == "body",
                tag,
            };
            nodes.push(node);
            Self::push_children(next.element, nodes.len() - 1, &mut pending);
        }
        nodes
    }

    /// Queue the element children of `element` so they pop in document order
    fn push_children<'a>(element: ElementRef<'a>, parent_index: usize, pending: &mut Vec<PendingNode<'a>>) {
        let children: Vec<ElementRef<'a>> = element.children().filter_map(ElementRef::wrap).collect();

        let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
        for child in &children {
            *totals.entry(child.value().name()).or_default() += 1;
        }

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        let mut queued = Vec::with_capacity(children.len());
        for child in children {
            let name = child.value().name();
            let position = {
                let entry = seen.entry(name).or_default();
                *entry += 1;
                *entry
            };

            let css_step = if name == "body" || name == "head" {
                name.to_string()
            } else {
                format!("{}:nth-of-type({})", name, position)
            };
            let xpath_step = if totals.get(name).copied().unwrap_or(0) > 1 {
                format!("{}[{}]", name, position)
            } else {
                name.to_string()
            };

            queued.push(PendingNode {
                element: child,
                parent: parent_index,
                css_step,
                xpath_step,
            });
        }
        pending.extend(queued.into_iter().rev());
    }

    fn classify_zones(&self, nodes: &[IndexedNode<'_>]) -> Vec<ZoneMatch> {
        let mut found: Vec<ZoneMatch> = Vec::new();
        let mut found_at: Vec<Option<usize>> = vec![None; nodes.len()];

        for (index, node) in nodes.iter().enumerate() {
            if !node.in_body || SKIPPED_TAGS.contains(&node.tag.as_str()) {
                continue;
            }

            let features = self.calculate_features(node.element);
            let (kind, confidence) = self.pick_zone(&node.tag, &features);
            if kind == ZoneKind::Unknown {
                continue;
            }

            found_at[index] = Some(found.len());
            found.push(ZoneMatch {
                index,
                zone: DomZone {
                    kind,
                    locator: locator(nodes, index),
                    confidence,
                    repeated_items: features.repeated,
                },
                repeated_signature: features.repeated_signature,
            });
        }

        // A zone inside another of the same kind adds nothing, except that
        // nested listings keep whichever one groups more items
        let mut keep = vec![true; found.len()];
        for (position, inner) in found.iter().enumerate() {
            let kind = inner.zone.kind;
            let mut ancestor = nodes[inner.index].parent;
            while let Some(a) = ancestor {
                if let Some(outer) = found_at[a].filter(|&o| found[o].zone.kind == kind) {
                    if kind == ZoneKind::Listing && found[outer].zone.repeated_items < inner.zone.repeated_items {
                        keep[outer] = false;
                    } else {
                        keep[position] = false;
                    }
                }
                ancestor = nodes[a].parent;
            }
        }

        found
            .into_iter()
            .zip(keep)
            .filter_map(|(zone_match, kept)| kept.then_some(zone_match))
            .collect()
    }

    fn calculate_features(&self, element: ElementRef) -> ZoneFeatures {
        let tokens = Self::element_tokens(element);
        let role = element.value().attr("role").map(|r| r.trim().to_ascii_lowercase());

        // Group children by (tag, class) to find repeated item patterns
        let mut groups: BTreeMap<(String, String), Vec<ElementRef>> = BTreeMap::new();
        for child in element.children().filter_map(ElementRef::wrap) {
            let tag = child.value().name().to_string();
            if SKIPPED_TAGS.contains(&tag.as_str()) {
                continue;
            }
            let class = child.value().attr("class").unwrap_or("").trim().to_string();
            groups.entry((tag, class)).or_default().push(child);
        }

        let mut repeated = 0;
        let mut repeated_signature = None;
        for (signature, items) in &groups {
            if items.len() > repeated && look_alike(&signature.1, items) {
                repeated = items.len();
                repeated_signature = Some(signature.clone());
            }
        }
        let repeated_tokens = repeated_signature
            .as_ref()
            .map(|(_, class)| keywords::tokenize(class))
            .unwrap_or_default();

        let text_length: usize = element.text().map(|t| t.trim().len()).sum();

        let mut link_count = 0;
        let mut link_text = 0;
        let mut controls = 0;
        let mut paragraphs = 0;
        for descendant in element.descendants().filter_map(ElementRef::wrap) {
            let name = descendant.value().name();
            if name == "a" {
                link_count += 1;
                link_text += descendant.text().map(|t| t.trim().len()).sum::<usize>();
            } else if name == "p" {
                paragraphs += 1;
            } else if FORM_CONTROLS.contains(&name) {
                controls += 1;
            }
        }

        let link_density = if text_length > 0 {
            (link_text as f64 / text_length as f64).min(1.0)
        } else if link_count > 0 {
            1.0
        } else {
            0.0
        };

        ZoneFeatures {
            tokens,
            role,
            repeated,
            repeated_signature,
            repeated_tokens,
            link_count,
            link_density,
            controls,
            paragraphs,
            text_length,
        }
    }

    /// Weighted score per zone kind; the best wins only when it clears the
    /// minimum and strictly beats the runner-up.
    fn pick_zone(&self, tag: &str, f: &ZoneFeatures) -> (ZoneKind, f64) {
        let role = f.role.as_deref();
        let min_repeat = self.config.min_repeated_siblings;
        let linky = f.link_count >= 3 && f.link_density >= self.config.nav_link_density;
        let repeated_items_listed = keywords::zone_hits(ZoneKind::Listing, &f.repeated_tokens) > 0;

        let mut navigation = 0.0;
        if tag == "nav" || role == Some("navigation") {
            navigation += 0.5;
        }
        if keywords::zone_hits(ZoneKind::Navigation, &f.tokens) > 0 {
            navigation += 0.3;
        }
        if linky {
            navigation += 0.2;
            if f.repeated >= min_repeat {
                navigation += 0.1;
            }
        }

        let mut listing: f64 = 0.0;
        if f.repeated >= min_repeat {
            listing += 0.5;
            if repeated_items_listed {
                listing += 0.2;
            }
        }
        if keywords::zone_hits(ZoneKind::Listing, &f.tokens) > 0 {
            listing += 0.3;
        }
        if linky && !repeated_items_listed {
            listing -= 0.2;
        }

        let mut detail = 0.0;
        if tag == "article" || tag == "main" || role == Some("main") || role == Some("article") {
            detail += 0.4;
        }
        if keywords::zone_hits(ZoneKind::Detail, &f.tokens) > 0 {
            detail += 0.3;
        }
        if f.paragraphs >= 3 && f.link_density < 0.3 {
            detail += 0.2;
        }
        if f.text_length >= 500 {
            detail += 0.1;
        }

        let mut form = 0.0;
        if tag == "form" || role == Some("search") {
            form += 0.5;
        }
        if f.controls >= 2 {
            form += 0.3;
        } else if f.controls == 1 {
            form += 0.2;
        }
        if keywords::zone_hits(ZoneKind::Form, &f.tokens) > 0 {
            form += 0.2;
        }

        let mut scored = [
            (ZoneKind::Navigation, clamp_unit(navigation)),
            (ZoneKind::Listing, clamp_unit(listing)),
            (ZoneKind::Detail, clamp_unit(detail)),
            (ZoneKind::Form, clamp_unit(form)),
        ];
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (best_kind, best) = scored[0];
        let second = scored[1].1;

        // Ties fall back to unknown: a missed zone is cheaper than a wrong one
        if best < self.config.min_zone_score || best - second < 1e-9 {
            return (ZoneKind::Unknown, 0.0);
        }

        let confidence = round3(clamp_unit((best + (best - second)) / 2.0));
        (best_kind, confidence)
    }

    fn generate_selectors(
        &self,
        nodes: &[IndexedNode<'_>],
        zones: &[ZoneMatch],
        counter: &mut MatchCounter<'_>,
    ) -> Vec<SelectorCandidate> {
        let total = nodes.len();
        let mut seen: BTreeSet<(ContentCategory, String)> = BTreeSet::new();
        let mut candidates = Vec::new();

        for zone_match in zones {
            let root = &nodes[zone_match.index];
            let root_css = css_path(nodes, zone_match.index);
            let root_xpath = xpath(nodes, zone_match.index);
            let expected = if zone_match.zone.kind == ZoneKind::Listing {
                zone_match.zone.repeated_items.max(1)
            } else {
                1
            };

            // True when the candidate passed the sanity checks, even if already listed
            let mut push = |category: ContentCategory,
                            selector: String,
                            syntax: SelectorSyntax,
                            specificity: Specificity,
                            count: Option<usize>| {
                match self.build_candidate(category, selector, syntax, specificity, count, expected, total) {
                    Some(candidate) => {
                        if seen.insert((candidate.category, candidate.selector.clone())) {
                            candidates.push(candidate);
                        }
                        true
                    }
                    None => false,
                }
            };

            // The zone container itself
            let zone_category = match zone_match.zone.kind {
                ZoneKind::Navigation => ContentCategory::Navigation,
                ZoneKind::Listing => ContentCategory::Products,
                ZoneKind::Detail => ContentCategory::Articles,
                ZoneKind::Form => ContentCategory::Forms,
                ZoneKind::Unknown => continue,
            };
            if let Some(id) = root.element.value().id().filter(|id| is_safe_ident(id)) {
                let css = format!("#{}", id);
                let count = counter.count(&css);
                push(zone_category, css, SelectorSyntax::Css, Specificity::Id, count);
            }
            let count = counter.count(&root_css);
            push(zone_category, root_xpath.clone(), SelectorSyntax::Xpath, Specificity::Positional, count);

            // Repeated items of a listing
            if let Some((tag, class)) = &zone_match.repeated_signature {
                if zone_match.zone.kind == ZoneKind::Listing {
                    let mut classes: Vec<&str> = class.split_whitespace().filter(|c| is_safe_ident(c)).collect();
                    classes.sort_unstable();
                    if let Some(first) = classes.first() {
                        let category = keywords::category_for(&keywords::tokenize(first)).unwrap_or(ContentCategory::Products);
                        let css = format!("[class*=\"{}\"]", first);
                        let count = counter.count(&css);
                        push(category, css, SelectorSyntax::Css, Specificity::Attribute, count);
                    } else {
                        let count = counter.count(&format!("{} > {}", root_css, tag));
                        push(
                            ContentCategory::Products,
                            format!("{}/{}", root_xpath, tag),
                            SelectorSyntax::Xpath,
                            Specificity::Positional,
                            count,
                        );
                    }
                }
            }

            // Keyword-bearing elements inside the zone, in document order
            let end = subtree_end(nodes, zone_match.index);
            for index in zone_match.index + 1..end {
                let node = &nodes[index];
                if SKIPPED_TAGS.contains(&node.tag.as_str()) {
                    continue;
                }
                let value = node.element.value();
                let mut element_category = None;
                let mut covered = false;

                let mut classes: Vec<&str> = value.classes().filter(|c| is_safe_ident(c)).collect();
                classes.sort_unstable();
                classes.dedup();
                for class in classes {
                    if let Some(category) = keywords::category_for(&keywords::tokenize(class)) {
                        element_category.get_or_insert(category);
                        let css = format!("[class*=\"{}\"]", class);
                        let count = counter.count(&css);
                        covered |= push(category, css, SelectorSyntax::Css, Specificity::Attribute, count);
                    }
                }

                let mut data_attrs: Vec<&str> = value
                    .attrs()
                    .map(|(name, _)| name)
                    .filter(|name| name.starts_with("data-") && is_safe_ident(name))
                    .collect();
                data_attrs.sort_unstable();
                for name in data_attrs {
                    let suffix = &name["data-".len()..];
                    if let Some(category) = keywords::category_for(&keywords::tokenize(suffix)) {
                        element_category.get_or_insert(category);
                        let css = format!("[{}]", name);
                        let count = counter.count(&css);
                        covered |= push(category, css, SelectorSyntax::Css, Specificity::Attribute, count);
                    }
                }

                let id = value.id().filter(|id| is_safe_ident(id));
                if element_category.is_none() {
                    element_category = id.and_then(|id| keywords::category_for(&keywords::tokenize(id)));
                }

                let Some(category) = element_category else {
                    continue;
                };

                if let Some(id) = id {
                    let css = format!("#{}", id);
                    let count = counter.count(&css);
                    covered |= push(category, css, SelectorSyntax::Css, Specificity::Id, count);
                }

                if covered {
                    continue;
                }

                // Tag path from the zone root without positions, shared by
                // look-alike items
                let steps = relative_steps(nodes, zone_match.index, index);
                let count = counter.count(&format!("{} > {}", root_css, steps.join(" > ")));
                push(
                    category,
                    format!("{}/{}", root_xpath, steps.join("/")),
                    SelectorSyntax::Xpath,
                    Specificity::Positional,
                    count,
                );
            }
        }

        rank_candidates(&mut candidates);
        candidates
    }

    #[allow(clippy::too_many_arguments)]
    fn build_candidate(
        &self,
        category: ContentCategory,
        selector: String,
        syntax: SelectorSyntax,
        specificity: Specificity,
        count: Option<usize>,
        expected: usize,
        total_elements: usize,
    ) -> Option<SelectorCandidate> {
        let count = count?;

        // Degenerate selectors: nothing, the whole page, or past the sanity bound
        if count == 0 || count >= total_elements || count > self.config.max_selector_matches {
            return None;
        }
        match specificity {
            Specificity::Attribute if count < 2 => return None,
            Specificity::Id if count != 1 => return None,
            _ => {}
        }

        let plausibility = count.min(expected) as f64 / count.max(expected) as f64;
        let confidence = round3(specificity.weight() * (0.5 + 0.5 * plausibility));

        Some(SelectorCandidate {
            category,
            selector,
            syntax,
            confidence,
            match_count: count,
        })
    }

    fn element_tokens(element: ElementRef) -> Vec<String> {
        let value = element.value();
        let mut tokens = Vec::new();
        if let Some(class) = value.attr("class") {
            tokens.extend(keywords::tokenize(class));
        }
        if let Some(id) = value.attr("id") {
            tokens.extend(keywords::tokenize(id));
        }
        for (name, _) in value.attrs() {
            if let Some(rest) = name.strip_prefix("data-") {
                tokens.extend(keywords::tokenize(rest));
            }
        }
        tokens
    }

    fn build_profile(&self, document: &Html, nodes: &[IndexedNode<'_>], base_url: Option<&Url>) -> DocumentProfile {
        let mut profile = DocumentProfile {
            total_elements: nodes.len(),
            ..Default::default()
        };

        let mut tags = BTreeSet::new();
        let mut classes = BTreeSet::new();
        let mut ids = BTreeSet::new();
        let mut external_resources = 0;

        for node in nodes {
            let value = node.element.value();
            tags.insert(node.tag.clone());
            classes.extend(value.classes().map(|c| c.to_string()));
            if let Some(id) = value.id() {
                ids.insert(id.to_string());
            }
            profile.max_nesting_depth = profile.max_nesting_depth.max(node.depth);

            match node.tag.as_str() {
                "title" if profile.title.is_none() => {
                    let text: String = node.element.text().collect();
                    let text = text.trim();
                    if !text.is_empty() {
                        profile.title = Some(text.to_string());
                    }
                }
                "html" => {
                    profile.language = value.attr("lang").map(|l| l.to_string());
                }
                "meta" => {
                    if value.attr("name").is_some_and(|n| n.eq_ignore_ascii_case("description")) {
                        profile.meta_description = value.attr("content").map(|c| c.trim().to_string());
                    }
                    if profile.charset.is_none() {
                        if let Some(charset) = value.attr("charset") {
                            profile.charset = Some(charset.trim().to_string());
                        } else if value.attr("http-equiv").is_some_and(|h| h.eq_ignore_ascii_case("content-type")) {
                            profile.charset = value
                                .attr("content")
                                .and_then(|c| CHARSET_PATTERN.captures(c))
                                .map(|caps| caps[1].to_string());
                        }
                    }
                }
                "a" => {
                    let href = value
                        .attr("href")
                        .map(str::trim)
                        .filter(|h| !(h.is_empty() || h.starts_with('#') || h.starts_with("javascript:")));
                    if let Some(href) = href {
                        profile.links_count += 1;
                        let internal = match base_url {
                            Some(base) => is_internal_url(base, href),
                            None => !(href.starts_with("http://") || href.starts_with("https://") || href.starts_with("//")),
                        };
                        if internal {
                            profile.internal_links_count += 1;
                        } else {
                            profile.external_links_count += 1;
                        }
                    }
                }
                "form" => profile.forms_count += 1,
                "img" => {
                    profile.images_count += 1;
                    external_resources += usize::from(is_external_reference(value));
                }
                "script" => {
                    external_resources += usize::from(is_external_reference(value));
                    profile.scripts_count += 1;
                    if value.attr("src").is_some() {
                        profile.external_scripts_count += 1;
                    } else if node.element.text().any(|t| !t.trim().is_empty()) {
                        profile.inline_scripts_count += 1;
                    }
                }
                "link" => {
                    external_resources += usize::from(is_external_reference(value));
                    if value.attr("rel").is_some_and(|r| r.eq_ignore_ascii_case("stylesheet")) {
                        profile.stylesheets_count += 1;
                    }
                }
                _ => {}
            }

            if node.in_body && !SKIPPED_TAGS.contains(&node.tag.as_str()) {
                let tokens = Self::element_tokens(node.element);
                if let Some(category) = keywords::category_for(&tokens) {
                    *profile.category_counts.entry(category.as_str().to_string()).or_default() += 1;
                }
            }
        }

        profile.semantic_tags_found = SEMANTIC_TAGS
            .iter()
            .filter(|t| tags.contains(**t))
            .map(|t| t.to_string())
            .collect();
        profile.unique_tags = tags.into_iter().collect();
        profile.classes_count = classes.len();
        profile.ids_count = ids.len();

        let markup = document.html();
        let lowered = markup.to_lowercase();
        profile.frameworks_detected = FRAMEWORK_MARKERS
            .iter()
            .filter(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
            .map(|(name, _)| name.to_string())
            .collect();

        profile.performance = PerformanceIndicators::measure(
            markup.len(),
            profile.images_count,
            profile.scripts_count,
            profile.stylesheets_count,
            external_resources,
        );
        profile.parsing_complexity = ParsingComplexity::evaluate(&profile);

        profile
    }
}

fn ancestry<'n, 'a>(nodes: &'n [IndexedNode<'a>], index: usize) -> impl Iterator<Item = &'n IndexedNode<'a>> {
    std::iter::successors(Some(index), move |&i| nodes[i].parent).map(move |i| &nodes[i])
}

fn css_path(nodes: &[IndexedNode<'_>], index: usize) -> String {
    let mut steps: Vec<&str> = ancestry(nodes, index).map(|n| n.css_step.as_str()).collect();
    steps.reverse();
    steps.join(" > ")
}

fn xpath(nodes: &[IndexedNode<'_>], index: usize) -> String {
    let mut steps: Vec<&str> = ancestry(nodes, index).map(|n| n.xpath_step.as_str()).collect();
    steps.reverse();
    format!("/{}", steps.join("/"))
}

fn locator(nodes: &[IndexedNode<'_>], index: usize) -> NodeLocator {
    NodeLocator {
        tag: nodes[index].tag.clone(),
        css_path: css_path(nodes, index),
        xpath: xpath(nodes, index),
        document_index: index,
    }
}

/// Tags from just below `root` down to `index`
fn relative_steps<'n>(nodes: &'n [IndexedNode<'_>], root: usize, index: usize) -> Vec<&'n str> {
    let mut steps: Vec<&str> = std::iter::successors(Some(index), |&i| nodes[i].parent)
        .take_while(|&i| i != root)
        .map(|i| nodes[i].tag.as_str())
        .collect();
    steps.reverse();
    steps
}

/// Same-tag siblings count as items when they share a class or all have the
/// same non-empty sequence of child tags
fn look_alike(class: &str, items: &[ElementRef<'_>]) -> bool {
    if !class.is_empty() {
        return true;
    }
    let Some((first, rest)) = items.split_first() else {
        return false;
    };
    let shape = child_shape(*first);
    !shape.is_empty() && rest.iter().all(|item| child_shape(*item) == shape)
}

fn child_shape<'a>(element: ElementRef<'a>) -> Vec<&'a str> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .map(|child| child.value().name())
        .filter(|name| !SKIPPED_TAGS.contains(name))
        .collect()
}

/// Exclusive end of the pre-order subtree rooted at `index`
fn subtree_end(nodes: &[IndexedNode<'_>], index: usize) -> usize {
    let depth = nodes[index].depth;
    nodes[index + 1..]
        .iter()
        .position(|n| n.depth <= depth)
        .map(|offset| index + 1 + offset)
        .unwrap_or(nodes.len())
}

/// Best first; equal confidence prefers the shorter selector
fn rank_candidates(candidates: &mut [SelectorCandidate]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.selector.len().cmp(&b.selector.len()))
            .then_with(|| a.selector.cmp(&b.selector))
            .then_with(|| a.category.cmp(&b.category))
    });
}

/// `src`, or `href` when there is no `src`, pointing at an absolute URL
fn is_external_reference(value: &scraper::node::Element) -> bool {
    value
        .attr("src")
        .filter(|src| !src.is_empty())
        .or_else(|| value.attr("href"))
        .is_some_and(|target| target.starts_with("http") || target.starts_with("//"))
}

fn is_safe_ident(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    fn product_listing_html() -> String {
        let cards: String = (1..=20)
            .map(|i| {
                format!(
                    r#"<div class="product-card"><h3 class="product-title">Item {i}</h3><span class="price">${i}.99</span></div>"#
                )
            })
            .collect();
        format!(
            r#"<!DOCTYPE html>
            <html lang="en">
                <head>
                    <meta charset="utf-8">
                    <title>Shop</title>
                    <meta name="description" content="All products">
                    <script src="/static/jquery.min.js"></script>
                </head>
                <body>
                    <header>
                        <nav class="main-nav"><a href="/">Home</a><a href="/shop">Shop</a><a href="https://blog.example.org/">Blog</a></nav>
                    </header>
                    <div class="catalog">{cards}</div>
                </body>
            </html>"#
        )
    }

    fn analyze(html: &str) -> StructureReport {
        let document = parse_document(html);
        StructureEngine::default().analyze(&document)
    }

    #[test]
    fn test_product_listing_zone_and_selector() {
        let report = analyze(&product_listing_html());

        let listing = report
            .zones
            .iter()
            .find(|z| z.kind == ZoneKind::Listing)
            .expect("listing zone");
        assert_eq!(listing.repeated_items, 20);
        assert_eq!(listing.locator.tag, "div");
        assert_eq!(listing.locator.css_path, "html > body > div:nth-of-type(1)");

        let cards = report
            .selectors_for(ContentCategory::Products)
            .find(|s| s.selector == "[class*=\"product-card\"]")
            .expect("product-card selector");
        assert_eq!(cards.match_count, 20);
        assert_eq!(cards.syntax, SelectorSyntax::Css);

        for single in report.selectors.iter().filter(|s| s.match_count == 1) {
            assert!(cards.confidence > single.confidence, "{} outranks the card selector", single.selector);
        }

        let prices = report.selectors_for(ContentCategory::Prices).next().expect("price selector");
        assert_eq!(prices.selector, "[class*=\"price\"]");
        assert_eq!(prices.match_count, 20);

        let titles = report.selectors_for(ContentCategory::Titles).next().expect("title selector");
        assert_eq!(titles.selector, "[class*=\"product-title\"]");
    }

    #[test]
    fn test_navigation_zone() {
        let report = analyze(&product_listing_html());
        let nav = report.zones.iter().find(|z| z.kind == ZoneKind::Navigation).expect("nav zone");
        assert_eq!(nav.locator.tag, "nav");
        assert!(nav.confidence > 0.5);
    }

    #[test]
    fn test_selector_sanity_bounds() {
        let report = analyze(&product_listing_html());
        let total = report.profile.as_ref().unwrap().total_elements;
        assert!(!report.selectors.is_empty());
        for candidate in &report.selectors {
            assert!(candidate.match_count > 0);
            assert!(candidate.match_count < total);
            assert!((0.0..=1.0).contains(&candidate.confidence));
        }
    }

    #[test]
    fn test_ranking_order() {
        let report = analyze(&product_listing_html());
        for pair in report.selectors.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.confidence > b.confidence
                    || (a.confidence == b.confidence && a.selector.len() <= b.selector.len())
            );
        }
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let html = product_listing_html();
        let document = parse_document(&html);
        let engine = StructureEngine::default();
        let first = engine.analyze(&document);
        let second = engine.analyze(&document);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_document_yields_diagnostic() {
        let report = analyze("");
        assert!(report.zones.is_empty());
        assert!(report.selectors.is_empty());
        assert!(!report.is_usable());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, crate::error::DiagnosticKind::UnparsableDocument);
    }

    #[test]
    fn test_ambiguous_region_stays_unknown() {
        // Plain repeated links: as much a menu as a list
        let html = r#"<html><body><div><ul>
            <li><a href="/a">A</a></li><li><a href="/b">B</a></li>
            <li><a href="/c">C</a></li><li><a href="/d">D</a></li>
        </ul></div></body></html>"#;
        let report = analyze(html);
        assert!(report.zones.iter().all(|z| z.kind != ZoneKind::Listing));
    }

    #[test]
    fn test_form_and_article_zones() {
        let html = r#"<html><body>
            <form id="search-form" action="/search"><input name="q"><button>Go</button></form>
            <article>
                <h1>Story</h1>
                <p>First paragraph of the story with enough words to count.</p>
                <p>Second paragraph keeps going with more text.</p>
                <p>Third paragraph wraps it up.</p>
            </article>
        </body></html>"#;
        let report = analyze(html);

        let form = report.zones.iter().find(|z| z.kind == ZoneKind::Form).expect("form zone");
        assert_eq!(form.locator.tag, "form");
        assert!(report.zones.iter().any(|z| z.kind == ZoneKind::Detail && z.locator.tag == "article"));

        let form_selector = report.selectors_for(ContentCategory::Forms).next().expect("form selector");
        assert_eq!(form_selector.selector, "#search-form");
        assert_eq!(form_selector.match_count, 1);
    }

    #[test]
    fn test_document_profile() {
        let document = parse_document(&product_listing_html());
        let base = Url::parse("https://shop.example.com/").unwrap();
        let report = StructureEngine::default().analyze_page(&document, Some(&base));
        let profile = report.profile.unwrap();

        assert_eq!(profile.title.as_deref(), Some("Shop"));
        assert_eq!(profile.meta_description.as_deref(), Some("All products"));
        assert_eq!(profile.language.as_deref(), Some("en"));
        assert_eq!(profile.charset.as_deref(), Some("utf-8"));
        assert_eq!(profile.links_count, 3);
        assert_eq!(profile.internal_links_count, 2);
        assert_eq!(profile.external_links_count, 1);
        assert_eq!(profile.external_scripts_count, 1);
        assert!(profile.frameworks_detected.contains(&"jquery".to_string()));
        assert!(profile.semantic_tags_found.contains(&"nav".to_string()));
        assert_eq!(profile.category_counts.get("prices"), Some(&20));

        assert_eq!(profile.performance.scripts_count, 1);
        assert_eq!(profile.performance.external_resources, 0);
        assert_eq!(profile.performance.loading_complexity, ComplexityLevel::Low);
        assert_eq!(profile.parsing_complexity.score, 25);
        assert_eq!(profile.parsing_complexity.level, ComplexityLevel::Low);
        assert_eq!(profile.parsing_complexity.factors, vec![ComplexityFactor::FrameworksDetected]);
    }

    /// Card grid with no keyword on its parent, inside a plain page shell
    fn shell_page(wrapper: &str) -> String {
        let cards: String = (1..=20)
            .map(|i| format!(r#"<div class="product-card"><span class="price">{i}.00</span></div>"#))
            .collect();
        format!(
            r#"<html><head><title>Shop</title></head><body>
                <{wrapper}><p>header</p></{wrapper}>
                <{wrapper}><div>{cards}</div></{wrapper}>
                <{wrapper}><p>footer</p></{wrapper}>
            </body></html>"#
        )
    }

    #[test]
    fn test_listing_found_inside_page_shell() {
        for wrapper in ["div", "section"] {
            let report = analyze(&shell_page(wrapper));

            let listings: Vec<&DomZone> = report.zones.iter().filter(|z| z.kind == ZoneKind::Listing).collect();
            assert_eq!(listings.len(), 1, "{} shell", wrapper);
            assert_eq!(listings[0].repeated_items, 20);
            assert_eq!(
                listings[0].locator.css_path,
                format!("html > body > {}:nth-of-type(2) > div:nth-of-type(1)", wrapper)
            );

            let cards = report
                .selectors_for(ContentCategory::Products)
                .find(|s| s.selector == "[class*=\"product-card\"]")
                .expect("product-card selector");
            assert_eq!(cards.confidence, 0.7);
            assert!(report.selectors.iter().all(|s| s.selector != "/html/body"));
        }
    }

    #[test]
    fn test_nested_listings_keep_the_larger_group() {
        let items: String = (1..=12)
            .map(|i| format!(r#"<div class="item-card"><b>Item {i}</b></div>"#))
            .collect();
        let html = format!(
            r#"<html><body><div class="results">
                <div class="row">{items}</div>
                <div class="row"><p>more</p></div>
                <div class="row"><p>even more</p></div>
            </div></body></html>"#
        );
        let report = analyze(&html);
        let listings: Vec<&DomZone> = report.zones.iter().filter(|z| z.kind == ZoneKind::Listing).collect();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].repeated_items, 12);
        assert_eq!(listings[0].locator.css_path, "html > body > div:nth-of-type(1) > div:nth-of-type(1)");

        // Badges inside each card group fewer items than the grid
        let cards: String = (1..=20)
            .map(|i| {
                format!(
                    r#"<div class="product-card"><span class="badge">new</span><span class="badge">hot</span><span class="badge">#{i}</span></div>"#
                )
            })
            .collect();
        let report = analyze(&format!(r#"<html><body><div class="catalog">{cards}</div></body></html>"#));
        let listings: Vec<&DomZone> = report.zones.iter().filter(|z| z.kind == ZoneKind::Listing).collect();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].repeated_items, 20);
    }

    #[test]
    fn test_classless_look_alike_items() {
        let rows: String = (1..=4)
            .map(|i| format!("<tr><td>Row {i}</td><td>{i}.00</td></tr>"))
            .collect();
        let report = analyze(&format!("<html><body><table><tbody>{rows}</tbody></table></body></html>"));
        let listing = report
            .zones
            .iter()
            .find(|z| z.kind == ZoneKind::Listing)
            .expect("table rows form a listing");
        assert_eq!(listing.locator.tag, "tbody");
        assert_eq!(listing.repeated_items, 4);
    }

    #[test]
    fn test_fallback_selector_shared_by_items() {
        // Duplicate ids leave only the tag path for the price
        let cards: String = (1..=20)
            .map(|i| {
                format!(
                    r#"<div class="product-card"><span id="price">{i}.00</span><h3 class="product-title">Item {i}</h3></div>"#
                )
            })
            .collect();
        let report = analyze(&format!(r#"<html><body><div class="catalog">{cards}</div></body></html>"#));

        let prices: Vec<&SelectorCandidate> = report.selectors_for(ContentCategory::Prices).collect();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].selector, "/html/body/div/div/span");
        assert_eq!(prices[0].syntax, SelectorSyntax::Xpath);
        assert_eq!(prices[0].match_count, 20);

        for category in [ContentCategory::Prices, ContentCategory::Titles, ContentCategory::Products] {
            let single_positional = report
                .selectors_for(category)
                .filter(|s| s.syntax == SelectorSyntax::Xpath && s.match_count == 1)
                .count();
            assert!(single_positional <= 1, "{:?}", category);
        }
    }

    #[test]
    fn test_deeply_nested_markup() {
        let depth = 3000;
        let html = format!("<html><body>{}x{}</body></html>", "<div>".repeat(depth), "</div>".repeat(depth));
        let report = analyze(&html);

        let profile = report.profile.expect("profile");
        assert_eq!(profile.max_nesting_depth, depth + 1);
        assert_eq!(profile.total_elements, depth + 3);
        assert!(profile.parsing_complexity.factors.contains(&ComplexityFactor::DeepNesting));
    }

    #[test]
    fn test_parsing_complexity_of_heavy_page() {
        let scripts: String = (1..=11)
            .map(|i| format!(r#"<script src="https://cdn.example.com/lib{i}.js"></script>"#))
            .collect();
        let forms: String = (1..=4)
            .map(|i| format!(r#"<form action="/f{i}"><input name="q{i}"></form>"#))
            .collect();
        let images: String = (1..=30)
            .map(|i| format!(r#"<img src="https://img.example.com/{i}.jpg">"#))
            .collect();
        let html = format!(
            r#"<html><head><script src="https://cdn.example.com/react-dom.min.js"></script>{scripts}</head>
            <body>{forms}{images}{open}<p>deep</p>{close}</body></html>"#,
            open = "<div>".repeat(15),
            close = "</div>".repeat(15),
        );
        let profile = analyze(&html).profile.unwrap();

        assert_eq!(profile.scripts_count, 12);
        assert_eq!(profile.performance.external_resources, 42);
        assert_eq!(profile.performance.loading_complexity, ComplexityLevel::Medium);

        let parsing = &profile.parsing_complexity;
        assert_eq!(parsing.score, 80);
        assert_eq!(parsing.level, ComplexityLevel::VeryHigh);
        assert_eq!(
            parsing.factors,
            vec![
                ComplexityFactor::ManyScripts,
                ComplexityFactor::FrameworksDetected,
                ComplexityFactor::ManyForms,
                ComplexityFactor::DeepNesting,
            ]
        );
    }

    #[test]
    fn test_loading_complexity_of_large_page() {
        let images: String = (1..=25).map(|i| format!(r#"<img src="/i{i}.png">"#)).collect();
        let scripts = "<script>var a = 1;</script>".repeat(17);
        let html = format!(
            "<html><body><p>{}</p>{images}{scripts}</body></html>",
            "x".repeat(100_000)
        );
        let profile = analyze(&html).profile.unwrap();

        let performance = &profile.performance;
        assert!(performance.page_size_bytes > 100_000);
        assert_eq!(performance.external_resources, 0);
        assert_eq!(performance.complexity_score, 80.0);
        assert_eq!(performance.loading_complexity, ComplexityLevel::High);

        let parsing = &profile.parsing_complexity;
        assert_eq!(parsing.score, 50);
        assert_eq!(parsing.level, ComplexityLevel::High);
        assert_eq!(
            parsing.factors,
            vec![ComplexityFactor::ManyScripts, ComplexityFactor::HighLoadingComplexity]
        );
    }

    #[test]
    fn test_safe_ident() {
        assert!(is_safe_ident("product-card"));
        assert!(is_safe_ident("_x1"));
        assert!(!is_safe_ident("1col"));
        assert!(!is_safe_ident("md:flex"));
        assert!(!is_safe_ident(""));
    }
}
