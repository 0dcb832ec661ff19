//! Keyword tables used by zone classification and selector generation.
//!
//! Attribute values are split into lowercase tokens (`product-card` becomes
//! `product`, `card`) and matched token-for-token, so results stay
//! reproducible. Bump [`KEYWORD_TABLE_VERSION`] whenever a table changes.

use serde::{Deserialize, Serialize};

pub const KEYWORD_TABLE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    Navigation,
    Listing,
    Detail,
    Form,
    Unknown,
}

impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Navigation => "navigation",
            ZoneKind::Listing => "listing",
            ZoneKind::Detail => "detail",
            ZoneKind::Form => "form",
            ZoneKind::Unknown => "unknown",
        }
    }
}

/// Tokens that hint at each zone kind
pub const ZONE_KEYWORDS: &[(ZoneKind, &[&str])] = &[
    (ZoneKind::Navigation, &["nav", "navbar", "navigation", "menu", "breadcrumb", "breadcrumbs", "topbar"]),
    (
        ZoneKind::Listing,
        &["product", "products", "item", "items", "card", "cards", "list", "listing", "grid", "catalog", "results", "goods", "tiles"],
    ),
    (ZoneKind::Detail, &["article", "post", "content", "detail", "details", "entry", "story", "main", "body"]),
    (ZoneKind::Form, &["form", "search", "login", "signin", "signup", "register", "contact", "subscribe", "newsletter"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Prices,
    Titles,
    Descriptions,
    Images,
    Pagination,
    Navigation,
    Forms,
    Products,
    Articles,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Prices => "prices",
            ContentCategory::Titles => "titles",
            ContentCategory::Descriptions => "descriptions",
            ContentCategory::Images => "images",
            ContentCategory::Pagination => "pagination",
            ContentCategory::Navigation => "navigation",
            ContentCategory::Forms => "forms",
            ContentCategory::Products => "products",
            ContentCategory::Articles => "articles",
        }
    }
}

/// Category tokens, most specific first. A token belongs to the first
/// category that lists it, so `product-title` lands in titles, not products.
pub const CATEGORY_KEYWORDS: &[(ContentCategory, &[&str])] = &[
    (ContentCategory::Prices, &["price", "prices", "cost", "amount", "currency", "sale"]),
    (ContentCategory::Titles, &["title", "name", "heading", "headline"]),
    (ContentCategory::Descriptions, &["description", "desc", "summary", "excerpt", "teaser"]),
    (ContentCategory::Images, &["image", "img", "photo", "thumbnail", "thumb", "gallery"]),
    (ContentCategory::Pagination, &["pagination", "pager", "paging", "pages"]),
    (ContentCategory::Navigation, &["nav", "navbar", "menu", "breadcrumb", "breadcrumbs"]),
    (ContentCategory::Forms, &["form", "search", "login", "signup", "subscribe", "contact"]),
    (ContentCategory::Products, &["product", "products", "item", "card", "goods", "offer", "catalog", "sku"]),
    (ContentCategory::Articles, &["article", "post", "news", "blog", "entry", "story"]),
];

/// Split an attribute value into lowercase alphanumeric tokens
pub fn tokenize(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Number of tokens hitting the zone's keyword set
pub fn zone_hits(kind: ZoneKind, tokens: &[String]) -> usize {
    ZONE_KEYWORDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, words)| tokens.iter().filter(|t| words.contains(&t.as_str())).count())
        .unwrap_or(0)
}

/// First category (in priority order) matched by any of the tokens
pub fn category_for(tokens: &[String]) -> Option<ContentCategory> {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| tokens.iter().any(|t| words.contains(&t.as_str())))
        .map(|(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("product-card is_featured"), vec!["product", "card", "is", "featured"]);
        assert_eq!(tokenize("  "), Vec::<String>::new());
        assert_eq!(tokenize("NavBar__Item"), vec!["navbar", "item"]);
    }

    #[test]
    fn test_category_priority() {
        assert_eq!(category_for(&tokenize("product-title")), Some(ContentCategory::Titles));
        assert_eq!(category_for(&tokenize("product-card")), Some(ContentCategory::Products));
        assert_eq!(category_for(&tokenize("price")), Some(ContentCategory::Prices));
        assert_eq!(category_for(&tokenize("wrapper")), None);
    }

    #[test]
    fn test_no_substring_false_positives() {
        // "canvas" contains "nav" but is not a navigation token
        assert_eq!(category_for(&tokenize("canvas")), None);
        assert_eq!(zone_hits(ZoneKind::Navigation, &tokenize("canvas")), 0);
    }

    #[test]
    fn test_zone_hits() {
        assert_eq!(zone_hits(ZoneKind::Listing, &tokenize("product-grid items")), 3);
        assert_eq!(zone_hits(ZoneKind::Form, &tokenize("search-box")), 1);
        assert_eq!(zone_hits(ZoneKind::Unknown, &tokenize("anything")), 0);
    }
}
