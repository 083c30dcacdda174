use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use serde::Serialize;
use tracing::debug;

use crate::config::NewsSource;
use crate::fetcher::FetchedFeed;

/// Allowlist for the tech filter. Matched as case-insensitive substrings
/// over title + snippet, so short terms ("ai", "app") are deliberately loose.
const TECH_KEYWORDS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "technology",
    "software",
    "hardware",
    "robotics",
    "automation",
    "blockchain",
    "cryptocurrency",
    "cyber",
    "digital",
    "cloud",
    "programming",
    "code",
    "developer",
    "engineering",
    "computer",
    "startup",
    "tech",
    "innovation",
    "algorithm",
    "data science",
    "neural network",
    "quantum",
    "semiconductor",
    "5g",
    "6g",
    "processor",
    "chip",
    "silicon",
    "mobile",
    "app",
];

/// Category taxonomy. An article can land in zero or many categories.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "ai",
        &[
            "ai",
            "artificial intelligence",
            "machine learning",
            "deep learning",
            "neural network",
            "llm",
            "gpt",
        ],
    ),
    (
        "tech",
        &[
            "technology",
            "software",
            "hardware",
            "digital",
            "cloud",
            "mobile",
            "app",
            "startup",
        ],
    ),
    (
        "science",
        &["research", "quantum", "semiconductor", "engineering", "innovation"],
    ),
    (
        "economics",
        &[
            "market",
            "startup",
            "investment",
            "venture capital",
            "funding",
            "acquisition",
        ],
    ),
];

/// A normalized article as served by `GET /api/news`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub language: String,
}

pub fn is_tech_related(text: &str) -> bool {
    let text = text.to_lowercase();
    TECH_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

/// Returns the matching categories in taxonomy order. AI articles always
/// carry `tech` as a base category.
pub fn categorize(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    let mut categories: Vec<String> = CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, terms)| terms.iter().any(|term| text.contains(term)))
        .map(|(category, _)| category.to_string())
        .collect();

    if categories.iter().any(|c| c == "ai") && !categories.iter().any(|c| c == "tech") {
        categories.insert(1, "tech".to_string());
    }

    categories
}

/// Best-effort thumbnail extraction: media:content URL, then
/// media:thumbnail, then the first `<img src>` in the content body, then
/// the first `<img src>` in the summary.
pub fn extract_thumbnail(entry: &Entry) -> Option<String> {
    if let Some(url) = entry
        .media
        .iter()
        .flat_map(|m| &m.content)
        .filter_map(|c| c.url.as_ref())
        .next()
    {
        return Some(url.to_string());
    }

    if let Some(thumbnail) = entry.media.iter().flat_map(|m| &m.thumbnails).next() {
        return Some(thumbnail.image.uri.clone());
    }

    if let Some(body) = entry.content.as_ref().and_then(|c| c.body.as_ref()) {
        if let Some(src) = first_img_src(body) {
            return Some(src);
        }
    }

    entry
        .summary
        .as_ref()
        .and_then(|summary| first_img_src(&summary.content))
}

fn first_img_src(html: &str) -> Option<String> {
    let tag_start = html.find("<img")?;
    let rest = &html[tag_start..];
    let tag = &rest[..rest.find('>').unwrap_or(rest.len())];

    let src_start = tag.find("src=")? + "src=".len();
    let mut chars = tag[src_start..].chars();
    let quote = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }

    let value = &tag[src_start + 1..];
    let src = value[..value.find(quote)?].trim();
    if src.is_empty() {
        None
    } else {
        Some(src.to_string())
    }
}

/// Normalizes one feed entry into a [`NewsArticle`]. Entries without a title
/// or link, and entries that fail the tech filter, are dropped.
pub fn process_entry(entry: &Entry, source: &NewsSource, now: DateTime<Utc>) -> Option<NewsArticle> {
    let title = entry.title.as_ref().map(|t| t.content.trim().to_string())?;
    if title.is_empty() {
        debug!(source = %source.id, "Dropping entry with empty title");
        return None;
    }

    let link = entry.links.first().map(|l| l.href.trim().to_string())?;
    if link.is_empty() {
        debug!(source = %source.id, title = %title, "Dropping entry with no link");
        return None;
    }

    let content_snippet = entry
        .summary
        .as_ref()
        .map(|s| s.content.trim().to_string())
        .filter(|s| !s.is_empty());

    let text = match &content_snippet {
        Some(snippet) => format!("{} {}", title, snippet),
        None => title.clone(),
    };
    if !is_tech_related(&text) {
        return None;
    }

    let content = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .unwrap_or_default();

    // Missing or unparsable dates fall back to the refresh time so the
    // article still sorts near the top rather than vanishing to the bottom.
    let pub_date = entry.published.or(entry.updated).unwrap_or(now);

    let creator = entry
        .authors
        .first()
        .map(|a| a.name.trim().to_string())
        .filter(|n| !n.is_empty());

    let id = if !entry.id.trim().is_empty() {
        entry.id.trim().to_string()
    } else {
        link.clone()
    };

    Some(NewsArticle {
        id,
        title,
        link,
        pub_date,
        creator,
        content,
        content_snippet,
        categories: categorize(&text),
        thumbnail: extract_thumbnail(entry),
        source: source.name.clone(),
        region: source.region.clone(),
        language: source.language.clone(),
    })
}

/// Maps every entry of a fetched feed, dropping the ones that fail
/// normalization or the tech filter.
pub fn process_feed(feed: &FetchedFeed, now: DateTime<Utc>) -> Vec<NewsArticle> {
    feed.entries
        .iter()
        .filter_map(|entry| process_entry(entry, &feed.source, now))
        .collect()
}
