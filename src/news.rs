use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::cache::{Clock, NewsCache, SystemClock};
use crate::config::{Config, NewsSource};
use crate::fetcher::Fetcher;
use crate::processor::{self, NewsArticle};

/// Ties the fetcher, processor and cache together behind a single
/// `fetch_news` entry point.
pub struct NewsService {
    fetcher: Fetcher,
    cache: NewsCache,
    sources: Vec<NewsSource>,
    clock: Arc<dyn Clock>,
}

impl NewsService {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher: Fetcher::new(config),
            cache: NewsCache::new(config.cache_ttl_minutes, clock.clone()),
            sources: config.active_sources(),
            clock,
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Returns the aggregated article list, newest first. Serves the cache
    /// while it is fresh; otherwise refreshes all sources. Never fails: a
    /// refresh that comes back empty degrades to the previous cache, which
    /// may itself be empty on a cold start.
    pub async fn fetch_news(&self) -> Arc<Vec<NewsArticle>> {
        if let Some(articles) = self.cache.fresh().await {
            return articles;
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Arc<Vec<NewsArticle>> {
        let now = self.clock.now();
        let feeds = self.fetcher.fetch_all_feeds(&self.sources).await;

        let mut seen = HashSet::new();
        let mut articles: Vec<NewsArticle> = Vec::new();
        for feed in &feeds {
            for article in processor::process_feed(feed, now) {
                // Sources occasionally syndicate the same story
                if seen.insert(article.id.clone()) {
                    articles.push(article);
                }
            }
        }

        articles.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));

        if articles.is_empty() && !self.cache.is_empty().await {
            info!("Refresh yielded no articles, keeping previous cache");
            return self.cache.stale().await;
        }

        info!(articles = articles.len(), sources = feeds.len(), "News cache refreshed");
        self.cache.store(articles).await;
        self.cache.stale().await
    }
}
