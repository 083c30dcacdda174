use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::processor::NewsArticle;

/// Time source for cache freshness checks. Injected so tests can move the
/// clock instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheState {
    articles: Arc<Vec<NewsArticle>>,
    last_refresh: Option<DateTime<Utc>>,
}

/// The single in-memory article cache. Holds the last successful refresh and
/// its timestamp; dies with the process.
pub struct NewsCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState>,
}

impl NewsCache {
    pub fn new(ttl_minutes: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes as i64),
            clock,
            state: RwLock::new(CacheState {
                articles: Arc::new(Vec::new()),
                last_refresh: None,
            }),
        }
    }

    /// The cached list iff it is non-empty and younger than the TTL.
    pub async fn fresh(&self) -> Option<Arc<Vec<NewsArticle>>> {
        let state = self.state.read().await;
        let last_refresh = state.last_refresh?;
        if self.clock.now() - last_refresh < self.ttl && !state.articles.is_empty() {
            Some(state.articles.clone())
        } else {
            None
        }
    }

    /// Whatever is cached, regardless of age. Possibly empty.
    pub async fn stale(&self) -> Arc<Vec<NewsArticle>> {
        self.state.read().await.articles.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.articles.is_empty()
    }

    /// Replaces the cache contents and stamps the refresh time.
    pub async fn store(&self, articles: Vec<NewsArticle>) {
        let mut state = self.state.write().await;
        state.articles = Arc::new(articles);
        state.last_refresh = Some(self.clock.now());
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_refresh
    }
}
