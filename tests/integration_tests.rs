//! Integration tests for the newswire aggregation service
//!
//! These tests verify the full workflow from configuration loading through
//! feed fetching, article processing, and the HTTP API surface.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use std::sync::Arc;

    use newswire::config::{Config, NewsSource, SourceKind};
    use newswire::routes::{self, AppState};

    pub fn test_source(id: &str, url: &str) -> NewsSource {
        NewsSource {
            id: id.to_string(),
            name: format!("Source {}", id),
            url: url.to_string(),
            kind: SourceKind::Rss,
            category: "tech".to_string(),
            region: Some("global".to_string()),
            language: "en".to_string(),
            enabled: true,
            priority: 50,
        }
    }

    pub fn test_config(sources: Vec<NewsSource>) -> Config {
        Config {
            cache_ttl_minutes: 15,
            fetch_timeout_secs: 5,
            max_retries: 0,
            proxy_base: None,
            sources,
        }
    }

    /// Serves the app on an ephemeral port and returns its base URL.
    pub async fn spawn_app(config: Config) -> String {
        let state = Arc::new(AppState::new(&config));
        let app = routes::router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

mod config_integration_tests {
    use super::*;
    use newswire::config::Config;

    #[test]
    fn test_load_actual_sources_config() {
        // Test loading the actual sources.toml from the project
        let config = Config::load("sources.toml");
        assert!(config.is_ok(), "Failed to load sources.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(!config.sources.is_empty(), "sources.toml should have at least one source");
        assert!(config.cache_ttl_minutes > 0, "cache_ttl_minutes should be positive");
        assert!(!config.active_sources().is_empty());
    }

    #[test]
    fn test_config_round_trip() {
        let toml_content = r#"
            cache_ttl_minutes = 30
            max_retries = 2

            [[sources]]
            id = "techcrunch"
            name = "TechCrunch"
            url = "https://techcrunch.com/feed/"
            category = "tech"
            region = "global"
            language = "en"
            priority = 90

            [[sources]]
            id = "itmedia"
            name = "ITmedia"
            url = "https://rss.itmedia.co.jp/rss/2.0/topstory.xml"
            category = "tech"
            region = "japan"
            language = "ja"
            enabled = false
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = newswire::config::Config::load(temp_file.path()).unwrap();

        assert_eq!(config.cache_ttl_minutes, 30);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].id, "techcrunch");
        assert_eq!(config.sources[1].region.as_deref(), Some("japan"));

        // Only the enabled source survives the active filter
        let active = config.active_sources();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "techcrunch");
    }
}

mod end_to_end_tests {
    use super::common::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MIXED_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
<channel>
    <title>Mixed Feed</title>
    <item>
        <guid>story-ai</guid>
        <title>Neural network beats benchmark</title>
        <link>https://example.com/ai</link>
        <pubDate>Mon, 06 May 2024 09:00:00 GMT</pubDate>
        <media:thumbnail url="https://cdn.example.com/ai.jpg"/>
        <description>A new machine learning result</description>
    </item>
    <item>
        <guid>story-sports</guid>
        <title>Cup final goes to penalties</title>
        <link>https://example.com/sports</link>
        <pubDate>Mon, 06 May 2024 10:00:00 GMT</pubDate>
        <description>Ninety minutes were not enough</description>
    </item>
    <item>
        <guid>story-chip</guid>
        <title>Semiconductor fab breaks ground</title>
        <link>https://example.com/chip</link>
        <pubDate>Mon, 06 May 2024 11:00:00 GMT</pubDate>
        <description>Construction starts on the new plant</description>
    </item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_full_pipeline_fetch_filter_sort() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MIXED_FEED))
            .mount(&upstream)
            .await;

        let base = spawn_app(test_config(vec![test_source("mixed", &upstream.uri())])).await;

        let response = reqwest::get(format!("{}/api/news", base)).await.unwrap();
        assert_eq!(response.status(), 200);

        let json: serde_json::Value = response.json().await.unwrap();
        let articles = json["articles"].as_array().unwrap();

        // The sports story fails the tech filter
        assert_eq!(articles.len(), 2);
        // Newest first
        assert_eq!(articles[0]["id"], "story-chip");
        assert_eq!(articles[1]["id"], "story-ai");
        // Categorization and thumbnail extraction ran
        assert_eq!(articles[1]["thumbnail"], "https://cdn.example.com/ai.jpg");
        let categories = articles[1]["categories"].as_array().unwrap();
        assert!(categories.contains(&serde_json::json!("ai")));
        assert!(categories.contains(&serde_json::json!("tech")));
    }

    #[tokio::test]
    async fn test_proxy_mode_full_loop() {
        // Upstream feed host, reachable only via the proxy endpoint
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MIXED_FEED))
            .expect(1)
            .mount(&upstream)
            .await;

        // One app instance provides /api/proxy; a second config routes its
        // feed fetches through it.
        let proxy_base = spawn_app(test_config(Vec::new())).await;

        let mut config = test_config(vec![test_source("proxied", &upstream.uri())]);
        config.proxy_base = Some(proxy_base);
        let base = spawn_app(config).await;

        let response = reqwest::get(format!("{}/api/news", base)).await.unwrap();
        assert_eq!(response.status(), 200);

        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["articles"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_status_reports_source_failures() {
        let dead = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&dead)
            .await;

        let base = spawn_app(test_config(vec![test_source("dead", &dead.uri())])).await;

        // Trigger a refresh; it degrades to an empty list
        let response = reqwest::get(format!("{}/api/news", base)).await.unwrap();
        let json: serde_json::Value = response.json().await.unwrap();
        assert!(json["articles"].as_array().unwrap().is_empty());

        let response = reqwest::get(format!("{}/api/status", base)).await.unwrap();
        let json: serde_json::Value = response.json().await.unwrap();
        let sources = json["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["status"], "error");
        assert_eq!(sources[0]["articlesCount"], 0);
    }

    #[tokio::test]
    async fn test_proxy_endpoint_round_trip() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(MIXED_FEED)
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .mount(&upstream)
            .await;

        let base = spawn_app(test_config(Vec::new())).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{}/api/proxy", base))
            .query(&[("url", format!("{}/feed", upstream.uri()))])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        let body = response.text().await.unwrap();
        assert!(body.contains("<rss"));
    }
}
