// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 发现策略选择器：sitemap优先与递归回退

use crate::helpers::{discovery_settings, fetcher_settings};
use chrono::Utc;
use huntrs::discovery::{ChosenStrategy, DiscoveryEngine};
use huntrs::domain::models::source::{DiscoveryMode, Source};
use huntrs::engines::Fetcher;
use huntrs::utils::robots::RobotsChecker;
use std::collections::HashSet;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_for_tests() -> (Arc<Fetcher>, Arc<RobotsChecker>, DiscoveryEngine) {
    let settings = fetcher_settings();
    let robots = Arc::new(RobotsChecker::new(settings.user_agent.clone()));
    let fetcher = Arc::new(Fetcher::new(&settings, robots.clone()));
    let engine = DiscoveryEngine::new(fetcher.clone(), robots.clone(), discovery_settings());
    (fetcher, robots, engine)
}

/// 无robots.txt、无sitemap的站点回退到深度2的递归爬取，
/// 且只返回同域内容URL，/tag/与/ad/被排除
#[tokio::test]
async fn no_robots_no_sitemap_falls_back_to_recursive() {
    let server = MockServer::start().await;

    let root_html = format!(
        r#"<html><body>
            <a href="/2026/01/story-a">Story A</a>
            <a href="/2026/01/story-a">Story A again</a>
            <a href="/news">News index</a>
            <a href="/tag/rust">Tag page</a>
            <a href="/ad/banner">Ad</a>
            <a href="https://other.example.org/2026/01/external">External</a>
            <a href="/about">About</a>
        </body></html>"#
    );
    let news_html = r#"<html><body>
            <a href="/2026/02/story-b">Story B</a>
            <a href="/news">Self link</a>
        </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(root_html))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(news_html))
        .mount(&server)
        .await;

    let (_, _, engine) = engine_for_tests();
    let source = Source::new_manual(server.uri(), DiscoveryMode::Auto, 2, 3600);

    let report = engine.run(&source, None).await.unwrap();
    assert_eq!(report.strategy, ChosenStrategy::Recursive);

    let content_urls: Vec<String> = report
        .content_urls()
        .iter()
        .map(|e| e.url.clone())
        .collect();

    assert!(content_urls.iter().any(|u| u.contains("/2026/01/story-a")));
    assert!(content_urls.iter().any(|u| u.contains("/2026/02/story-b")));
    assert!(content_urls.iter().all(|u| u.starts_with(&server.uri())));
    assert!(!content_urls.iter().any(|u| u.contains("/tag/")));
    assert!(!content_urls.iter().any(|u| u.contains("/ad/")));
    assert!(!content_urls.iter().any(|u| u.contains("other.example.org")));

    // 访问集合不含重复的规范化URL，深度不超过上限
    let unique: HashSet<&String> = content_urls.iter().collect();
    assert_eq!(unique.len(), content_urls.len());
    assert!(report.entries.iter().all(|e| e.depth <= 2));
}

/// 有新鲜sitemap的来源绝不回退到递归爬取（策略优先级）
#[tokio::test]
async fn fresh_sitemap_never_falls_back_to_recursive() {
    let server = MockServer::start().await;

    let robots = format!("User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n", server.uri());
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{}/2026/01/fresh-story</loc><lastmod>{}</lastmod></url>
        </urlset>"#,
        server.uri(),
        Utc::now().to_rfc3339()
    );

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(robots))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap))
        .mount(&server)
        .await;
    // 递归爬取会打到根路径；sitemap成功时它必须一次都不被请求
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let (_, _, engine) = engine_for_tests();
    let source = Source::new_manual(server.uri(), DiscoveryMode::Auto, 2, 3600);

    let report = engine.run(&source, None).await.unwrap();
    assert_eq!(report.strategy, ChosenStrategy::Sitemap);
    assert!(report
        .content_urls()
        .iter()
        .any(|e| e.url.contains("/2026/01/fresh-story")));
}

/// sitemap条目全部超出新鲜度窗口时按探测失败处理，回退递归
#[tokio::test]
async fn stale_sitemap_triggers_recursive_fallback() {
    let server = MockServer::start().await;

    let robots = format!("User-agent: *\nSitemap: {}/sitemap.xml\n", server.uri());
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{}/2020/01/old-story</loc><lastmod>2020-01-01T00:00:00Z</lastmod></url>
        </urlset>"#,
        server.uri()
    );
    let root_html = r#"<html><body><a href="/2026/03/current-story">Current</a></body></html>"#;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(robots))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(root_html))
        .mount(&server)
        .await;

    let (_, _, engine) = engine_for_tests();
    let source = Source::new_manual(server.uri(), DiscoveryMode::Auto, 2, 3600);

    let report = engine.run(&source, None).await.unwrap();
    assert_eq!(report.strategy, ChosenStrategy::Recursive);
    assert!(report
        .content_urls()
        .iter()
        .any(|e| e.url.contains("/2026/03/current-story")));
}

/// 强制递归模式跳过sitemap探测
#[tokio::test]
async fn forced_recursive_mode_skips_sitemap_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><a href="/2026/01/forced-story">X</a></body></html>"#,
        ))
        .mount(&server)
        .await;

    let (_, _, engine) = engine_for_tests();
    let source = Source::new_manual(server.uri(), DiscoveryMode::Auto, 2, 3600);

    let report = engine
        .run(&source, Some(DiscoveryMode::Recursive))
        .await
        .unwrap();
    assert_eq!(report.strategy, ChosenStrategy::Recursive);
}

/// 根URL不可达对整次运行是致命的
#[tokio::test]
async fn unreachable_root_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_, _, engine) = engine_for_tests();
    let source = Source::new_manual(server.uri(), DiscoveryMode::Recursive, 2, 3600);

    let result = engine.run(&source, None).await;
    assert!(result.is_err());
}
